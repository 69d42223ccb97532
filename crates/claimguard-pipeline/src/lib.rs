//! ClaimGuard Pipeline
//!
//! Staged training pipeline for the vehicle-insurance claim classifier:
//! ingestion, validation, transformation, training, champion/challenger
//! evaluation and promotion to the model registry. Each stage consumes the
//! artifacts of its predecessors and returns its own.

pub mod artifacts;
pub mod bundle;
pub mod config;
pub mod deadline;
pub mod encoder;
pub mod error;
pub mod evaluation;
pub mod inference;
pub mod ingestion;
pub mod layout;
pub mod persist;
pub mod pipeline;
pub mod pusher;
pub mod registry;
pub mod resample;
pub mod schema;
pub mod table;
pub mod tracking;
pub mod trainer;
pub mod transformation;
pub mod validation;

pub use artifacts::{
    ArtifactKind, DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact,
    ModelEvaluationArtifact, ModelPusherArtifact, ModelTrainerArtifact, RunFile, RunManifest,
};
pub use bundle::TrainedModelBundle;
pub use config::PipelineConfig;
pub use encoder::{build_encoder, EncoderPlan, EncodingPipeline};
pub use error::{PipelineError, PipelineResult, Stage};
pub use evaluation::{compare, ModelEvaluator, Verdict};
pub use inference::{ClaimClassifier, ClaimPrediction, ClaimRecord};
pub use ingestion::{CsvDirectoryProvider, DataIngestion, DatasetProvider};
pub use layout::RunLayout;
pub use pipeline::{PipelineOutcome, TrainingPipeline};
pub use pusher::ModelPusher;
pub use registry::{FsModelRegistry, ModelRegistry, RegistryError};
pub use schema::Schema;
pub use table::{Cell, Table};
pub use tracking::{sink_from_config, JsonlMetricsSink, MetricsSink, NoopMetricsSink, TrackingEvent};
pub use trainer::{ModelTrainer, TrainingOutcome};
pub use transformation::{fit_transform, DataTransformer, TransformedSplit};
pub use validation::{validate, DataValidator, ValidationReport};
