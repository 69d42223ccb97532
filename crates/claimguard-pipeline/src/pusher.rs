use crate::artifacts::{ModelEvaluationArtifact, ModelPusherArtifact};
use crate::error::{PipelineResult, Stage, StageContext};
use crate::registry::ModelRegistry;
use tracing::info;

/// Promotes an accepted challenger to the registry key.
pub struct ModelPusher<'a> {
    registry: &'a dyn ModelRegistry,
}

impl<'a> ModelPusher<'a> {
    #[must_use]
    pub fn new(registry: &'a dyn ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn push(&self, evaluation: &ModelEvaluationArtifact) -> PipelineResult<ModelPusherArtifact> {
        if !evaluation.accepted {
            info!(key = %evaluation.champion_key, "challenger rejected, champion kept");
            return Ok(ModelPusherArtifact { pushed: false, registry_key: evaluation.champion_key.clone() });
        }

        let bytes = std::fs::read(&evaluation.challenger_path).data_access(Stage::Pushing)?;
        self.registry.write(&evaluation.champion_key, &bytes).data_access(Stage::Pushing)?;
        info!(key = %evaluation.champion_key, delta = evaluation.metric_delta, "challenger promoted");
        Ok(ModelPusherArtifact { pushed: true, registry_key: evaluation.champion_key.clone() })
    }
}
