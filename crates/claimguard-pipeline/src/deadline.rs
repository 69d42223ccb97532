use crate::error::{PipelineError, PipelineResult, Stage};
use std::time::{Duration, Instant};

/// Optional wall-clock budget for a run, checked at stage boundaries.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    #[must_use]
    pub fn unlimited() -> Self {
        Self { started: Instant::now(), budget: None }
    }

    #[must_use]
    pub fn from_secs(budget_secs: Option<u64>) -> Self {
        Self { started: Instant::now(), budget: budget_secs.map(Duration::from_secs) }
    }

    #[must_use]
    pub fn from_duration(budget: Duration) -> Self {
        Self { started: Instant::now(), budget: Some(budget) }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fails with `stage`'s error kind once the budget is spent.
    pub fn check(&self, stage: Stage) -> PipelineResult<()> {
        match self.budget {
            Some(budget) if self.started.elapsed() >= budget => {
                Err(PipelineError::budget_exhausted(stage, budget.as_secs()))
            }
            _ => Ok(()),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unlimited()
    }
}
