mod aws;

use async_trait::async_trait;

use crate::error::Result;
use crate::pipeline::{ExecutionId, LogPage, PipelineDefinition, StateSnapshot};

pub use aws::{AwsCli, AwsSettings};

/// Read access to a pipeline, plus the one mutation the tool performs.
#[async_trait]
pub trait PipelineProvider: Send + Sync {
    /// Static stage/action declarations.
    async fn definition(&self, pipeline: &str) -> Result<PipelineDefinition>;

    async fn start_execution(&self, pipeline: &str) -> Result<ExecutionId>;

    /// Most recent execution.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::LensError::NoExecutions`] when the pipeline has
    /// never run.
    async fn latest_execution_id(&self, pipeline: &str) -> Result<ExecutionId>;

    async fn state(&self, pipeline: &str) -> Result<StateSnapshot>;
}

/// Paginated, time-filtered log queries.
#[async_trait]
pub trait LogProvider: Send + Sync {
    /// Fetches one page of events at or after `start_millis`. Pass the token
    /// of the previous page to continue the same query.
    async fn fetch_events(
        &self,
        log_group: &str,
        start_millis: i64,
        next_token: Option<&str>,
    ) -> Result<LogPage>;
}
