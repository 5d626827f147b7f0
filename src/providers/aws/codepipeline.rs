use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;

use crate::error::{LensError, Result};
use crate::pipeline::{ExecutionId, PipelineDefinition, StateSnapshot};
use crate::providers::PipelineProvider;

use super::client::AwsCli;

const SERVICE: &str = "codepipeline";

/// Response of `get-pipeline`.
#[derive(Deserialize)]
struct GetPipelineResponse {
    pipeline: PipelineDefinition,
}

/// Response of `start-pipeline-execution`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionResponse {
    pipeline_execution_id: ExecutionId,
}

/// Response of `list-pipeline-executions`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListExecutionsResponse {
    #[serde(default)]
    pipeline_execution_summaries: Vec<ExecutionSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionSummary {
    pipeline_execution_id: ExecutionId,
    #[serde(default)]
    status: Option<String>,
}

#[async_trait]
impl PipelineProvider for AwsCli {
    async fn definition(&self, pipeline: &str) -> Result<PipelineDefinition> {
        let response: GetPipelineResponse = self
            .call(SERVICE, "get-pipeline", &["--name", pipeline])
            .await?;
        debug!("{:?}", response.pipeline);
        Ok(response.pipeline)
    }

    async fn start_execution(&self, pipeline: &str) -> Result<ExecutionId> {
        let response: StartExecutionResponse = self
            .call(SERVICE, "start-pipeline-execution", &["--name", pipeline])
            .await?;
        info!(
            "Started execution {} of {pipeline}",
            response.pipeline_execution_id
        );
        Ok(response.pipeline_execution_id)
    }

    async fn latest_execution_id(&self, pipeline: &str) -> Result<ExecutionId> {
        let response: ListExecutionsResponse = self
            .call(
                SERVICE,
                "list-pipeline-executions",
                &["--pipeline-name", pipeline, "--max-items", "1"],
            )
            .await?;

        let latest = response
            .pipeline_execution_summaries
            .into_iter()
            .next()
            .ok_or_else(|| LensError::NoExecutions(pipeline.to_string()))?;

        info!(
            "Latest execution of {pipeline} is {} ({})",
            latest.pipeline_execution_id,
            latest.status.as_deref().unwrap_or("unknown status")
        );
        Ok(latest.pipeline_execution_id)
    }

    async fn state(&self, pipeline: &str) -> Result<StateSnapshot> {
        let snapshot: StateSnapshot = self
            .call(SERVICE, "get-pipeline-state", &["--name", pipeline])
            .await?;
        debug!("{snapshot:?}");
        Ok(snapshot)
    }
}
