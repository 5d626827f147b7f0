use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

/// Identifier of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl From<&str> for ExecutionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ExecutionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status reported for a stage or action execution.
///
/// Values the provider may add later are kept verbatim in `Unknown` so a
/// snapshot never fails to parse because of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ExecutionStatus {
    InProgress,
    Succeeded,
    Failed,
    Abandoned,
    Stopped,
    Stopping,
    Cancelled,
    Unknown(String),
}

impl ExecutionStatus {
    /// Statuses after which the traced execution cannot make further progress.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Abandoned | Self::Stopped | Self::Cancelled
        )
    }
}

impl From<String> for ExecutionStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "InProgress" => Self::InProgress,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            "Abandoned" => Self::Abandoned,
            "Stopped" => Self::Stopped,
            "Stopping" => Self::Stopping,
            "Cancelled" => Self::Cancelled,
            _ => Self::Unknown(raw),
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InProgress => "InProgress",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Abandoned => "Abandoned",
            Self::Stopped => "Stopped",
            Self::Stopping => "Stopping",
            Self::Cancelled => "Cancelled",
            Self::Unknown(raw) => raw,
        };
        f.write_str(text)
    }
}

/// Output of `get-pipeline-state`: the polled stage/action tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(default)]
    pub stage_states: Vec<StageSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSnapshot {
    pub stage_name: String,
    /// Set while the stage is receiving an execution handed over from the
    /// previous stage.
    #[serde(default)]
    pub inbound_execution: Option<ExecutionRef>,
    #[serde(default)]
    pub latest_execution: Option<ExecutionRef>,
    #[serde(default)]
    pub action_states: Vec<ActionSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSnapshot {
    pub action_name: String,
    #[serde(default)]
    pub latest_execution: Option<ExecutionRef>,
}

/// A stage or action execution record.
///
/// Stage records always carry the pipeline execution id; action records carry
/// the last status change instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRef {
    #[serde(default)]
    pub pipeline_execution_id: Option<ExecutionId>,
    pub status: ExecutionStatus,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub last_status_change: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub error_details: Option<ErrorDetails>,
}

impl ExecutionRef {
    pub fn belongs_to(&self, execution_id: &ExecutionId) -> bool {
        self.pipeline_execution_id.as_ref() == Some(execution_id)
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetails {
    #[serde(default)]
    pub message: Option<String>,
}

/// Static pipeline structure returned by `get-pipeline`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub stages: Vec<StageDeclaration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDeclaration {
    pub name: String,
    #[serde(default)]
    pub actions: Vec<ActionDeclaration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDeclaration {
    pub name: String,
    pub action_type_id: ActionTypeId,
    #[serde(default)]
    pub configuration: IndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionTypeId {
    /// Source, Build, Test, Deploy, Approval or Invoke.
    pub category: String,
    pub provider: String,
}

/// A single CloudWatch Logs event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    pub message: String,
}

/// One page of a log query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    #[serde(default)]
    pub events: Vec<LogEvent>,
    #[serde(default)]
    pub next_token: Option<String>,
}

impl LogPage {
    pub fn has_more(&self) -> bool {
        self.next_token.is_some()
    }
}

mod timestamp {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer};

    /// AWS CLI v2 prints ISO 8601 strings while v1 prints epoch seconds.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Epoch(f64),
        Text(String),
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<RawTimestamp>::deserialize(deserializer)? else {
            return Ok(None);
        };

        match raw {
            RawTimestamp::Epoch(seconds) => {
                #[allow(clippy::cast_possible_truncation)]
                let millis = (seconds * 1000.0).round() as i64;
                Utc.timestamp_millis_opt(millis)
                    .single()
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {seconds}")))
            }
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|parsed| Some(parsed.with_timezone(&Utc)))
                .map_err(de::Error::custom),
        }
    }
}
