use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::pipeline::{ExecutionId, ExecutionStatus, StageSnapshot, StateSnapshot};

/// Where the traced execution currently is, derived fresh from every poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    /// An action of the traced execution has started and not yet succeeded.
    Active {
        stage: String,
        action: String,
        status: ExecutionStatus,
        last_change: Option<DateTime<Utc>>,
    },
    /// Nothing is running right now. `stage` is set when a stage already
    /// belongs to the execution but its action records have not appeared.
    InTransition { stage: Option<String> },
    /// The current action is a manual approval.
    WaitingForApproval { stage: String, action: String },
    Completed,
}

impl Position {
    pub fn stage(&self) -> &str {
        match self {
            Self::Active { stage, .. } | Self::WaitingForApproval { stage, .. } => stage,
            Self::InTransition { stage } => stage.as_deref().unwrap_or(""),
            Self::Completed => "",
        }
    }

    pub fn action(&self) -> &str {
        match self {
            Self::Active { action, .. } | Self::WaitingForApproval { action, .. } => action,
            Self::InTransition { .. } | Self::Completed => "",
        }
    }
}

/// How a state snapshot is turned into a [`Position`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Follows stage membership of the traced execution and reports the gaps
    /// between stages as transitions.
    #[default]
    GapAware,
    /// Scans every action in pipeline order and reports the first one that has
    /// not succeeded, whichever execution it belongs to.
    Flat,
}

impl Strategy {
    pub fn classify(
        self,
        snapshot: &StateSnapshot,
        execution_id: &ExecutionId,
        approval_action: &str,
    ) -> Position {
        match self {
            Self::GapAware => classify_gap_aware(snapshot, execution_id),
            Self::Flat => classify_flat(snapshot, approval_action),
        }
    }
}

fn belongs_to_execution(stage: &StageSnapshot, execution_id: &ExecutionId) -> bool {
    stage
        .inbound_execution
        .iter()
        .chain(stage.latest_execution.iter())
        .any(|execution| execution.belongs_to(execution_id))
}

fn is_stage_succeeded(stage: &StageSnapshot) -> bool {
    stage
        .inbound_execution
        .iter()
        .chain(stage.latest_execution.iter())
        .any(|execution| execution.is_succeeded())
}

fn is_pipeline_completed(last_stage: &StageSnapshot, execution_id: &ExecutionId) -> bool {
    last_stage
        .latest_execution
        .as_ref()
        .is_some_and(|execution| execution.belongs_to(execution_id) && execution.is_succeeded())
}

/// Locates the first unfinished action of the stage the traced execution is in.
pub fn classify_gap_aware(snapshot: &StateSnapshot, execution_id: &ExecutionId) -> Position {
    let current_stage = snapshot
        .stage_states
        .iter()
        .filter(|stage| belongs_to_execution(stage, execution_id))
        .find(|stage| !is_stage_succeeded(stage));

    if let Some(stage) = current_stage {
        let running = stage.action_states.iter().find_map(|action| {
            let execution = action.latest_execution.as_ref()?;
            (!execution.is_succeeded()).then_some((action, execution))
        });

        // The stage has been entered but none of its actions has a record yet.
        let Some((action, execution)) = running else {
            return Position::InTransition {
                stage: Some(stage.stage_name.clone()),
            };
        };

        return Position::Active {
            stage: stage.stage_name.clone(),
            action: action.action_name.clone(),
            status: execution.status.clone(),
            last_change: execution.last_status_change,
        };
    }

    if snapshot
        .stage_states
        .last()
        .is_some_and(|last| is_pipeline_completed(last, execution_id))
    {
        log::debug!("Final stage succeeded for execution {execution_id}");
        return Position::Completed;
    }

    // Between two stages nothing belongs to the execution yet.
    Position::InTransition { stage: None }
}

/// Reports the first action that has not succeeded, ignoring stage membership.
pub fn classify_flat(snapshot: &StateSnapshot, approval_action: &str) -> Position {
    for stage in &snapshot.stage_states {
        for action in &stage.action_states {
            let Some(execution) = &action.latest_execution else {
                return Position::InTransition {
                    stage: Some(stage.stage_name.clone()),
                };
            };

            if execution.is_succeeded() {
                continue;
            }

            if action.action_name == approval_action {
                return Position::WaitingForApproval {
                    stage: stage.stage_name.clone(),
                    action: action.action_name.clone(),
                };
            }

            return Position::Active {
                stage: stage.stage_name.clone(),
                action: action.action_name.clone(),
                status: execution.status.clone(),
                last_change: execution.last_status_change,
            };
        }
    }

    Position::Completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EXECUTION: &str = "exec-2";

    fn snapshot(value: serde_json::Value) -> StateSnapshot {
        serde_json::from_value(value).unwrap()
    }

    fn exec() -> ExecutionId {
        ExecutionId::from(EXECUTION)
    }

    fn three_stage_pipeline(build_action: serde_json::Value) -> StateSnapshot {
        snapshot(json!({
            "pipelineName": "web",
            "stageStates": [
                {
                    "stageName": "Source",
                    "latestExecution": {"pipelineExecutionId": EXECUTION, "status": "Succeeded"},
                    "actionStates": [
                        {"actionName": "Checkout", "latestExecution": {"status": "Succeeded"}}
                    ]
                },
                {
                    "stageName": "Build",
                    "latestExecution": {"pipelineExecutionId": EXECUTION, "status": "InProgress"},
                    "actionStates": [
                        {"actionName": "Lint", "latestExecution": {"status": "Succeeded"}},
                        build_action
                    ]
                },
                {
                    "stageName": "Deploy",
                    "latestExecution": {"pipelineExecutionId": "exec-1", "status": "Succeeded"},
                    "actionStates": [
                        {"actionName": "Ship", "latestExecution": {"status": "Succeeded"}}
                    ]
                }
            ]
        }))
    }

    mod gap_aware {
        use super::*;

        #[test]
        fn returns_first_unfinished_action_of_current_stage() {
            let state = three_stage_pipeline(json!({
                "actionName": "CompileAction",
                "latestExecution": {"status": "InProgress", "lastStatusChange": "2024-05-01T00:00:00Z"}
            }));

            let (stage, action, status, last_change) = match classify_gap_aware(&state, &exec()) {
                Position::Active { stage, action, status, last_change } => {
                    (stage, action, status, last_change)
                }
                other => panic!("expected an active position, got {other:?}"),
            };
            assert_eq!(stage, "Build");
            assert_eq!(action, "CompileAction");
            assert_eq!(status, ExecutionStatus::InProgress);
            assert_eq!(last_change.unwrap().timestamp_millis(), 1_714_521_600_000);
        }

        #[test]
        fn reports_failed_action_with_timestamp() {
            let state = three_stage_pipeline(json!({
                "actionName": "CompileAction",
                "latestExecution": {"status": "Failed", "lastStatusChange": "2024-05-01T00:00:05Z"}
            }));

            let position = classify_gap_aware(&state, &exec());
            assert_eq!(position.stage(), "Build");
            assert_eq!(position.action(), "CompileAction");
            assert!(matches!(
                position,
                Position::Active { status: ExecutionStatus::Failed, last_change: Some(_), .. }
            ));
        }

        #[test]
        fn stage_without_action_records_is_in_transition() {
            let state = snapshot(json!({
                "stageStates": [{
                    "stageName": "Build",
                    "latestExecution": {"pipelineExecutionId": EXECUTION, "status": "InProgress"},
                    "actionStates": [{"actionName": "CompileAction"}]
                }]
            }));

            assert_eq!(
                classify_gap_aware(&state, &exec()),
                Position::InTransition { stage: Some("Build".to_string()) }
            );
        }

        #[test]
        fn inbound_execution_marks_membership() {
            let state = snapshot(json!({
                "stageStates": [{
                    "stageName": "Build",
                    "inboundExecution": {"pipelineExecutionId": EXECUTION, "status": "InProgress"},
                    "latestExecution": {"pipelineExecutionId": "exec-1", "status": "Failed"},
                    "actionStates": [
                        {"actionName": "CompileAction", "latestExecution": {"status": "InProgress"}}
                    ]
                }]
            }));

            assert_eq!(classify_gap_aware(&state, &exec()).action(), "CompileAction");
        }

        #[test]
        fn never_reports_stage_of_another_execution() {
            let state = snapshot(json!({
                "stageStates": [
                    {
                        "stageName": "Build",
                        "latestExecution": {"pipelineExecutionId": "exec-1", "status": "InProgress"},
                        "actionStates": [
                            {"actionName": "CompileAction", "latestExecution": {"status": "InProgress"}}
                        ]
                    },
                    {
                        "stageName": "Deploy",
                        "latestExecution": {"pipelineExecutionId": "exec-1", "status": "Failed"},
                        "actionStates": [
                            {"actionName": "Ship", "latestExecution": {"status": "Failed"}}
                        ]
                    }
                ]
            }));

            assert_eq!(
                classify_gap_aware(&state, &exec()),
                Position::InTransition { stage: None }
            );
        }

        #[test]
        fn succeeded_last_stage_means_completed() {
            let state = snapshot(json!({
                "stageStates": [
                    {
                        "stageName": "Build",
                        "latestExecution": {"pipelineExecutionId": EXECUTION, "status": "Succeeded"},
                        "actionStates": [
                            {"actionName": "CompileAction", "latestExecution": {"status": "Succeeded"}}
                        ]
                    },
                    {
                        "stageName": "Deploy",
                        "latestExecution": {"pipelineExecutionId": EXECUTION, "status": "Succeeded"},
                        "actionStates": [
                            {"actionName": "Ship", "latestExecution": {"status": "Succeeded"}}
                        ]
                    }
                ]
            }));

            assert_eq!(classify_gap_aware(&state, &exec()), Position::Completed);
        }

        #[test]
        fn stage_with_every_action_succeeded_is_handing_over() {
            let state = three_stage_pipeline(json!({
                "actionName": "CompileAction",
                "latestExecution": {"status": "Succeeded"}
            }));
            // Build has every action succeeded but the stage itself is still
            // running, so the traced execution is handing over.
            assert_eq!(
                classify_gap_aware(&state, &exec()),
                Position::InTransition { stage: Some("Build".to_string()) }
            );
        }

        #[test]
        fn empty_snapshot_is_in_transition() {
            assert_eq!(
                classify_gap_aware(&StateSnapshot::default(), &exec()),
                Position::InTransition { stage: None }
            );
        }
    }

    mod flat {
        use super::*;

        #[test]
        fn approval_action_yields_waiting() {
            let state = snapshot(json!({
                "stageStates": [
                    {
                        "stageName": "Build",
                        "actionStates": [
                            {"actionName": "CompileAction", "latestExecution": {"status": "Succeeded"}}
                        ]
                    },
                    {
                        "stageName": "Release",
                        "actionStates": [
                            {"actionName": "Approval", "latestExecution": {"status": "InProgress"}}
                        ]
                    }
                ]
            }));

            assert_eq!(
                classify_flat(&state, "Approval"),
                Position::WaitingForApproval {
                    stage: "Release".to_string(),
                    action: "Approval".to_string(),
                }
            );
        }

        #[test]
        fn ignores_stage_membership() {
            let state = snapshot(json!({
                "stageStates": [{
                    "stageName": "Build",
                    "latestExecution": {"pipelineExecutionId": "exec-1", "status": "InProgress"},
                    "actionStates": [
                        {"actionName": "CompileAction", "latestExecution": {"status": "InProgress"}}
                    ]
                }]
            }));

            assert_eq!(
                Strategy::Flat.classify(&state, &exec(), "Approval").action(),
                "CompileAction"
            );
            assert_eq!(
                Strategy::GapAware.classify(&state, &exec(), "Approval"),
                Position::InTransition { stage: None }
            );
        }

        #[test]
        fn action_without_record_is_in_transition() {
            let state = snapshot(json!({
                "stageStates": [{
                    "stageName": "Deploy",
                    "actionStates": [{"actionName": "Ship"}]
                }]
            }));

            assert_eq!(
                classify_flat(&state, "Approval"),
                Position::InTransition { stage: Some("Deploy".to_string()) }
            );
        }

        #[test]
        fn all_succeeded_is_completed() {
            let state = three_stage_pipeline(json!({
                "actionName": "CompileAction",
                "latestExecution": {"status": "Succeeded"}
            }));

            assert_eq!(classify_flat(&state, "Approval"), Position::Completed);
        }
    }
}
