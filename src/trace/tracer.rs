use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::error::Result;
use crate::output::Presenter;
use crate::pipeline::{ExecutionId, ExecutionStatus, StateSnapshot};
use crate::providers::{LogProvider, PipelineProvider};

use super::classifier::{Position, Strategy};
use super::clock::Clock;
use super::cursor::LogCursor;
use super::projects::ActionIndex;
use super::retry::RetryPolicy;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Which execution of the pipeline to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Start a new execution and follow it.
    Start,
    /// Follow the most recent execution.
    Latest,
    Execution(ExecutionId),
}

/// How a trace ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed {
        stage: String,
        action: String,
        status: ExecutionStatus,
    },
    /// Paused on a manual approval; nothing will change without a human.
    AwaitingApproval { stage: String, action: String },
}

#[derive(Debug, Clone)]
pub struct TraceSettings {
    pub strategy: Strategy,
    pub poll_interval: Duration,
    pub approval_action: String,
    /// Prepended to a build project name to get its log group.
    pub log_group_prefix: String,
    pub retry: RetryPolicy,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            approval_action: "Approval".to_string(),
            log_group_prefix: "/aws/codebuild/".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// The action whose logs are being tailed, with its own cursor.
#[derive(Debug, Default)]
struct FollowedAction {
    key: Option<(String, String)>,
    cursor: LogCursor,
}

impl FollowedAction {
    /// Cursor for `stage`/`action`, started fresh when the action differs from
    /// the one followed so far.
    fn cursor_for(&mut self, stage: &str, action: &str) -> &mut LogCursor {
        let same = self
            .key
            .as_ref()
            .is_some_and(|(s, a)| s == stage && a == action);
        if !same {
            debug!("Following logs of {stage}/{action}");
            self.key = Some((stage.to_string(), action.to_string()));
            self.cursor = LogCursor::new();
        }
        &mut self.cursor
    }
}

enum Step {
    Continue,
    Done(Outcome),
}

/// Polls the pipeline until the traced execution reaches a terminal state,
/// streaming build logs of the running action along the way.
pub struct Tracer<'a> {
    pipelines: &'a dyn PipelineProvider,
    logs: &'a dyn LogProvider,
    presenter: &'a dyn Presenter,
    clock: &'a dyn Clock,
    settings: TraceSettings,
}

impl<'a> Tracer<'a> {
    pub fn new(
        pipelines: &'a dyn PipelineProvider,
        logs: &'a dyn LogProvider,
        presenter: &'a dyn Presenter,
        clock: &'a dyn Clock,
        settings: TraceSettings,
    ) -> Self {
        Self {
            pipelines,
            logs,
            presenter,
            clock,
            settings,
        }
    }

    /// Resolves the target execution and follows it to the end.
    ///
    /// # Errors
    ///
    /// Fails when the pipeline cannot be read, when it has no execution to
    /// trace, or when a provider call keeps failing after retries.
    pub async fn trace(&self, pipeline: &str, target: &Target) -> Result<Outcome> {
        let definition = self
            .settings
            .retry
            .run(self.clock, "get-pipeline", || self.pipelines.definition(pipeline))
            .await?;
        debug!(
            "Loaded definition of {} with {} stages",
            definition.name,
            definition.stages.len()
        );
        let index = ActionIndex::new(&definition, &self.settings.approval_action);
        if index.is_empty() {
            warn!("Pipeline {pipeline} declares no actions");
        }

        let execution = self.resolve_execution(pipeline, target).await?;
        self.presenter.started(pipeline, &execution);

        self.follow(pipeline, &execution, &index).await
    }

    async fn resolve_execution(&self, pipeline: &str, target: &Target) -> Result<ExecutionId> {
        match target {
            // Starting is not idempotent, so it is never retried.
            Target::Start => self.pipelines.start_execution(pipeline).await,
            Target::Latest => {
                self.settings
                    .retry
                    .run(self.clock, "list-pipeline-executions", || {
                        self.pipelines.latest_execution_id(pipeline)
                    })
                    .await
            }
            Target::Execution(id) => Ok(id.clone()),
        }
    }

    /// Runs the polling loop for an already known execution.
    pub async fn follow(
        &self,
        pipeline: &str,
        execution: &ExecutionId,
        index: &ActionIndex,
    ) -> Result<Outcome> {
        info!(
            "Tracing {pipeline} execution {execution} ({:?} strategy)",
            self.settings.strategy
        );

        let mut current = (String::new(), String::new());
        let mut followed = FollowedAction::default();

        loop {
            let snapshot = self
                .settings
                .retry
                .run(self.clock, "get-pipeline-state", || self.pipelines.state(pipeline))
                .await?;
            let position = self.settings.strategy.classify(
                &snapshot,
                execution,
                &self.settings.approval_action,
            );

            if (position.stage(), position.action()) != (current.0.as_str(), current.1.as_str()) {
                current = (position.stage().to_string(), position.action().to_string());
                if !position.action().is_empty() {
                    self.presenter.entered(position.stage(), position.action());
                }
            }

            match self
                .step(pipeline, position, &snapshot, index, &mut followed)
                .await?
            {
                Step::Done(outcome) => {
                    info!("Trace of {pipeline} finished: {outcome:?}");
                    return Ok(outcome);
                }
                Step::Continue => self.clock.sleep(self.settings.poll_interval).await,
            }
        }
    }

    async fn step(
        &self,
        pipeline: &str,
        position: Position,
        snapshot: &StateSnapshot,
        index: &ActionIndex,
        followed: &mut FollowedAction,
    ) -> Result<Step> {
        let (stage, action, status, last_change) = match position {
            Position::InTransition { stage } => {
                let status = match stage {
                    Some(stage) => format!("Entering stage {stage}..."),
                    None => "Waiting for the next stage...".to_string(),
                };
                self.presenter.waiting(&status);
                return Ok(Step::Continue);
            }
            Position::Completed => {
                self.presenter.completed(pipeline);
                return Ok(Step::Done(Outcome::Succeeded));
            }
            Position::WaitingForApproval { stage, action } => {
                return Ok(self.await_approval(pipeline, stage, action));
            }
            Position::Active {
                stage,
                action,
                status,
                last_change,
            } => (stage, action, status, last_change),
        };

        if status.is_failure() {
            let reason = failure_reason(snapshot, &stage, &action);
            self.presenter
                .failed(pipeline, &stage, &action, &status, reason);
            return Ok(Step::Done(Outcome::Failed {
                stage,
                action,
                status,
            }));
        }

        match &status {
            ExecutionStatus::InProgress if index.is_approval(&action) => {
                return Ok(self.await_approval(pipeline, stage, action));
            }
            ExecutionStatus::Unknown(raw) => {
                warn!("Unrecognised status {raw:?} for {stage}/{action}, treating it as in progress");
            }
            _ => debug!("In stage: {stage}, action: {action}, status: {status}"),
        }

        match index.project(&action) {
            Some(project) => {
                let log_group = format!("{}{project}", self.settings.log_group_prefix);
                self.presenter
                    .waiting(&format!("{stage} / {action}: {status}"));
                self.tail(&log_group, &stage, &action, last_change, followed)
                    .await?;
            }
            None => {
                self.presenter
                    .waiting(&format!("{stage} / {action}: {status} (no build logs)"));
            }
        }

        Ok(Step::Continue)
    }

    fn await_approval(&self, pipeline: &str, stage: String, action: String) -> Step {
        self.presenter.awaiting_approval(pipeline, &stage, &action);
        Step::Done(Outcome::AwaitingApproval { stage, action })
    }

    /// Prints every log event not shown yet, following continuation pages.
    async fn tail(
        &self,
        log_group: &str,
        stage: &str,
        action: &str,
        last_change: Option<DateTime<Utc>>,
        followed: &mut FollowedAction,
    ) -> Result<()> {
        let cursor = followed.cursor_for(stage, action);
        let query_start = match cursor.start() {
            Some(start) => start,
            None => cursor.seed(last_change.unwrap_or_else(|| self.clock.now())),
        };

        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .settings
                .retry
                .run(self.clock, "filter-log-events", || {
                    self.logs
                        .fetch_events(log_group, query_start, next_token.as_deref())
                })
                .await?;

            // Pages of one query never overlap, so only events from before
            // the query start can be repeats.
            for event in page.events.iter().filter(|e| e.timestamp >= query_start) {
                self.presenter.print(stage, action, event);
                cursor.advance(event);
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => return Ok(()),
            }
        }
    }
}

/// Error message the provider attached to a failed action, if any.
fn failure_reason<'s>(snapshot: &'s StateSnapshot, stage: &str, action: &str) -> Option<&'s str> {
    let execution = snapshot
        .stage_states
        .iter()
        .filter(|s| s.stage_name == stage)
        .flat_map(|s| &s.action_states)
        .find(|a| a.action_name == action)?
        .latest_execution
        .as_ref()?;

    execution
        .error_details
        .as_ref()
        .and_then(|details| details.message.as_deref())
        .or(execution.summary.as_deref())
}
