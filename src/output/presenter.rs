use chrono::{Local, TimeZone};

use crate::pipeline::{ExecutionId, ExecutionStatus, LogEvent};

use super::progress::WaitSpinner;
use super::styling::{action, bright, bright_green, bright_red, bright_yellow, dim, stage};

/// Everything the trace shows to the user.
pub trait Presenter {
    fn started(&self, pipeline: &str, execution: &ExecutionId);

    /// The execution moved on to a new action.
    fn entered(&self, stage: &str, action: &str);

    /// One build log line, tagged with the action that produced it.
    fn print(&self, stage: &str, action: &str, event: &LogEvent);

    /// Nothing to print yet; `status` says what the trace is waiting on.
    fn waiting(&self, status: &str);

    fn completed(&self, pipeline: &str);

    fn failed(
        &self,
        pipeline: &str,
        stage: &str,
        action: &str,
        status: &ExecutionStatus,
        reason: Option<&str>,
    );

    fn awaiting_approval(&self, pipeline: &str, stage: &str, action: &str);
}

pub fn render_started(pipeline: &str, execution: &ExecutionId) -> String {
    format!(
        "Starting to trace {} {}\n",
        bright(pipeline),
        dim(format!("(execution {execution})"))
    )
}

pub fn render_transition(stage_name: &str, action_name: &str) -> String {
    format!(
        "🏁\n🏁 Pipeline has entered stage {}, action {}\n🏁\n",
        stage(stage_name),
        action(action_name)
    )
}

pub fn render_log_line(
    stage_name: &str,
    action_name: &str,
    event: &LogEvent,
    with_time: bool,
) -> String {
    let message = event.message.trim_end_matches(['\r', '\n']);
    let prefix = with_time
        .then(|| Local.timestamp_millis_opt(event.timestamp).single())
        .flatten()
        .map(|time| format!("{} ", dim(time.format("%H:%M:%S"))))
        .unwrap_or_default();

    format!(
        "{prefix}{} {} {message}",
        stage(stage_name),
        action(action_name)
    )
}

pub fn render_completed(pipeline: &str) -> String {
    format!(
        "🎂 {}",
        bright_green(format!("{pipeline} has been completed successfully!"))
    )
}

pub fn render_failed(
    pipeline: &str,
    stage_name: &str,
    action_name: &str,
    status: &ExecutionStatus,
    reason: Option<&str>,
) -> String {
    let mut rendered = format!(
        "🚫 {}\n🚫 stage: {}, action: {}, status: {}",
        bright_red(format!("{pipeline} has failed.")),
        stage(stage_name),
        action(action_name),
        bright_red(status)
    );
    if let Some(reason) = reason {
        rendered.push_str(&format!("\n🚫 {reason}"));
    }
    rendered
}

pub fn render_awaiting_approval(pipeline: &str, stage_name: &str, action_name: &str) -> String {
    format!(
        "🖐 {}\n🖐 stage: {}, action: {}",
        bright_yellow(format!("{pipeline} is waiting for approval")),
        stage(stage_name),
        action(action_name)
    )
}

/// Writes the timeline to stdout.
pub struct ConsolePresenter {
    spinner: WaitSpinner,
    timestamps: bool,
}

impl ConsolePresenter {
    pub fn new(timestamps: bool) -> Self {
        Self {
            spinner: WaitSpinner::new(console::user_attended_stderr()),
            timestamps,
        }
    }

    fn emit(&self, text: String) {
        self.spinner.suspend(|| println!("{text}"));
    }

    fn finish(&self, text: String) {
        self.spinner.clear();
        println!("{text}");
    }
}

impl Presenter for ConsolePresenter {
    fn started(&self, pipeline: &str, execution: &ExecutionId) {
        self.emit(render_started(pipeline, execution));
    }

    fn entered(&self, stage: &str, action: &str) {
        self.emit(render_transition(stage, action));
    }

    fn print(&self, stage: &str, action: &str, event: &LogEvent) {
        self.emit(render_log_line(stage, action, event, self.timestamps));
    }

    fn waiting(&self, status: &str) {
        self.spinner.set_message(dim(status).to_string());
    }

    fn completed(&self, pipeline: &str) {
        self.finish(render_completed(pipeline));
    }

    fn failed(
        &self,
        pipeline: &str,
        stage: &str,
        action: &str,
        status: &ExecutionStatus,
        reason: Option<&str>,
    ) {
        self.finish(render_failed(pipeline, stage, action, status, reason));
    }

    fn awaiting_approval(&self, pipeline: &str, stage: &str, action: &str) {
        self.finish(render_awaiting_approval(pipeline, stage, action));
    }
}

#[cfg(test)]
pub mod testing {
    use std::cell::RefCell;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Shown {
        Started(String),
        Entered { stage: String, action: String },
        Line { stage: String, action: String, message: String },
        Waiting(String),
        Completed,
        Failed { stage: String, action: String, status: ExecutionStatus },
        AwaitingApproval { stage: String, action: String },
    }

    /// Keeps everything shown, in order.
    #[derive(Default)]
    pub struct RecordingPresenter {
        shown: RefCell<Vec<Shown>>,
    }

    impl RecordingPresenter {
        pub fn shown(&self) -> Vec<Shown> {
            self.shown.borrow().clone()
        }

        pub fn lines(&self) -> Vec<String> {
            self.shown
                .borrow()
                .iter()
                .filter_map(|shown| match shown {
                    Shown::Line { message, .. } => Some(message.clone()),
                    _ => None,
                })
                .collect()
        }

        fn push(&self, shown: Shown) {
            self.shown.borrow_mut().push(shown);
        }
    }

    impl Presenter for RecordingPresenter {
        fn started(&self, _pipeline: &str, execution: &ExecutionId) {
            self.push(Shown::Started(execution.to_string()));
        }

        fn entered(&self, stage: &str, action: &str) {
            self.push(Shown::Entered {
                stage: stage.to_string(),
                action: action.to_string(),
            });
        }

        fn print(&self, stage: &str, action: &str, event: &LogEvent) {
            self.push(Shown::Line {
                stage: stage.to_string(),
                action: action.to_string(),
                message: event.message.clone(),
            });
        }

        fn waiting(&self, status: &str) {
            self.push(Shown::Waiting(status.to_string()));
        }

        fn completed(&self, _pipeline: &str) {
            self.push(Shown::Completed);
        }

        fn failed(
            &self,
            _pipeline: &str,
            stage: &str,
            action: &str,
            status: &ExecutionStatus,
            _reason: Option<&str>,
        ) {
            self.push(Shown::Failed {
                stage: stage.to_string(),
                action: action.to_string(),
                status: status.clone(),
            });
        }

        fn awaiting_approval(&self, _pipeline: &str, stage: &str, action: &str) {
            self.push(Shown::AwaitingApproval {
                stage: stage.to_string(),
                action: action.to_string(),
            });
        }
    }
}
