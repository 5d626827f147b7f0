use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::future::Future;
use std::path::PathBuf;

use crate::config::{Config, OutputConfig};
use crate::output::{dim, print_banner, ConsolePresenter};
use crate::providers::AwsCli;
use crate::trace::{Outcome, Strategy, SystemClock, Target, Tracer};

#[derive(Parser)]
#[command(name = "pipeline-lens")]
#[command(author, version, about = "Trace an AWS CodePipeline execution and tail its build logs", long_about = None)]
pub struct Cli {
    /// Name of the CodePipeline which you want to trace
    #[arg(short, long)]
    name: String,

    /// Run the pipeline before starting to trace
    #[arg(short, long, default_value_t = false, conflicts_with = "execution_id")]
    run: bool,

    /// Trace this execution instead of the most recent one
    #[arg(short, long)]
    execution_id: Option<String>,

    /// How pipeline state is classified
    #[arg(short, long, value_enum)]
    strategy: Option<Strategy>,

    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Delay between pipeline state polls
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Configuration file (defaults to ./pipeline-lens.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    no_color: bool,

    /// Prefix log lines with their local time
    #[arg(long, default_value_t = false)]
    timestamps: bool,
}

impl Cli {
    fn target(&self) -> Target {
        match (&self.execution_id, self.run) {
            (Some(id), _) => Target::Execution(id.as_str().into()),
            (None, true) => Target::Start,
            (None, false) => Target::Latest,
        }
    }

    /// Flags take precedence over the configuration file.
    fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(strategy) = self.strategy {
            config.trace.strategy = strategy;
        }
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            config.trace.poll_interval_ms = poll_interval_ms;
        }
        if self.profile.is_some() {
            config.aws.profile.clone_from(&self.profile);
        }
        if self.region.is_some() {
            config.aws.region.clone_from(&self.region);
        }
        if self.no_color {
            config.output.color = false;
        }
        if self.timestamps {
            config.output.timestamps = true;
        }
        config
    }

    pub async fn execute(&self) -> Result<Outcome> {
        let config = self.apply_overrides(Config::load(self.config.as_deref())?);
        configure_output(&config.output);

        info!("Tracing pipeline: {}", self.name);

        let aws = AwsCli::new(config.aws.settings());
        let presenter = ConsolePresenter::new(config.output.timestamps);
        let tracer = Tracer::new(
            &aws,
            &aws,
            &presenter,
            &SystemClock,
            config.trace.settings(),
        );

        tracer
            .trace(&self.name, &self.target())
            .await
            .with_context(|| format!("Failed to trace {}", self.name))
    }
}

/// Applies the color choice, then prints the banner with it.
fn configure_output(output: &OutputConfig) {
    if !output.color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }
    print_banner();
}

pub const INTERRUPTED: u8 = 130;

/// Drives `trace` to its exit status unless `interrupt` resolves first.
///
/// An interrupt future that fails, such as a signal handler that could not be
/// installed, only disables interruption.
pub async fn run_until_interrupted<T, I>(trace: T, interrupt: I) -> Result<u8>
where
    T: Future<Output = Result<Outcome>>,
    I: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        outcome = trace => Ok(exit_status(&outcome?)),
        Ok(()) = interrupt => {
            eprintln!("\n{}", dim("Interrupted. The pipeline execution keeps running."));
            Ok(INTERRUPTED)
        }
    }
}

/// Process exit status for a finished trace.
pub fn exit_status(outcome: &Outcome) -> u8 {
    match outcome {
        Outcome::Succeeded | Outcome::AwaitingApproval { .. } => 0,
        Outcome::Failed { .. } => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ExecutionId, ExecutionStatus};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pipeline-lens").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn name_is_required() {
        assert!(Cli::try_parse_from(["pipeline-lens"]).is_err());
    }

    #[test]
    fn traces_latest_execution_by_default() {
        assert_eq!(parse(&["--name", "web"]).target(), Target::Latest);
    }

    #[test]
    fn run_flag_starts_an_execution() {
        assert_eq!(parse(&["--name", "web", "--run"]).target(), Target::Start);
    }

    #[test]
    fn execution_id_selects_execution() {
        assert_eq!(
            parse(&["-n", "web", "-e", "exec-7"]).target(),
            Target::Execution(ExecutionId::from("exec-7"))
        );
    }

    #[test]
    fn run_conflicts_with_execution_id() {
        let result =
            Cli::try_parse_from(["pipeline-lens", "--name", "web", "--run", "--execution-id", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "--name",
            "web",
            "--strategy",
            "flat",
            "--poll-interval-ms",
            "250",
            "--region",
            "ap-northeast-1",
            "--no-color",
        ]);

        let config = cli.apply_overrides(Config::default());
        assert_eq!(config.trace.strategy, Strategy::Flat);
        assert_eq!(config.trace.poll_interval_ms, 250);
        assert_eq!(config.aws.region, Some("ap-northeast-1".to_string()));
        assert!(!config.output.color);
    }

    #[test]
    fn disabled_color_applies_before_banner() {
        configure_output(&OutputConfig {
            color: false,
            timestamps: false,
        });
        assert!(!console::colors_enabled_stderr());
        assert!(!console::colors_enabled());
    }

    #[tokio::test]
    async fn interrupt_exits_with_130() {
        let interrupt = async { Ok::<(), std::io::Error>(()) };
        let status = run_until_interrupted(std::future::pending(), interrupt)
            .await
            .unwrap();
        assert_eq!(status, INTERRUPTED);
    }

    #[tokio::test]
    async fn failed_signal_setup_keeps_tracing() {
        let trace = async {
            tokio::task::yield_now().await;
            Ok::<_, anyhow::Error>(Outcome::Failed {
                stage: "Build".to_string(),
                action: "Compile".to_string(),
                status: ExecutionStatus::Failed,
            })
        };
        let interrupt = async { Err(std::io::Error::other("signal handler unavailable")) };

        assert_eq!(run_until_interrupted(trace, interrupt).await.unwrap(), 2);
    }

    #[test]
    fn exit_status_per_outcome() {
        assert_eq!(exit_status(&Outcome::Succeeded), 0);
        assert_eq!(
            exit_status(&Outcome::AwaitingApproval {
                stage: "Release".to_string(),
                action: "Approval".to_string(),
            }),
            0
        );
        assert_eq!(
            exit_status(&Outcome::Failed {
                stage: "Build".to_string(),
                action: "Compile".to_string(),
                status: ExecutionStatus::Failed,
            }),
            2
        );
    }
}
