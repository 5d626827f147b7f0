use std::process::Stdio;
use std::time::Duration;

use log::debug;
use serde::de::DeserializeOwned;
use tokio::process::Command;

use crate::error::{LensError, Result};

const DEFAULT_PROGRAM: &str = "aws";
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// How to invoke the AWS CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSettings {
    /// Path or name of the `aws` executable.
    pub program: String,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub call_timeout: Duration,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            profile: None,
            region: None,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
        }
    }
}

/// CodePipeline and CloudWatch Logs access through the AWS CLI.
///
/// Credentials, regions and endpoints resolve exactly as they do for the
/// user's own `aws` invocations.
pub struct AwsCli {
    settings: AwsSettings,
}

impl AwsCli {
    pub fn new(settings: AwsSettings) -> Self {
        Self { settings }
    }

    fn command(&self, service: &str, operation: &str, args: &[&str]) -> Command {
        let mut command = Command::new(&self.settings.program);
        command
            .arg("--output")
            .arg("json")
            .env("AWS_PAGER", "")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(profile) = &self.settings.profile {
            command.arg("--profile").arg(profile);
        }
        if let Some(region) = &self.settings.region {
            command.arg("--region").arg(region);
        }

        command.arg(service).arg(operation).args(args);
        command
    }

    /// Runs one CLI operation and decodes its JSON output.
    ///
    /// # Errors
    ///
    /// Returns [`LensError::Timeout`] when the call exceeds the configured
    /// timeout, and [`LensError::AwsCli`] or [`LensError::Throttled`] when the
    /// CLI exits unsuccessfully.
    pub(super) async fn call<T>(&self, service: &str, operation: &str, args: &[&str]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let name = format!("{service} {operation}");
        debug!("Running aws {name} {}", args.join(" "));

        let output = tokio::time::timeout(
            self.settings.call_timeout,
            self.command(service, operation, args).output(),
        )
        .await
        .map_err(|_| LensError::Timeout {
            command: name.clone(),
            seconds: self.settings.call_timeout.as_secs(),
        })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LensError::from_cli_failure(&name, &stderr));
        }

        let parsed = serde_json::from_slice(&output.stdout)?;
        Ok(parsed)
    }
}
