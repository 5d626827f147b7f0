use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::providers::AwsSettings;
use crate::trace::{RetryPolicy, Strategy, TraceSettings};

/// Configuration file structure for pipeline-lens.
///
/// Lets users keep AWS and tracing preferences out of every invocation.
/// Command-line flags override whatever is loaded here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub trace: TraceConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AwsConfig {
    /// Path or name of the AWS CLI executable
    #[serde(default = "default_cli_path")]
    pub cli_path: String,

    /// Named profile passed to every CLI call
    pub profile: Option<String>,

    /// Region passed to every CLI call
    pub region: Option<String>,

    /// Seconds before a single CLI call is abandoned
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TraceConfig {
    /// How pipeline state is classified
    #[serde(default)]
    pub strategy: Strategy,

    /// Delay between state polls and between idle log fetches
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Action name treated as a manual approval
    #[serde(default = "default_approval_action_name")]
    pub approval_action_name: String,

    /// Prefix of the CloudWatch log group of a CodeBuild project
    #[serde(default = "default_log_group_prefix")]
    pub log_group_prefix: String,

    /// Tries per provider call on transient failures
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutputConfig {
    /// Colorize stage and action tags
    #[serde(default = "default_true")]
    pub color: bool,

    /// Prefix each log line with its local time
    #[serde(default)]
    pub timestamps: bool,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            profile: None,
            region: None,
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            poll_interval_ms: default_poll_interval_ms(),
            approval_action_name: default_approval_action_name(),
            log_group_prefix: default_log_group_prefix(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: true,
            timestamps: false,
        }
    }
}

fn default_cli_path() -> String {
    "aws".to_string()
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_approval_action_name() -> String {
    "Approval".to_string()
}

fn default_log_group_prefix() -> String {
    "/aws/codebuild/".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

impl AwsConfig {
    pub fn settings(&self) -> AwsSettings {
        AwsSettings {
            program: self.cli_path.clone(),
            profile: self.profile.clone(),
            region: self.region.clone(),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }
}

impl TraceConfig {
    pub fn settings(&self) -> TraceSettings {
        TraceSettings {
            strategy: self.strategy,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            approval_action: self.approval_action_name.clone(),
            log_group_prefix: self.log_group_prefix.clone(),
            retry: RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
            },
        }
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./pipeline-lens.toml
    /// 3. ./pipeline-lens.json
    /// 4. ./pipeline-lens.yaml
    /// 5. ./pipeline-lens.yml
    /// 6. `<user config dir>/pipeline-lens/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "pipeline-lens.toml",
            "pipeline-lens.json",
            "pipeline-lens.yaml",
            "pipeline-lens.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(path) = Self::user_config_path().filter(|path| path.exists()) {
            return Self::load_from_path(&path);
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pipeline-lens").join("config.toml"))
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        log::debug!("Loading config from {}", path.display());

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }
}
