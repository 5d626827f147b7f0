use async_trait::async_trait;
use log::debug;

use crate::error::{LensError, Result};
use crate::pipeline::LogPage;
use crate::providers::LogProvider;

use super::client::AwsCli;

const SERVICE: &str = "logs";

/// CodeBuild creates the log group on the first build that writes to it.
fn is_missing_log_group(err: &LensError) -> bool {
    matches!(err, LensError::AwsCli { message, .. } if message.contains("ResourceNotFoundException"))
}

#[async_trait]
impl LogProvider for AwsCli {
    async fn fetch_events(
        &self,
        log_group: &str,
        start_millis: i64,
        next_token: Option<&str>,
    ) -> Result<LogPage> {
        let start = start_millis.to_string();
        let mut args = vec![
            "--log-group-name",
            log_group,
            "--start-time",
            start.as_str(),
            "--no-paginate",
        ];
        if let Some(token) = next_token {
            args.extend(["--next-token", token]);
        }

        match self.call::<LogPage>(SERVICE, "filter-log-events", &args).await {
            Ok(page) => {
                debug!(
                    "Fetched {} events from {log_group} (more: {})",
                    page.events.len(),
                    page.has_more()
                );
                Ok(page)
            }
            Err(e) if is_missing_log_group(&e) => {
                debug!("Log group {log_group} does not exist yet");
                Ok(LogPage::default())
            }
            Err(e) => Err(e),
        }
    }
}
