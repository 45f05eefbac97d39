use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    config::SendFailurePolicy,
    domain::Conversation,
    infrastructure::shutdown::ShutdownListener,
    platform::{ChatPlatform, PlatformError},
};

pub mod url_list;

pub use url_list::{load_url_list, UrlListError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to send url #{index} ({url}) after {} sent: {source}", report.sent)]
    Send {
        index: usize,
        url: String,
        /// Progress up to and including the failed send.
        report: DispatchReport,
        #[source]
        source: PlatformError,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// Shutdown fired before the list was exhausted.
    pub interrupted: bool,
}

/// Posts URLs one at a time with a fixed pause between sends.
pub struct DispatchLoop {
    platform: Arc<dyn ChatPlatform>,
    delay: Duration,
    on_failure: SendFailurePolicy,
}

impl DispatchLoop {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        delay: Duration,
        on_failure: SendFailurePolicy,
    ) -> Self {
        Self {
            platform,
            delay,
            on_failure,
        }
    }

    pub async fn run(
        &self,
        group: &Conversation,
        urls: &[String],
        mut shutdown: ShutdownListener,
    ) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();

        for (index, url) in urls.iter().enumerate() {
            if shutdown.is_triggered() {
                report.interrupted = true;
                break;
            }

            tracing::info!(
                target: "dispatch",
                group = %group.name,
                index,
                url = %url,
                "sending url"
            );
            match self.platform.send_text(group, url).await {
                Ok(()) => {
                    report.sent += 1;
                    tracing::info!(target: "dispatch", index, url = %url, "url sent");
                }
                Err(source) => match self.on_failure {
                    SendFailurePolicy::Abort => {
                        report.failed += 1;
                        log_finished(&report);
                        return Err(DispatchError::Send {
                            index,
                            url: url.clone(),
                            report,
                            source,
                        });
                    }
                    SendFailurePolicy::Skip => {
                        report.failed += 1;
                        tracing::warn!(
                            target: "dispatch",
                            index,
                            url = %url,
                            error = %source,
                            "send failed; skipping url"
                        );
                    }
                },
            }

            if index + 1 == urls.len() {
                break;
            }
            tracing::info!(
                target: "dispatch",
                delay_secs = self.delay.as_secs(),
                "waiting before next send"
            );
            if !shutdown.sleep(self.delay).await {
                tracing::info!(target: "dispatch", "shutdown requested during delay");
                report.interrupted = true;
                break;
            }
        }

        log_finished(&report);
        Ok(report)
    }
}

fn log_finished(report: &DispatchReport) {
    tracing::info!(
        target: "dispatch",
        sent = report.sent,
        failed = report.failed,
        interrupted = report.interrupted,
        "dispatch finished"
    );
}
