//! Polls the analysis service until a pending submission resolves.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::transport::AnalysisTransport;
use super::types::{AnalysisResult, JobHandle, PollStatus};
use crate::error::{ForgeError, Result};

/// Fixed delay between poll attempts.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(700);

/// Poll attempts before giving up with `PollTimeout`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Wait between a "not ready" answer and the next query
    pub delay: Duration,
    /// Queries allowed before timing out (`None` polls forever)
    pub max_attempts: Option<u32>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_POLL_DELAY,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

pub struct ResultPoller {
    transport: Arc<dyn AnalysisTransport>,
    config: PollerConfig,
}

impl ResultPoller {
    pub fn new(transport: Arc<dyn AnalysisTransport>, config: PollerConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> PollerConfig {
        self.config
    }

    /// Query until the result for `handle` is ready.
    ///
    /// Returns `Cancelled` as soon as `cancel` fires, whether a query is in
    /// flight or the poller is waiting between attempts. A query fault is
    /// returned immediately without retrying.
    pub async fn await_result(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult> {
        let mut attempts: u32 = 0;

        loop {
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ForgeError::Cancelled),
                status = self.transport.query(handle) => status?,
            };
            attempts += 1;

            match status {
                PollStatus::Ready(result) => {
                    tracing::debug!(
                        "Result for session {} ready after {} poll(s)",
                        handle.session_id(),
                        attempts
                    );
                    return Ok(result);
                }
                PollStatus::NotReady => {
                    if let Some(max) = self.config.max_attempts {
                        if attempts >= max {
                            tracing::warn!(
                                "Giving up on session {} after {} polls",
                                handle.session_id(),
                                attempts
                            );
                            return Err(ForgeError::PollTimeout {
                                session_id: handle.session_id().to_string(),
                                attempts,
                            });
                        }
                    }
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ForgeError::Cancelled),
                _ = tokio::time::sleep(self.config.delay) => {}
            }
        }
    }
}
