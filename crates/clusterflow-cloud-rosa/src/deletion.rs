//! Waiting for an accepted delete to finish
//!
//! Deletion is asynchronous on the API side. After the delete call returns,
//! the cluster is polled until it disappears (404) or the destroy timeout
//! elapses. Poll failures restart the wait after a backoff, up to the retry
//! budget.

use crate::client::ClustersClient;
use crate::error::{ApiError, ClusterError, Result};
use clusterflow_cloud::{Diagnostics, Field, RetryConfig};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{Instrument, Span};

/// Time between two status checks
pub const POLL_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Destroy timeout used when none is configured
pub const DEFAULT_DESTROY_TIMEOUT_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// The API no longer knows the cluster
    NotFound,
    /// The deadline passed while the cluster still existed
    TimedOut,
}

/// Resolves the configured destroy timeout in minutes
///
/// Non-positive values fall back to the default and add a warning.
pub fn destroy_timeout(configured: &Field<i64>, id: &str, diagnostics: &mut Diagnostics) -> Duration {
    let minutes = match configured.value() {
        Some(&minutes) if minutes > 0 => minutes,
        Some(_) => {
            diagnostics.add_warning(
                "Invalid destroy timeout",
                format!(
                    "The destroy timeout of cluster '{id}' must be positive, waiting the default {DEFAULT_DESTROY_TIMEOUT_MINUTES} minutes instead"
                ),
            );
            DEFAULT_DESTROY_TIMEOUT_MINUTES
        }
        None => DEFAULT_DESTROY_TIMEOUT_MINUTES,
    };
    Duration::from_secs((minutes as u64).saturating_mul(60))
}

#[derive(Debug, Clone)]
pub struct DeletionPoller {
    interval: Duration,
    retry: RetryConfig,
}

impl Default for DeletionPoller {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            retry: RetryConfig::default(),
        }
    }
}

impl DeletionPoller {
    pub fn new(interval: Duration, retry: RetryConfig) -> Self {
        Self { interval, retry }
    }

    /// Waits for `id` to disappear, retrying failed waits with backoff
    ///
    /// Every attempt gets the full `deadline`. The last poll error is
    /// returned once the retry budget is spent.
    pub async fn wait(
        &self,
        client: &dyn ClustersClient,
        id: &str,
        deadline: Duration,
        span: &Span,
    ) -> Result<DeletionOutcome> {
        self.retry.validate()?;

        let mut attempt = 0;
        loop {
            match self
                .wait_once(client, id, deadline)
                .instrument(span.clone())
                .await
            {
                Ok(outcome) => {
                    span.in_scope(|| match outcome {
                        DeletionOutcome::NotFound => tracing::info!("Cluster was removed"),
                        DeletionOutcome::TimedOut => {
                            tracing::warn!("Cluster still exists after {:?}", deadline)
                        }
                    });
                    return Ok(outcome);
                }
                Err(e) => {
                    attempt += 1;
                    span.in_scope(|| {
                        tracing::error!(attempt, "Can't poll cluster deletion: {}", e)
                    });
                    if attempt >= self.retry.max_attempts {
                        return Err(ClusterError::remote("poll", id, e));
                    }
                    sleep(self.retry.delay_for_attempt(attempt - 1)).await;
                }
            }
        }
    }

    async fn wait_once(
        &self,
        client: &dyn ClustersClient,
        id: &str,
        deadline: Duration,
    ) -> std::result::Result<DeletionOutcome, ApiError> {
        let poll = async {
            loop {
                match client.poll(id).await {
                    Ok(cluster) => {
                        tracing::debug!(
                            state = cluster.state.as_deref().unwrap_or("unknown"),
                            "Cluster not deleted yet"
                        );
                        sleep(self.interval).await;
                    }
                    Err(e) if e.is_not_found() => return Ok(()),
                    Err(e) => return Err(e),
                }
            }
        };

        match timeout(deadline, poll).await {
            Ok(Ok(())) => Ok(DeletionOutcome::NotFound),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(DeletionOutcome::TimedOut),
        }
    }
}
