//! Waiting for a new cluster to become ready
//!
//! The add call returns as soon as the API accepts the cluster. When the plan
//! asks for it, the cluster is then fetched every [`READY_POLL_INTERVAL`]
//! until it reports [`READY_STATE`] or the deadline passes.

use crate::api::Cluster;
use crate::client::ClustersClient;
use crate::error::{ClusterError, Result};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{Instrument, Span};

pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub const READY_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Cluster state that ends the wait
pub const READY_STATE: &str = "ready";

#[derive(Debug, Clone, PartialEq)]
pub enum ReadinessOutcome {
    /// Snapshot reporting the cluster as ready
    Ready(Cluster),
    /// The deadline passed, with the last snapshot seen if any
    TimedOut(Option<Cluster>),
}

#[derive(Debug, Clone)]
pub struct ReadinessWaiter {
    interval: Duration,
    deadline: Duration,
}

impl Default for ReadinessWaiter {
    fn default() -> Self {
        Self {
            interval: READY_POLL_INTERVAL,
            deadline: READY_TIMEOUT,
        }
    }
}

impl ReadinessWaiter {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }
    }

    /// Fetches `id` until it is ready
    ///
    /// A failed fetch ends the wait with an error, there is no retry.
    pub async fn wait(
        &self,
        client: &dyn ClustersClient,
        id: &str,
        span: &Span,
    ) -> Result<ReadinessOutcome> {
        let mut latest = None;
        let poll = async {
            loop {
                match client.get(id).await {
                    Ok(cluster) if cluster.state.as_deref() == Some(READY_STATE) => {
                        return Ok(cluster);
                    }
                    Ok(cluster) => {
                        tracing::debug!(
                            state = cluster.state.as_deref().unwrap_or("unknown"),
                            "Cluster not ready yet"
                        );
                        latest = Some(cluster);
                        sleep(self.interval).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        match timeout(self.deadline, poll.instrument(span.clone())).await {
            Ok(Ok(cluster)) => {
                span.in_scope(|| tracing::info!("Cluster is ready"));
                Ok(ReadinessOutcome::Ready(cluster))
            }
            Ok(Err(e)) => {
                span.in_scope(|| tracing::error!("Can't poll cluster state: {}", e));
                Err(ClusterError::remote("poll", id, e))
            }
            Err(_) => {
                span.in_scope(|| {
                    tracing::warn!("Cluster still not ready after {:?}", self.deadline)
                });
                Ok(ReadinessOutcome::TimedOut(latest))
            }
        }
    }
}
