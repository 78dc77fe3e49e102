//! ROSA classic cluster lifecycle
//!
//! [`ClusterResource`] implements create, read, update, delete and import on
//! top of a [`ClustersClient`], keeping the record in a [`StateStore`] in
//! sync with what the API reports.

use crate::api::{Cluster, ClusterNodes, MachinePoolAutoscaling};
use crate::client::ClustersClient;
use crate::deletion::{DeletionOutcome, DeletionPoller, destroy_timeout};
use crate::error::{ApiError, ClusterError, Result, UPDATE_HEADLINE};
use crate::mapper::{build_cluster, populate};
use crate::model::ClusterState;
use crate::readiness::{READY_STATE, ReadinessOutcome, ReadinessWaiter};
use crate::thumbprint::{ThumbprintResolver, TlsThumbprintResolver};
use crate::validate;
use clusterflow_cloud::{CloudError, Diagnostics, ResourceState, ResourceStatus, StateStore};
use std::sync::Arc;
use tracing::{Instrument, Span};

/// Provider and type prefix of state store keys
pub const STATE_KEY_PREFIX: &str = "rosa-classic:cluster";

pub const RESOURCE_TYPE: &str = "cluster";

/// Attribute holding the serialized [`ClusterState`]
const STATE_ATTRIBUTE: &str = "cluster";

/// Result of a lifecycle operation that completed
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The refreshed record, `None` after a delete
    pub state: Option<ClusterState>,
    /// Warnings raised along the way
    pub diagnostics: Diagnostics,
}

impl Applied {
    fn with_state(state: ClusterState) -> Self {
        Self {
            state: Some(state),
            diagnostics: Diagnostics::new(),
        }
    }
}

pub fn state_key(name: &str) -> String {
    format!("{}:{}", STATE_KEY_PREFIX, name)
}

fn cluster_span(name: &str) -> Span {
    tracing::info_span!("cluster", name = %name)
}

pub struct ClusterResource {
    client: Arc<dyn ClustersClient>,
    store: Arc<dyn StateStore>,
    resolver: Arc<dyn ThumbprintResolver>,
    poller: DeletionPoller,
    waiter: ReadinessWaiter,
}

impl ClusterResource {
    pub fn new(client: Arc<dyn ClustersClient>, store: Arc<dyn StateStore>) -> Self {
        Self {
            client,
            store,
            resolver: Arc::new(TlsThumbprintResolver::new()),
            poller: DeletionPoller::default(),
            waiter: ReadinessWaiter::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ThumbprintResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_poller(mut self, poller: DeletionPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_waiter(mut self, waiter: ReadinessWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    /// Creates the cluster described by `plan`
    ///
    /// Nothing is persisted unless the cluster was accepted by the API. With
    /// `wait_for_create_complete` set, the accepted cluster is recorded first
    /// and then polled until ready; running out of time is a warning.
    pub async fn create(&self, plan: ClusterState) -> Result<Applied> {
        let span = cluster_span(&plan.name);

        let payload = build_cluster(&plan).inspect_err(|e| {
            span.in_scope(|| tracing::error!("{}: {}", e.headline(), e));
        })?;

        span.in_scope(|| tracing::info!(region = %plan.cloud_region, "Creating cluster"));
        let created = self
            .client
            .add(&payload)
            .instrument(span.clone())
            .await
            .map_err(|e| ClusterError::remote("create", &plan.name, e))?;

        let wait = plan.wait_for_create_complete.is_true();
        let mut state = plan;
        populate(&created, &mut state, self.resolver.as_ref(), &span).await;
        self.persist(&state).await?;

        span.in_scope(|| {
            tracing::info!(
                id = state.id.value().map(String::as_str).unwrap_or_default(),
                "Cluster created"
            )
        });

        let mut diagnostics = Diagnostics::new();
        if wait && created.state.as_deref() != Some(READY_STATE) {
            let id = cluster_id(&state)?;
            span.in_scope(|| tracing::info!(id = %id, "Waiting for cluster to be ready"));

            let latest = match self.waiter.wait(self.client.as_ref(), &id, &span).await? {
                ReadinessOutcome::Ready(cluster) => Some(cluster),
                ReadinessOutcome::TimedOut(latest) => {
                    diagnostics.push(ClusterError::NotReady(id.clone()).to_diagnostic());
                    latest
                }
            };
            if let Some(snapshot) = latest {
                populate(&snapshot, &mut state, self.resolver.as_ref(), &span).await;
                self.persist(&state).await?;
            }
        }

        Ok(Applied {
            state: Some(state),
            diagnostics,
        })
    }

    /// Refreshes `state` from the API
    ///
    /// A cluster that no longer exists is an error, the record is left as is.
    pub async fn read(&self, state: ClusterState) -> Result<Applied> {
        let span = cluster_span(&state.name);
        let id = cluster_id(&state)?;

        let snapshot = self
            .client
            .get(&id)
            .instrument(span.clone())
            .await
            .map_err(|e| lookup_error(&id, e))?;

        let mut state = state;
        populate(&snapshot, &mut state, self.resolver.as_ref(), &span).await;
        self.persist(&state).await?;
        Ok(Applied::with_state(state))
    }

    /// Moves the cluster from `state` to `plan`
    ///
    /// Attributes fixed at creation and autoscaling bounds are checked before
    /// any call is made. Only replicas, autoscaling and properties are sent.
    pub async fn update(&self, state: ClusterState, plan: ClusterState) -> Result<Applied> {
        let span = cluster_span(&state.name);

        let checked = validate::immutable_attributes(&plan, &state)
            .and_then(|()| validate::autoscaling_bounds(&plan, UPDATE_HEADLINE));
        if let Err(e) = checked {
            span.in_scope(|| tracing::error!("{}: {}", e.headline(), e));
            return Err(e);
        }
        let id = cluster_id(&state)?;

        let patch = build_patch(&state, &plan);
        let snapshot = if patch.is_empty() {
            span.in_scope(|| tracing::debug!("Nothing to patch, refreshing"));
            self.client
                .get(&id)
                .instrument(span.clone())
                .await
                .map_err(|e| lookup_error(&id, e))?
        } else {
            span.in_scope(|| tracing::info!("Updating cluster"));
            self.client
                .update(&id, &patch)
                .instrument(span.clone())
                .await
                .map_err(|e| ClusterError::remote("update", &id, e))?
        };

        let mut refreshed = plan.clone();
        populate(&snapshot, &mut refreshed, self.resolver.as_ref(), &span).await;

        // explicit nulls and false in the plan must survive the refresh
        if plan.autoscaling_enabled.is_known() {
            refreshed.autoscaling_enabled = plan.autoscaling_enabled;
        }
        if plan.replicas.is_known() {
            refreshed.replicas = plan.replicas;
        }

        self.persist(&refreshed).await?;
        Ok(Applied::with_state(refreshed))
    }

    /// Deletes the cluster and, unless disabled, waits for it to disappear
    ///
    /// The record is removed once the delete is accepted, even when the wait
    /// times out.
    pub async fn delete(&self, state: ClusterState) -> Result<Applied> {
        let span = cluster_span(&state.name);
        let id = cluster_id(&state)?;

        span.in_scope(|| tracing::info!(id = %id, "Deleting cluster"));
        self.client
            .delete(&id)
            .instrument(span.clone())
            .await
            .map_err(|e| ClusterError::remote("delete", &id, e))?;

        let mut diagnostics = Diagnostics::new();
        if state.disable_waiting_in_destroy.is_true() {
            span.in_scope(|| tracing::info!("Waiting for destroy to be completed, is disabled"));
        } else {
            let deadline = destroy_timeout(&state.destroy_timeout, &id, &mut diagnostics);
            let outcome = self
                .poller
                .wait(self.client.as_ref(), &id, deadline, &span)
                .await?;
            if outcome == DeletionOutcome::TimedOut {
                diagnostics.push(ClusterError::Timeout(id.clone()).to_diagnostic());
            }
        }

        self.store.remove(&state_key(&state.name)).await?;
        Ok(Applied {
            state: None,
            diagnostics,
        })
    }

    /// Adopts an existing cluster by identifier
    ///
    /// A snapshot without a name is recorded under its identifier.
    pub async fn import(&self, id: &str) -> Result<Applied> {
        let span = cluster_span(id);

        let snapshot = self
            .client
            .get(id)
            .instrument(span.clone())
            .await
            .map_err(|e| lookup_error(id, e))?;

        let mut state = ClusterState::default();
        populate(&snapshot, &mut state, self.resolver.as_ref(), &span).await;
        if state.name.is_empty() {
            span.in_scope(|| tracing::warn!("Cluster has no name, keying it by identifier"));
            state.name = id.to_string();
        }
        self.persist(&state).await?;

        span.in_scope(|| tracing::info!(name = %state.name, "Cluster imported"));
        Ok(Applied::with_state(state))
    }

    /// The stored record for the cluster called `name`
    pub async fn stored(&self, name: &str) -> Result<Option<ClusterState>> {
        let record = self.store.get(&state_key(name)).await?;
        Ok(record.and_then(|r| r.get_attribute(STATE_ATTRIBUTE)))
    }

    async fn persist(&self, state: &ClusterState) -> Result<()> {
        let id = state.id.value().cloned().unwrap_or_default();
        let status = state
            .state
            .value()
            .map(|s| ResourceStatus::from_cluster_state(s))
            .unwrap_or(ResourceStatus::Unknown);
        let document = serde_json::to_value(state).map_err(CloudError::from)?;

        let record = ResourceState::new(id, RESOURCE_TYPE)
            .with_status(status)
            .with_attribute(STATE_ATTRIBUTE, document);
        self.store.put(&state_key(&state.name), record).await?;
        Ok(())
    }
}

fn cluster_id(state: &ClusterState) -> Result<String> {
    state
        .id
        .non_empty()
        .map(str::to_string)
        .ok_or_else(|| ClusterError::Validation {
            headline: "Can't find cluster",
            detail: format!("Cluster '{}' has no identifier", state.name),
        })
}

fn lookup_error(id: &str, err: ApiError) -> ClusterError {
    if err.is_not_found() {
        ClusterError::NotFound(id.to_string())
    } else {
        ClusterError::remote("read", id, err)
    }
}

/// Patch carrying only the mutable attributes that changed
fn build_patch(state: &ClusterState, plan: &ClusterState) -> Cluster {
    let mut nodes = ClusterNodes::default();

    if let Some(&replicas) = plan.replicas.value() {
        if state.replicas.value() != Some(&replicas) {
            nodes.compute = Some(replicas);
        }
    }

    if plan.autoscaling_enabled.is_true() {
        let bounds_changed = (plan.min_replicas.is_known()
            && plan.min_replicas != state.min_replicas)
            || (plan.max_replicas.is_known() && plan.max_replicas != state.max_replicas);
        let autoscale = MachinePoolAutoscaling {
            min_replicas: plan.min_replicas.value().copied(),
            max_replicas: plan.max_replicas.value().copied(),
        };
        if (!state.autoscaling_enabled.is_true() || bounds_changed) && !autoscale.is_empty() {
            nodes.autoscale_compute = Some(autoscale);
        }
    }

    let mut patch = Cluster::default();
    if !nodes.is_empty() {
        patch.nodes = Some(nodes);
    }
    if plan.properties.is_value() && plan.properties != state.properties {
        patch.properties = plan.properties.value().cloned();
    }
    patch
}
