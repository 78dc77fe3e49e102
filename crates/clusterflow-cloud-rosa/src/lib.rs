//! Clusterflow ROSA classic provider
//!
//! Reconciles Red Hat OpenShift Service on AWS (classic) clusters against
//! the clusters management API.
//!
//! # Components
//!
//! - [`mapper`]: desired state to API payload and back
//! - [`validate`]: cross-field invariants (tags, KMS key, STS, immutability)
//! - [`version`]: minimum OpenShift version gate
//! - [`thumbprint`]: OIDC issuer trust anchor hashing
//! - [`readiness`]: waiting for a new cluster to become ready
//! - [`deletion`]: waiting for an accepted delete to finish
//! - [`resource`]: create / read / update / delete / import
//!
//! # Example
//!
//! ```no_run
//! use clusterflow_cloud::MemoryStateStore;
//! use clusterflow_cloud_rosa::{ClusterResource, ClusterState, HttpClustersClient};
//! use clusterflow_config::ProviderConfig;
//! use std::sync::Arc;
//!
//! # async fn run() -> clusterflow_cloud_rosa::Result<()> {
//! let config = ProviderConfig::load().unwrap_or_default();
//! let resource = ClusterResource::new(
//!     Arc::new(HttpClustersClient::from_config(&config)),
//!     Arc::new(MemoryStateStore::new()),
//! );
//!
//! let applied = resource.create(ClusterState::new("dev", "us-east-1")).await?;
//! for warning in applied.diagnostics.warnings() {
//!     eprintln!("{warning}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod deletion;
pub mod error;
pub mod mapper;
pub mod model;
pub mod readiness;
pub mod resource;
pub mod thumbprint;
pub mod validate;
pub mod version;

pub use client::{ClustersClient, HttpClustersClient};
pub use deletion::{DeletionOutcome, DeletionPoller};
pub use error::{ApiError, ClusterError, Result};
pub use model::{ClusterState, InstanceIamRoles, Proxy, Sts};
pub use readiness::{ReadinessOutcome, ReadinessWaiter};
pub use resource::{Applied, ClusterResource};
pub use thumbprint::{ThumbprintResolver, TlsThumbprintResolver};
