//! Clusterflow Cloud plumbing
//!
//! Provider-agnostic building blocks shared by the cluster reconcilers:
//!
//! - [`Field`]: tri-state attribute values (unknown / null / value)
//! - [`Diagnostics`]: ordered errors and warnings reported to the caller
//! - [`RetryConfig`]: exponential backoff for long-running waits
//! - [`StateStore`]: persistence for resource records
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           declarative front-end / caller         │
//! └─────────────────┬───────────────────────────────┘
//!                   │ plan / state records
//! ┌─────────────────▼───────────────────────────────┐
//! │            clusterflow-cloud-rosa                │
//! │   mapper · version gate · deletion poller        │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────────────────────┐
//! │ clusters API  │ │ clusterflow-cloud (this crate) │
//! │  (HTTP/JSON)  │ │  fields · state · retry        │
//! └───────────────┘ └───────────────────────────────┘
//! ```

pub mod diagnostics;
pub mod error;
pub mod field;
pub mod retry;
pub mod state;

// Re-exports
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{CloudError, Result};
pub use field::{Blank, Field};
pub use retry::RetryConfig;
pub use state::{MemoryStateStore, ResourceState, ResourceStatus, StateFile, StateManager, StateStore};
