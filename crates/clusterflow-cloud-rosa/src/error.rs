//! ROSA cluster error types

use clusterflow_cloud::{CloudError, Diagnostic};
use serde::Deserialize;
use thiserror::Error;

/// Headline used for every failure raised while building a cluster payload
pub const BUILD_HEADLINE: &str = "Can't build cluster";

/// Headline used for update rejections
pub const UPDATE_HEADLINE: &str = "Can't update cluster";

/// Error returned by the clusters management API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("status is {status}, code is '{}', reason: {reason}", .code.as_deref().unwrap_or("-"))]
pub struct ApiError {
    /// HTTP status code, `0` when the request never got a response
    pub status: u16,
    pub code: Option<String>,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    reason: Option<String>,
}

impl ApiError {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::new(404, reason)
    }

    /// Decodes an API error document, falling back to the raw body
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self {
                status,
                code: parsed.code,
                reason: parsed.reason.unwrap_or_else(|| body.to_string()),
            },
            Err(_) => Self::new(status, body.trim()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16()).unwrap_or(0);
        Self::new(status, err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ClusterError {
    /// An invariant on the requested configuration does not hold
    #[error("{detail}")]
    Validation {
        headline: &'static str,
        detail: String,
    },

    #[error("Can't {operation} cluster '{id}': {source}")]
    RemoteCall {
        operation: &'static str,
        id: String,
        source: ApiError,
    },

    #[error("Can't find cluster with identifier '{0}'")]
    NotFound(String),

    #[error("Can't check if cluster version is supported '{version}': {reason}")]
    VersionCheck { version: String, reason: String },

    #[error("Cluster version '{version}' is not supported, the minimum supported version is {minimum}")]
    UnsupportedVersion {
        version: String,
        minimum: &'static str,
    },

    #[error("Can't get thumbprint of '{url}': {reason}")]
    TrustResolution { url: String, reason: String },

    #[error(
        "The cluster with identifier '{0}' is not deleted yet, but the polling finished due to a timeout"
    )]
    Timeout(String),

    #[error(
        "The cluster with identifier '{0}' is not ready yet, but the polling finished due to a timeout"
    )]
    NotReady(String),

    #[error("Cloud error: {0}")]
    State(#[from] CloudError),
}

impl ClusterError {
    pub fn build(detail: impl Into<String>) -> Self {
        Self::Validation {
            headline: BUILD_HEADLINE,
            detail: detail.into(),
        }
    }

    pub fn update(detail: impl Into<String>) -> Self {
        Self::Validation {
            headline: UPDATE_HEADLINE,
            detail: detail.into(),
        }
    }

    pub fn remote(operation: &'static str, id: impl Into<String>, source: ApiError) -> Self {
        Self::RemoteCall {
            operation,
            id: id.into(),
            source,
        }
    }

    /// Short summary shown above the detailed message
    pub fn headline(&self) -> &'static str {
        match self {
            Self::Validation { headline, .. } => *headline,
            Self::RemoteCall { operation, .. } => match *operation {
                "create" => "Can't create cluster",
                "update" => "Can't update cluster",
                "delete" => "Can't delete cluster",
                "poll" => "Can't poll cluster state",
                _ => "Can't find cluster",
            },
            Self::NotFound(_) => "Can't find cluster",
            Self::VersionCheck { .. } | Self::UnsupportedVersion { .. } => BUILD_HEADLINE,
            Self::TrustResolution { .. } => "Can't get thumbprint",
            Self::Timeout(_) => "Cluster wasn't deleted yet",
            Self::NotReady(_) => "Cluster isn't ready yet",
            Self::State(_) => "Can't persist cluster state",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Conditions that are reported but never abort an operation
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::NotReady(_) | Self::TrustResolution { .. }
        )
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        if self.is_soft() {
            Diagnostic::warning(self.headline(), self.to_string())
        } else {
            Diagnostic::error(self.headline(), self.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;
