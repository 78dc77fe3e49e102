//! Cluster desired state and persisted record
//!
//! The same structure is used for the plan handed in by the caller and for
//! the record kept in the state store. Every optional attribute is a
//! [`Field`], so "not determined yet" and "explicitly absent" survive each
//! translation.

use clusterflow_cloud::Field;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A ROSA classic cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    /// Server-assigned identifier
    pub id: Field<String>,
    pub external_id: Field<String>,
    pub name: String,
    pub cloud_region: String,
    /// Lifecycle state reported by the API (`installing`, `ready`, ...)
    pub state: Field<String>,
    pub api_url: Field<String>,
    pub console_url: Field<String>,

    pub multi_az: Field<bool>,
    pub availability_zones: Field<Vec<String>>,

    pub replicas: Field<i64>,
    pub autoscaling_enabled: Field<bool>,
    pub min_replicas: Field<i64>,
    pub max_replicas: Field<i64>,
    pub compute_machine_type: Field<String>,
    pub compute_labels: Field<BTreeMap<String, String>>,

    pub machine_cidr: Field<String>,
    pub service_cidr: Field<String>,
    pub pod_cidr: Field<String>,
    pub host_prefix: Field<i64>,

    pub version: Field<String>,

    pub fips: Field<bool>,
    pub etcd_encryption: Field<bool>,
    pub disable_workload_monitoring: Field<bool>,
    pub disable_scp_checks: Field<bool>,
    pub kms_key_arn: Field<String>,
    pub ccs_enabled: Field<bool>,

    pub aws_account_id: Field<String>,
    pub aws_subnet_ids: Field<Vec<String>>,
    pub aws_private_link: Field<bool>,

    pub sts: Field<Sts>,
    pub proxy: Field<Proxy>,

    /// User tags in declaration order; keys must be unique
    pub tags: Field<Vec<(String, String)>>,
    pub properties: Field<BTreeMap<String, String>>,

    /// Hold create until the API reports the cluster as ready
    #[serde(default)]
    pub wait_for_create_complete: Field<bool>,
    /// Return right after the delete call is accepted
    pub disable_waiting_in_destroy: Field<bool>,
    /// Minutes to wait for the cluster to disappear
    pub destroy_timeout: Field<i64>,
}

/// AWS security token service roles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sts {
    pub role_arn: String,
    pub support_role_arn: String,
    pub instance_iam_roles: InstanceIamRoles,
    pub operator_role_prefix: Field<String>,
    /// Bring-your-own issuer, stored without the `https://` scheme
    pub oidc_endpoint_url: Field<String>,
    pub oidc_private_key_secret_arn: Field<String>,
    /// SHA-1 of the issuer's trust anchor, derived on refresh
    pub thumbprint: Field<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceIamRoles {
    pub master_role_arn: String,
    pub worker_role_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub http_proxy: Field<String>,
    pub https_proxy: Field<String>,
    pub no_proxy: Field<String>,
    pub additional_trust_bundle: Field<String>,
}

impl ClusterState {
    pub fn new(name: impl Into<String>, cloud_region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cloud_region: cloud_region.into(),
            ..Self::default()
        }
    }

    /// Tags keyed by name, keeping the tri-state; later duplicates win
    pub fn tag_map(&self) -> Field<BTreeMap<String, String>> {
        self.tags
            .as_ref()
            .map(|tags| tags.iter().cloned().collect())
    }
}

impl Sts {
    pub fn new(
        role_arn: impl Into<String>,
        support_role_arn: impl Into<String>,
        master_role_arn: impl Into<String>,
        worker_role_arn: impl Into<String>,
    ) -> Self {
        Self {
            role_arn: role_arn.into(),
            support_role_arn: support_role_arn.into(),
            instance_iam_roles: InstanceIamRoles {
                master_role_arn: master_role_arn.into(),
                worker_role_arn: worker_role_arn.into(),
            },
            ..Self::default()
        }
    }

    /// Whether any bring-your-own issuer attribute is set
    pub fn is_byo_oidc(&self) -> bool {
        self.oidc_endpoint_url.non_empty().is_some()
            || self.oidc_private_key_secret_arn.non_empty().is_some()
    }
}
