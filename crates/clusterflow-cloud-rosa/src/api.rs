//! Clusters management API wire types
//!
//! JSON documents exchanged with `/api/clusters_mgmt/v1/clusters`. Every
//! attribute is optional: presence is decided once, at deserialization, and
//! absent attributes are never serialized. Nested objects report
//! `is_empty()` so the payload builder can leave out groups with nothing set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<ObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<ObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_az: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ClusterApi>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<ClusterConsole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<ClusterNodes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccs: Option<Ccs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etcd_encryption: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fips: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_user_workload_monitoring: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<Aws>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Proxy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_trust_bundle: Option<String>,
}

/// Reference to another API object by identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ObjectReference {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Listening {
    External,
    Internal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterApi {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listening: Option<Listening>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConsole {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNodes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_machine_type: Option<ObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscale_compute: Option<MachinePoolAutoscaling>,
}

impl ClusterNodes {
    pub fn is_empty(&self) -> bool {
        self.compute.is_none()
            && self.compute_machine_type.is_none()
            && self.compute_labels.is_none()
            && self.availability_zones.is_none()
            && self.autoscale_compute.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachinePoolAutoscaling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i64>,
}

impl MachinePoolAutoscaling {
    pub fn is_empty(&self) -> bool {
        self.min_replicas.is_none() && self.max_replicas.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ccs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_scp_checks: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aws {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_link: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sts: Option<Sts>,
}

impl Aws {
    pub fn is_empty(&self) -> bool {
        self.account_id.is_none()
            && self.subnet_ids.is_none()
            && self.private_link.is_none()
            && self.kms_key_arn.is_none()
            && self.tags.is_none()
            && self.sts.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_iam_roles: Option<InstanceIamRoles>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_role_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_endpoint_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_private_key_secret_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceIamRoles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_role_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_prefix: Option<i64>,
}

impl Network {
    pub fn is_empty(&self) -> bool {
        self.machine_cidr.is_none()
            && self.service_cidr.is_none()
            && self.pod_cidr.is_none()
            && self.host_prefix.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
}

impl Proxy {
    pub fn is_empty(&self) -> bool {
        self.http_proxy.is_none() && self.https_proxy.is_none() && self.no_proxy.is_none()
    }
}

/// Presence accessors over nested optional objects
impl Cluster {
    pub fn region_id(&self) -> Option<&str> {
        self.region.as_ref()?.id.as_deref()
    }

    pub fn version_id(&self) -> Option<&str> {
        self.version.as_ref()?.id.as_deref()
    }

    pub fn api_url(&self) -> Option<&str> {
        self.api.as_ref()?.url.as_deref()
    }

    pub fn console_url(&self) -> Option<&str> {
        self.console.as_ref()?.url.as_deref()
    }

    pub fn compute_machine_type_id(&self) -> Option<&str> {
        self.nodes.as_ref()?.compute_machine_type.as_ref()?.id.as_deref()
    }

    pub fn autoscale_compute(&self) -> Option<&MachinePoolAutoscaling> {
        self.nodes.as_ref()?.autoscale_compute.as_ref()
    }

    pub fn sts(&self) -> Option<&Sts> {
        self.aws.as_ref()?.sts.as_ref()
    }

    /// True when the document carries no attribute at all
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_snapshot() {
        let json = r#"{
            "kind": "Cluster",
            "id": "1n2j3k4l5m",
            "href": "/api/clusters_mgmt/v1/clusters/1n2j3k4l5m",
            "name": "prod",
            "state": "ready",
            "region": {"kind": "CloudRegionLink", "id": "us-east-1"},
            "api": {"url": "https://api.prod.example.com:6443", "listening": "internal"},
            "nodes": {"compute": 3, "compute_machine_type": {"id": "m5.xlarge"}},
            "aws": {"sts": {"role_arn": "arn:aws:iam::123456789012:role/installer"}}
        }"#;

        let cluster: Cluster = serde_json::from_str(json).unwrap();
        assert_eq!(cluster.region_id(), Some("us-east-1"));
        assert_eq!(cluster.api.as_ref().unwrap().listening, Some(Listening::Internal));
        assert_eq!(cluster.compute_machine_type_id(), Some("m5.xlarge"));
        assert!(cluster.autoscale_compute().is_none());
        assert!(cluster.sts().is_some());
        assert!(cluster.network.is_none());
    }

    #[test]
    fn test_absent_fields_are_not_serialized() {
        let cluster = Cluster {
            name: Some("dev".to_string()),
            nodes: Some(ClusterNodes {
                compute: Some(2),
                ..ClusterNodes::default()
            }),
            ..Cluster::default()
        };

        let json = serde_json::to_value(&cluster).unwrap();
        assert_eq!(json, serde_json::json!({"name": "dev", "nodes": {"compute": 2}}));
    }

    #[test]
    fn test_empty_groups() {
        assert!(Network::default().is_empty());
        assert!(Aws::default().is_empty());
        assert!(ClusterNodes::default().is_empty());
        assert!(MachinePoolAutoscaling::default().is_empty());
        assert!(Cluster::default().is_empty());
        assert!(
            !Proxy {
                no_proxy: Some("localhost".into()),
                ..Proxy::default()
            }
            .is_empty()
        );
    }
}
