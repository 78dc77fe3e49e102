//! Cross-field invariants checked before any mutating call

use crate::error::{ClusterError, Result};
use crate::model::{ClusterState, Sts};
use clusterflow_cloud::{Blank, Field};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Multi-region key ARN or bare key UUID
pub const KMS_KEY_ARN_PATTERN: &str = r"^arn:aws[\w-]*:kms:[\w-]+:\d{12}:key/mrk-[0-9a-f]{32}$|[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$";

static KMS_KEY_ARN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(KMS_KEY_ARN_PATTERN).expect("valid KMS key ARN pattern"));

/// Builds the wire tag map, rejecting duplicate keys
pub fn unique_tags(tags: &[(String, String)]) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for (key, value) in tags {
        if map.insert(key.clone(), value.clone()).is_some() {
            return Err(ClusterError::build(format!(
                "Invalid tags, user tag keys must be unique, duplicate key '{key}' found"
            )));
        }
    }
    Ok(map)
}

pub fn kms_key_arn(arn: &str) -> Result<()> {
    if KMS_KEY_ARN_RE.is_match(arn) {
        Ok(())
    } else {
        Err(ClusterError::build(format!(
            "Expected a valid value for kms-key-arn matching {KMS_KEY_ARN_PATTERN}"
        )))
    }
}

/// Required role ARNs must all be set
pub fn sts_roles(sts: &Sts) -> Result<()> {
    let required = [
        ("role_arn", &sts.role_arn),
        ("support_role_arn", &sts.support_role_arn),
        ("master_role_arn", &sts.instance_iam_roles.master_role_arn),
        ("worker_role_arn", &sts.instance_iam_roles.worker_role_arn),
    ];
    for (name, value) in required {
        if value.is_empty() {
            return Err(ClusterError::build(format!(
                "STS attribute '{name}' cannot be empty"
            )));
        }
    }
    Ok(())
}

/// Bring-your-own issuer attributes come as a pair
///
/// Returns the endpoint and secret ARN when the pair is set.
pub fn byo_oidc(sts: &Sts) -> Result<Option<(&str, &str)>> {
    if !sts.is_byo_oidc() {
        return Ok(None);
    }
    let endpoint = sts.oidc_endpoint_url.non_empty().ok_or_else(|| {
        ClusterError::build("When using BYO OIDC Endpoint URL cannot be empty")
    })?;
    let secret = sts.oidc_private_key_secret_arn.non_empty().ok_or_else(|| {
        ClusterError::build("When using BYO OIDC Secret ARN cannot be empty")
    })?;
    Ok(Some((endpoint, secret)))
}

/// Bounds are only accepted together with autoscaling
pub fn autoscaling_bounds(state: &ClusterState, headline: &'static str) -> Result<()> {
    if state.autoscaling_enabled.is_true() {
        return Ok(());
    }
    if state.min_replicas.is_value() || state.max_replicas.is_value() {
        return Err(ClusterError::Validation {
            headline,
            detail: "Can't update MaxReplica and/or MinReplica of cluster when autoscaling is not enabled"
                .to_string(),
        });
    }
    Ok(())
}

/// Whether the plan changes an attribute relative to the stored record
///
/// An unknown plan value is never a change. A planned blank value over an
/// absent stored value is not a change either. A planned null only counts
/// when the attribute is not filled in by the server.
pub fn altered<T: PartialEq + Blank>(plan: &Field<T>, state: &Field<T>, computed: bool) -> bool {
    match (plan, state) {
        (Field::Unknown, _) => false,
        (Field::Value(p), Field::Value(s)) => p != s,
        (Field::Value(p), _) => !p.is_blank(),
        (Field::Null, Field::Value(s)) => !computed && !s.is_blank(),
        (Field::Null, _) => false,
    }
}

/// Rejects plans that change attributes fixed at creation
pub fn immutable_attributes(plan: &ClusterState, state: &ClusterState) -> Result<()> {
    let mut changed: Vec<&'static str> = Vec::new();
    let mut check = |name: &'static str, is_altered: bool| {
        if is_altered {
            changed.push(name);
        }
    };

    check("external_id", altered(&plan.external_id, &state.external_id, true));
    check("name", plan.name != state.name);
    check("cloud_region", plan.cloud_region != state.cloud_region);
    check("multi_az", altered(&plan.multi_az, &state.multi_az, true));
    check(
        "availability_zones",
        altered(&plan.availability_zones, &state.availability_zones, true),
    );
    check(
        "compute_machine_type",
        altered(&plan.compute_machine_type, &state.compute_machine_type, true),
    );
    check("machine_cidr", altered(&plan.machine_cidr, &state.machine_cidr, true));
    check("service_cidr", altered(&plan.service_cidr, &state.service_cidr, true));
    check("pod_cidr", altered(&plan.pod_cidr, &state.pod_cidr, true));
    check("host_prefix", altered(&plan.host_prefix, &state.host_prefix, true));
    check("version", altered(&plan.version, &state.version, true));
    check("fips", altered(&plan.fips, &state.fips, false));
    check(
        "etcd_encryption",
        altered(&plan.etcd_encryption, &state.etcd_encryption, false),
    );
    check(
        "disable_workload_monitoring",
        altered(
            &plan.disable_workload_monitoring,
            &state.disable_workload_monitoring,
            false,
        ),
    );
    check(
        "disable_scp_checks",
        altered(&plan.disable_scp_checks, &state.disable_scp_checks, false),
    );
    check("kms_key_arn", altered(&plan.kms_key_arn, &state.kms_key_arn, false));
    check(
        "aws_account_id",
        altered(&plan.aws_account_id, &state.aws_account_id, false),
    );
    check(
        "aws_subnet_ids",
        altered(&plan.aws_subnet_ids, &state.aws_subnet_ids, false),
    );
    check(
        "aws_private_link",
        altered(&plan.aws_private_link, &state.aws_private_link, false),
    );
    check(
        "tags",
        altered(&plan.tag_map(), &state.tag_map(), false),
    );
    check("proxy", proxy_altered(plan, state));
    check("sts", sts_altered(plan, state));

    if changed.is_empty() {
        return Ok(());
    }
    Err(ClusterError::update(format!(
        "Attribute(s) {} can't be changed after the cluster is created",
        changed.join(", ")
    )))
}

fn proxy_altered(plan: &ClusterState, state: &ClusterState) -> bool {
    match (&plan.proxy, &state.proxy) {
        (Field::Unknown, _) => false,
        (Field::Value(p), Field::Value(s)) => {
            altered(&p.http_proxy, &s.http_proxy, false)
                || altered(&p.https_proxy, &s.https_proxy, false)
                || altered(&p.no_proxy, &s.no_proxy, false)
                || altered(&p.additional_trust_bundle, &s.additional_trust_bundle, false)
        }
        (Field::Value(p), _) => {
            [&p.http_proxy, &p.https_proxy, &p.no_proxy, &p.additional_trust_bundle]
                .into_iter()
                .any(|f| f.non_empty().is_some())
        }
        (Field::Null, Field::Value(_)) => true,
        (Field::Null, _) => false,
    }
}

fn sts_altered(plan: &ClusterState, state: &ClusterState) -> bool {
    match (&plan.sts, &state.sts) {
        (Field::Unknown, _) => false,
        (Field::Value(p), Field::Value(s)) => {
            p.role_arn != s.role_arn
                || p.support_role_arn != s.support_role_arn
                || p.instance_iam_roles != s.instance_iam_roles
                || altered(&p.operator_role_prefix, &s.operator_role_prefix, true)
                || altered(&p.oidc_endpoint_url, &s.oidc_endpoint_url, true)
                || altered(
                    &p.oidc_private_key_secret_arn,
                    &s.oidc_private_key_secret_arn,
                    true,
                )
        }
        (Field::Value(_), _) | (Field::Null, Field::Value(_)) => true,
        (Field::Null, _) => false,
    }
}
