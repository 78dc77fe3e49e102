//! Translation between [`ClusterState`] and the API [`Cluster`] document
//!
//! [`build_cluster`] turns a desired state into a creation payload and is
//! the place where cross-field invariants are enforced. [`populate`] goes
//! the other way: it never fails, and every attribute missing from the
//! snapshot becomes an explicit null in the record.

use crate::api::{
    self, Aws, Ccs, Cluster, ClusterApi, ClusterNodes, InstanceIamRoles, Listening,
    MachinePoolAutoscaling, Network, ObjectReference,
};
use crate::error::{BUILD_HEADLINE, Result};
use crate::model::{ClusterState, Proxy, Sts};
use crate::thumbprint::ThumbprintResolver;
use crate::{validate, version};
use clusterflow_cloud::Field;
use tracing::{Instrument, Span};

pub const AWS_CLOUD_PROVIDER: &str = "aws";
pub const ROSA_PRODUCT: &str = "rosa";

const HTTPS_SCHEME: &str = "https://";

/// Builds the creation payload for `state`
pub fn build_cluster(state: &ClusterState) -> Result<Cluster> {
    validate::autoscaling_bounds(state, BUILD_HEADLINE)?;

    let mut cluster = Cluster {
        name: Some(state.name.clone()),
        cloud_provider: Some(ObjectReference::new(AWS_CLOUD_PROVIDER)),
        product: Some(ObjectReference::new(ROSA_PRODUCT)),
        region: Some(ObjectReference::new(state.cloud_region.clone())),
        external_id: state.external_id.value().cloned(),
        multi_az: state.multi_az.value().copied(),
        properties: state.properties.value().cloned(),
        etcd_encryption: state.etcd_encryption.value().copied(),
        fips: state.fips.value().copied(),
        disable_user_workload_monitoring: state.disable_workload_monitoring.value().copied(),
        // CCS is always on for ROSA
        ccs: Some(Ccs {
            enabled: Some(true),
            disable_scp_checks: state.disable_scp_checks.value().copied(),
        }),
        ..Cluster::default()
    };

    let nodes = build_nodes(state);
    if !nodes.is_empty() {
        cluster.nodes = Some(nodes);
    }

    let aws = build_aws(state)?;
    if aws.private_link == Some(true) {
        cluster.api = Some(ClusterApi {
            url: None,
            listening: Some(Listening::Internal),
        });
    }
    if !aws.is_empty() {
        cluster.aws = Some(aws);
    }

    let network = Network {
        machine_cidr: state.machine_cidr.value().cloned(),
        service_cidr: state.service_cidr.value().cloned(),
        pod_cidr: state.pod_cidr.value().cloned(),
        host_prefix: state.host_prefix.value().copied(),
    };
    if !network.is_empty() {
        cluster.network = Some(network);
    }

    if let Some(version) = state.version.value() {
        version::check_supported(version)?;
        cluster.version = Some(ObjectReference::new(version.clone()));
    }

    if let Some(proxy) = state.proxy.value() {
        let wire = api::Proxy {
            http_proxy: proxy.http_proxy.value().cloned(),
            https_proxy: proxy.https_proxy.value().cloned(),
            no_proxy: proxy.no_proxy.value().cloned(),
        };
        if !wire.is_empty() {
            cluster.proxy = Some(wire);
        }
        cluster.additional_trust_bundle = proxy.additional_trust_bundle.value().cloned();
    }

    Ok(cluster)
}

fn build_nodes(state: &ClusterState) -> ClusterNodes {
    let autoscale_compute = state
        .autoscaling_enabled
        .is_true()
        .then(|| MachinePoolAutoscaling {
            min_replicas: state.min_replicas.value().copied(),
            max_replicas: state.max_replicas.value().copied(),
        })
        .filter(|autoscale| !autoscale.is_empty());

    ClusterNodes {
        compute: state.replicas.value().copied(),
        compute_machine_type: state
            .compute_machine_type
            .value()
            .map(|id| ObjectReference::new(id.clone())),
        compute_labels: state.compute_labels.value().cloned(),
        availability_zones: state.availability_zones.value().cloned(),
        autoscale_compute,
    }
}

fn build_aws(state: &ClusterState) -> Result<Aws> {
    let mut aws = Aws::default();

    if let Some(tags) = state.tags.value() {
        aws.tags = Some(validate::unique_tags(tags)?);
    }

    if let Some(arn) = state.kms_key_arn.non_empty() {
        validate::kms_key_arn(arn)?;
        aws.kms_key_arn = Some(arn.to_string());
    }

    aws.account_id = state.aws_account_id.value().cloned();
    aws.private_link = state.aws_private_link.value().copied();
    aws.subnet_ids = state.aws_subnet_ids.value().cloned();

    if let Some(sts) = state.sts.value() {
        aws.sts = Some(build_sts(sts)?);
    }

    Ok(aws)
}

fn build_sts(sts: &Sts) -> Result<api::Sts> {
    validate::sts_roles(sts)?;

    let mut wire = api::Sts {
        role_arn: Some(sts.role_arn.clone()),
        support_role_arn: Some(sts.support_role_arn.clone()),
        instance_iam_roles: Some(InstanceIamRoles {
            master_role_arn: Some(sts.instance_iam_roles.master_role_arn.clone()),
            worker_role_arn: Some(sts.instance_iam_roles.worker_role_arn.clone()),
        }),
        operator_role_prefix: sts.operator_role_prefix.value().cloned(),
        ..api::Sts::default()
    };

    if let Some((endpoint, secret_arn)) = validate::byo_oidc(sts)? {
        wire.oidc_endpoint_url = Some(with_https(endpoint));
        wire.oidc_private_key_secret_arn = Some(secret_arn.to_string());
    }

    Ok(wire)
}

/// Refreshes `state` from an API snapshot
///
/// Thumbprint resolution failures are logged and leave an empty thumbprint.
pub async fn populate(
    cluster: &Cluster,
    state: &mut ClusterState,
    resolver: &dyn ThumbprintResolver,
    span: &Span,
) {
    span.in_scope(|| {
        tracing::debug!(
            id = cluster.id.as_deref().unwrap_or_default(),
            state = cluster.state.as_deref().unwrap_or_default(),
            "Populating cluster state"
        )
    });

    state.id = Field::from_option(cluster.id.clone());
    state.external_id = Field::from_option(cluster.external_id.clone());
    if let Some(name) = &cluster.name {
        state.name = name.clone();
    }
    if let Some(region) = cluster.region_id() {
        state.cloud_region = region.to_string();
    }
    state.state = Field::from_option(cluster.state.clone());
    state.api_url = Field::from_option(cluster.api_url().map(str::to_string));
    state.console_url = Field::from_option(cluster.console_url().map(str::to_string));
    state.multi_az = Field::from_option(cluster.multi_az);
    state.properties = Field::from_option(cluster.properties.clone());

    populate_nodes(cluster, state);

    let ccs = cluster.ccs.as_ref();
    state.ccs_enabled = Field::from_option(ccs.and_then(|c| c.enabled));
    state.disable_scp_checks = Field::from_option(ccs.and_then(|c| c.disable_scp_checks));
    state.etcd_encryption = Field::from_option(cluster.etcd_encryption);
    state.fips = Field::from_option(cluster.fips);
    state.disable_workload_monitoring =
        Field::from_option(cluster.disable_user_workload_monitoring);

    let aws = cluster.aws.as_ref();
    state.aws_account_id = Field::from_option(aws.and_then(|a| a.account_id.clone()));
    state.aws_subnet_ids = Field::from_option(aws.and_then(|a| a.subnet_ids.clone()));
    state.aws_private_link = Field::from_option(aws.and_then(|a| a.private_link));
    state.kms_key_arn = Field::from_option(aws.and_then(|a| a.kms_key_arn.clone()));

    // keep the declared order when the remote tags are the same set
    let tags = match aws.and_then(|a| a.tags.as_ref()) {
        Some(remote) if state.tag_map().value() == Some(remote) => state.tags.clone(),
        Some(remote) => Field::Value(
            remote
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        None => Field::Null,
    };
    state.tags = tags;

    match cluster.sts() {
        Some(remote) => {
            let current = std::mem::take(&mut state.sts).into_value().unwrap_or_default();
            let sts = populate_sts(remote, current, resolver, span).await;
            state.sts = Field::Value(sts);
        }
        None => state.sts = Field::Null,
    }

    state.proxy = if cluster.proxy.is_none() && cluster.additional_trust_bundle.is_none() {
        Field::Null
    } else {
        let remote = cluster.proxy.clone().unwrap_or_default();
        Field::Value(Proxy {
            http_proxy: Field::from_option(remote.http_proxy),
            https_proxy: Field::from_option(remote.https_proxy),
            no_proxy: Field::from_option(remote.no_proxy),
            additional_trust_bundle: Field::from_option(cluster.additional_trust_bundle.clone()),
        })
    };

    let network = cluster.network.as_ref();
    state.machine_cidr = Field::from_option(network.and_then(|n| n.machine_cidr.clone()));
    state.service_cidr = Field::from_option(network.and_then(|n| n.service_cidr.clone()));
    state.pod_cidr = Field::from_option(network.and_then(|n| n.pod_cidr.clone()));
    state.host_prefix = Field::from_option(network.and_then(|n| n.host_prefix));
    state.version = Field::from_option(cluster.version_id().map(str::to_string));

    // not part of the API document
    state.wait_for_create_complete = std::mem::take(&mut state.wait_for_create_complete).or_null();
    state.disable_waiting_in_destroy = std::mem::take(&mut state.disable_waiting_in_destroy).or_null();
    state.destroy_timeout = std::mem::take(&mut state.destroy_timeout).or_null();
}

fn populate_nodes(cluster: &Cluster, state: &mut ClusterState) {
    let nodes = cluster.nodes.as_ref();
    state.compute_machine_type =
        Field::from_option(cluster.compute_machine_type_id().map(str::to_string));
    state.compute_labels = Field::from_option(nodes.and_then(|n| n.compute_labels.clone()));
    state.availability_zones =
        Field::from_option(nodes.and_then(|n| n.availability_zones.clone()));

    match cluster.autoscale_compute() {
        Some(autoscale) => {
            state.autoscaling_enabled = Field::Value(true);
            state.min_replicas = Field::from_option(autoscale.min_replicas);
            state.max_replicas = Field::from_option(autoscale.max_replicas);
            state.replicas = Field::Null;
        }
        None => {
            state.min_replicas = Field::Null;
            state.max_replicas = Field::Null;
            if !state.autoscaling_enabled.is_null() {
                state.autoscaling_enabled = Field::Value(false);
            }
            state.replicas = Field::from_option(nodes.and_then(|n| n.compute));
        }
    }
}

async fn populate_sts(
    remote: &api::Sts,
    mut sts: Sts,
    resolver: &dyn ThumbprintResolver,
    span: &Span,
) -> Sts {
    sts.role_arn = remote.role_arn.clone().unwrap_or_default();
    sts.support_role_arn = remote.support_role_arn.clone().unwrap_or_default();
    if let Some(roles) = &remote.instance_iam_roles {
        sts.instance_iam_roles.master_role_arn = roles.master_role_arn.clone().unwrap_or_default();
        sts.instance_iam_roles.worker_role_arn = roles.worker_role_arn.clone().unwrap_or_default();
    }

    // the API may fill in a generated prefix; a declared one wins
    if !sts.operator_role_prefix.is_value() {
        sts.operator_role_prefix = Field::from_option(remote.operator_role_prefix.clone());
    }

    let endpoint = remote.oidc_endpoint_url.as_deref();
    sts.oidc_endpoint_url = Field::from_option(endpoint.map(|url| strip_https(url).to_string()));

    // the secret ARN is write-only on some API versions
    sts.oidc_private_key_secret_arn = match &remote.oidc_private_key_secret_arn {
        Some(arn) => Field::Value(arn.clone()),
        None => sts.oidc_private_key_secret_arn.or_null(),
    };

    let thumbprint = match endpoint.filter(|url| !url.is_empty()) {
        Some(url) => {
            let issuer = with_https(strip_https(url));
            match resolver.resolve(&issuer).instrument(span.clone()).await {
                Ok(thumbprint) => thumbprint,
                Err(e) => {
                    span.in_scope(|| tracing::error!("cannot get thumbprint: {}", e));
                    String::new()
                }
            }
        }
        None => {
            span.in_scope(|| tracing::warn!("No OIDC endpoint URL, leaving thumbprint empty"));
            String::new()
        }
    };
    sts.thumbprint = Field::Value(thumbprint);

    sts
}

fn with_https(url: &str) -> String {
    if url.starts_with(HTTPS_SCHEME) {
        url.to_string()
    } else {
        format!("{HTTPS_SCHEME}{url}")
    }
}

fn strip_https(url: &str) -> &str {
    url.strip_prefix(HTTPS_SCHEME).unwrap_or(url)
}
