use async_trait::async_trait;
use clusterflow_cloud::{Field, MemoryStateStore};
use clusterflow_cloud_rosa::api::{ClusterConsole, Cluster};
use clusterflow_cloud_rosa::{
    ApiError, ClusterResource, ClusterState, ClustersClient, Result, ThumbprintResolver,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory clusters API that records every call
#[derive(Default)]
pub struct FakeClusters {
    clusters: Mutex<HashMap<String, Cluster>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicU32,
    polls_until_gone: AtomicU32,
    failing_polls: AtomicBool,
    gets_until_ready: Mutex<Option<u32>>,
}

impl FakeClusters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(':').next() == Some(verb))
            .count()
    }

    #[allow(dead_code)]
    pub fn seed(&self, cluster: Cluster) {
        let id = cluster.id.clone().unwrap();
        self.clusters.lock().unwrap().insert(id, cluster);
    }

    #[allow(dead_code)]
    pub fn forget(&self, id: &str) {
        self.clusters.lock().unwrap().remove(id);
    }

    #[allow(dead_code)]
    pub fn cluster(&self, id: &str) -> Option<Cluster> {
        self.clusters.lock().unwrap().get(id).cloned()
    }

    /// Number of polls that still see the cluster after a delete
    #[allow(dead_code)]
    pub fn gone_after(&self, polls: u32) {
        self.polls_until_gone.store(polls, Ordering::SeqCst);
    }

    /// Number of gets that still see the cluster installing
    #[allow(dead_code)]
    pub fn ready_after(&self, gets: u32) {
        *self.gets_until_ready.lock().unwrap() = Some(gets);
    }

    #[allow(dead_code)]
    pub fn fail_polls(&self) {
        self.failing_polls.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn missing(id: &str) -> ApiError {
        ApiError::not_found(format!("Cluster '{id}' not found"))
    }
}

#[async_trait]
impl ClustersClient for FakeClusters {
    async fn add(&self, cluster: &Cluster) -> std::result::Result<Cluster, ApiError> {
        self.record("add".to_string());
        let id = format!("c-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);

        let mut created = cluster.clone();
        created.id = Some(id.clone());
        created.state = Some("installing".to_string());
        created.console = Some(ClusterConsole {
            url: Some(format!("https://console.example.com/{id}")),
        });
        self.clusters.lock().unwrap().insert(id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: &str) -> std::result::Result<Cluster, ApiError> {
        self.record(format!("get:{id}"));
        if let Some(remaining) = self.gets_until_ready.lock().unwrap().as_mut() {
            if *remaining == 0 {
                if let Some(cluster) = self.clusters.lock().unwrap().get_mut(id) {
                    cluster.state = Some("ready".to_string());
                }
            } else {
                *remaining -= 1;
            }
        }
        self.cluster(id).ok_or_else(|| Self::missing(id))
    }

    async fn update(&self, id: &str, patch: &Cluster) -> std::result::Result<Cluster, ApiError> {
        self.record(format!("update:{id}"));
        let mut clusters = self.clusters.lock().unwrap();
        let cluster = clusters.get_mut(id).ok_or_else(|| Self::missing(id))?;

        if let Some(changes) = &patch.nodes {
            let nodes = cluster.nodes.get_or_insert_with(Default::default);
            if let Some(replicas) = changes.compute {
                nodes.compute = Some(replicas);
                nodes.autoscale_compute = None;
            }
            if let Some(autoscale) = &changes.autoscale_compute {
                nodes.autoscale_compute = Some(autoscale.clone());
                nodes.compute = None;
            }
        }
        if let Some(properties) = &patch.properties {
            cluster.properties = Some(properties.clone());
        }
        Ok(cluster.clone())
    }

    async fn delete(&self, id: &str) -> std::result::Result<(), ApiError> {
        self.record(format!("delete:{id}"));
        let mut clusters = self.clusters.lock().unwrap();
        let cluster = clusters.get_mut(id).ok_or_else(|| Self::missing(id))?;
        cluster.state = Some("uninstalling".to_string());
        Ok(())
    }

    async fn poll(&self, id: &str) -> std::result::Result<Cluster, ApiError> {
        self.record(format!("poll:{id}"));
        if self.failing_polls.load(Ordering::SeqCst) {
            return Err(ApiError::new(503, "service unavailable"));
        }

        let remaining = self.polls_until_gone.load(Ordering::SeqCst);
        if remaining == 0 {
            self.forget(id);
            return Err(Self::missing(id));
        }
        self.polls_until_gone.store(remaining - 1, Ordering::SeqCst);
        self.cluster(id).ok_or_else(|| Self::missing(id))
    }
}

pub struct StaticResolver;

#[async_trait]
impl ThumbprintResolver for StaticResolver {
    async fn resolve(&self, _issuer_url: &str) -> Result<String> {
        Ok("a9d53002e97e00e043244f3d170d6f4c414104fd".to_string())
    }
}

pub struct Harness {
    pub client: Arc<FakeClusters>,
    pub store: Arc<MemoryStateStore>,
    pub resource: ClusterResource,
}

impl Harness {
    pub fn new() -> Self {
        let client = Arc::new(FakeClusters::new());
        let store = Arc::new(MemoryStateStore::new());
        let resource = ClusterResource::new(client.clone(), store.clone())
            .with_resolver(Arc::new(StaticResolver));
        Self {
            client,
            store,
            resource,
        }
    }
}

/// A plan with every optional attribute left to the server
pub fn plan(name: &str) -> ClusterState {
    let mut plan = ClusterState::new(name, "us-east-1");
    plan.replicas = Field::Value(3);
    plan.compute_machine_type = Field::Value("m5.xlarge".to_string());
    plan.tags = Field::Value(vec![
        ("team".to_string(), "sre".to_string()),
        ("env".to_string(), "dev".to_string()),
    ]);
    plan
}
