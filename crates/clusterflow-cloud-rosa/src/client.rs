//! Clusters management API client
//!
//! [`ClustersClient`] is the narrow contract the reconciler needs from the
//! transport: one collection, four verbs and a status poll. Every call is
//! cancelled by dropping its future.

use crate::api::Cluster;
use crate::error::ApiError;
use async_trait::async_trait;
use clusterflow_config::ProviderConfig;
use serde::de::DeserializeOwned;

const CLUSTERS_PATH: &str = "/api/clusters_mgmt/v1/clusters";

#[async_trait]
pub trait ClustersClient: Send + Sync {
    /// POST a new cluster
    async fn add(&self, cluster: &Cluster) -> Result<Cluster, ApiError>;

    async fn get(&self, id: &str) -> Result<Cluster, ApiError>;

    /// PATCH an existing cluster with the attributes set in `patch`
    async fn update(&self, id: &str, patch: &Cluster) -> Result<Cluster, ApiError>;

    async fn delete(&self, id: &str) -> Result<(), ApiError>;

    /// Single status check used while waiting for deletion
    async fn poll(&self, id: &str) -> Result<Cluster, ApiError> {
        self.get(id).await
    }
}

/// HTTP implementation backed by `reqwest`
pub struct HttpClustersClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClustersClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.url.clone(), config.token.clone())
    }

    fn collection_url(&self) -> String {
        format!("{}{}", self.base_url, CLUSTERS_PATH)
    }

    fn cluster_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_body(status.as_u16(), &body);
        tracing::debug!("Clusters API returned {}: {}", status, err.reason);
        Err(err)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ClustersClient for HttpClustersClient {
    async fn add(&self, cluster: &Cluster) -> Result<Cluster, ApiError> {
        tracing::debug!("POST {}", self.collection_url());
        let response = self
            .send(self.client.post(self.collection_url()).json(cluster))
            .await?;
        Self::decode(response).await
    }

    async fn get(&self, id: &str) -> Result<Cluster, ApiError> {
        let response = self.send(self.client.get(self.cluster_url(id))).await?;
        Self::decode(response).await
    }

    async fn update(&self, id: &str, patch: &Cluster) -> Result<Cluster, ApiError> {
        tracing::debug!("PATCH {}", self.cluster_url(id));
        let response = self
            .send(self.client.patch(self.cluster_url(id)).json(patch))
            .await?;
        Self::decode(response).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        tracing::debug!("DELETE {}", self.cluster_url(id));
        self.send(self.client.delete(self.cluster_url(id))).await?;
        Ok(())
    }
}
