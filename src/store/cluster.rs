//! # Kubernetes Store
//!
//! [`ObjectStore`] backed by a Kubernetes API server through `Api<DynamicObject>`.

use super::{ObjectStore, StoreError};
use crate::resource::{ObjectKey, Unstructured};
use async_trait::async_trait;
use kube::{
    api::{Api, DeleteParams, PostParams},
    core::DynamicObject,
    discovery::{self, Scope},
    Client,
};
use tracing::debug;

#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
}

impl std::fmt::Debug for KubeObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeObjectStore").finish_non_exhaustive()
    }
}

impl KubeObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the environment (kubeconfig or in-cluster config)
    pub async fn try_default() -> Result<Self, StoreError> {
        // rustls 0.23+ needs a process-wide crypto provider; a second install is a no-op error
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("rustls crypto provider already installed");
        }

        let client = Client::try_default()
            .await
            .map_err(|e| StoreError::Other(anyhow::Error::new(e)))?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Resolve plural and scope for the key's kind, then build a typed-less API handle
    async fn api(&self, key: &ObjectKey) -> Result<Api<DynamicObject>, StoreError> {
        let (resource, capabilities) = discovery::pinned_kind(&self.client, &key.gvk)
            .await
            .map_err(map_kube_error)?;

        let api = match (capabilities.scope, key.namespace.as_deref()) {
            (Scope::Cluster, _) => Api::all_with(self.client.clone(), &resource),
            (Scope::Namespaced, Some(namespace)) => {
                Api::namespaced_with(self.client.clone(), namespace, &resource)
            }
            (Scope::Namespaced, None) => {
                Api::default_namespaced_with(self.client.clone(), &resource)
            }
        };
        Ok(api)
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get(&self, key: &ObjectKey) -> Result<Unstructured, StoreError> {
        let api = self.api(key).await?;
        let object = api.get(&key.name).await.map_err(map_kube_error)?;
        from_dynamic(&object)
    }

    async fn create(&self, object: &Unstructured) -> Result<Unstructured, StoreError> {
        let key = object.validate().map_err(StoreError::Invalid)?;
        let api = self.api(&key).await?;
        let created = api
            .create(&PostParams::default(), &to_dynamic(object)?)
            .await
            .map_err(map_kube_error)?;
        from_dynamic(&created)
    }

    async fn update(&self, object: &Unstructured) -> Result<Unstructured, StoreError> {
        let key = object.validate().map_err(StoreError::Invalid)?;
        let api = self.api(&key).await?;
        let updated = api
            .replace(&key.name, &PostParams::default(), &to_dynamic(object)?)
            .await
            .map_err(map_kube_error)?;
        from_dynamic(&updated)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let api = self.api(key).await?;
        api.delete(&key.name, &DeleteParams::default())
            .await
            .map_err(map_kube_error)?;
        Ok(())
    }
}

fn to_dynamic(object: &Unstructured) -> Result<DynamicObject, StoreError> {
    serde_json::from_value(object.clone().into_value())
        .map_err(|e| StoreError::Invalid(format!("not a Kubernetes object: {e}")))
}

fn from_dynamic(object: &DynamicObject) -> Result<Unstructured, StoreError> {
    let value = serde_json::to_value(object).map_err(|e| StoreError::Other(e.into()))?;
    Unstructured::from_value(value).map_err(StoreError::Invalid)
}

/// Translate API status codes into the store error contract
fn map_kube_error(error: kube::Error) -> StoreError {
    match error {
        kube::Error::Api(response) => match response.code {
            404 => StoreError::NotFound,
            409 if response.reason == "AlreadyExists" => StoreError::AlreadyExists,
            409 => StoreError::Conflict(response.message),
            422 => StoreError::Invalid(response.message),
            _ => StoreError::Other(anyhow::Error::new(kube::Error::Api(response))),
        },
        other => StoreError::Other(anyhow::Error::new(other)),
    }
}
