//! # Object Store
//!
//! The resource store the applier writes to.
//!
//! Implementations:
//! - `cluster`: [`KubeObjectStore`], a live Kubernetes API server via `kube`
//! - `memory`: [`MemoryObjectStore`], an in-process store for tests and dry runs

use crate::resource::{ObjectKey, Unstructured};
use async_trait::async_trait;
use thiserror::Error;

mod cluster;
mod memory;

pub use cluster::KubeObjectStore;
pub use memory::{MemoryObjectStore, StoreOperation, StoreVerb};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,
    #[error("object already exists")]
    AlreadyExists,
    /// The concurrency token did not match the stored object
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid object: {0}")]
    Invalid(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Store of generic objects keyed by group-version-kind and namespaced name
///
/// Objects returned by `get` carry the store's `resourceVersion`; `update`
/// requires it. Retries, timeouts and cancellation belong to implementations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<Unstructured, StoreError>;

    /// Create a new object; returns the stored form
    async fn create(&self, object: &Unstructured) -> Result<Unstructured, StoreError>;

    /// Replace an existing object; returns the stored form
    async fn update(&self, object: &Unstructured) -> Result<Unstructured, StoreError>;

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;
}
