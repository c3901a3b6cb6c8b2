//! # In-Memory Store
//!
//! [`ObjectStore`] kept in process memory. It behaves like an API server for
//! the parts the applier relies on: it assigns `uid` and `resourceVersion`,
//! rejects stale updates and records every call for inspection.

use super::{ObjectStore, StoreError};
use crate::resource::{ObjectKey, Unstructured};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreVerb {
    Get,
    Create,
    Update,
    Delete,
}

/// One recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOperation {
    pub verb: StoreVerb,
    pub key: ObjectKey,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<String, Unstructured>,
    operations: Vec<StoreOperation>,
    last_version: u64,
}

impl MemoryState {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    /// Stamp server-owned metadata and store the object
    fn insert(&mut self, key: &ObjectKey, mut object: Unstructured) -> Unstructured {
        let version = self.next_version();
        if object.uid().is_none() {
            object.set_uid(&format!("uid-{version}"));
        }
        object.set_resource_version(&version.to_string());
        self.objects.insert(key.canonical(), object.clone());
        object
    }
}

/// Cloning shares the underlying objects
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `objects`, each stamped as if created
    pub fn with_objects(
        objects: impl IntoIterator<Item = Unstructured>,
    ) -> Result<Self, StoreError> {
        let mut state = MemoryState::default();
        for object in objects {
            let key = object.validate().map_err(StoreError::Invalid)?;
            state.insert(&key, object);
        }
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Stored copy of one object, without recording an operation
    pub async fn object(&self, key: &ObjectKey) -> Option<Unstructured> {
        self.state.read().await.objects.get(&key.canonical()).cloned()
    }

    pub async fn objects(&self) -> Vec<Unstructured> {
        self.state.read().await.objects.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.objects.is_empty()
    }

    /// Calls made so far, oldest first
    pub async fn operations(&self) -> Vec<StoreOperation> {
        self.state.read().await.operations.clone()
    }

    /// Recorded calls other than reads
    pub async fn writes(&self) -> Vec<StoreOperation> {
        self.state
            .read()
            .await
            .operations
            .iter()
            .filter(|op| op.verb != StoreVerb::Get)
            .cloned()
            .collect()
    }

    pub async fn clear_operations(&self) {
        self.state.write().await.operations.clear();
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &ObjectKey) -> Result<Unstructured, StoreError> {
        let mut state = self.state.write().await;
        state.operations.push(StoreOperation {
            verb: StoreVerb::Get,
            key: key.clone(),
        });
        state
            .objects
            .get(&key.canonical())
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, object: &Unstructured) -> Result<Unstructured, StoreError> {
        let key = object.validate().map_err(StoreError::Invalid)?;
        let mut state = self.state.write().await;
        state.operations.push(StoreOperation {
            verb: StoreVerb::Create,
            key: key.clone(),
        });

        if object.resource_version().is_some() {
            return Err(StoreError::Invalid(
                "resourceVersion can not be set for create requests".to_string(),
            ));
        }
        if state.objects.contains_key(&key.canonical()) {
            return Err(StoreError::AlreadyExists);
        }

        debug!("Storing new object {}", key);
        Ok(state.insert(&key, object.clone()))
    }

    async fn update(&self, object: &Unstructured) -> Result<Unstructured, StoreError> {
        let key = object.validate().map_err(StoreError::Invalid)?;
        let mut state = self.state.write().await;
        state.operations.push(StoreOperation {
            verb: StoreVerb::Update,
            key: key.clone(),
        });

        let stored = state
            .objects
            .get(&key.canonical())
            .ok_or(StoreError::NotFound)?;
        let Some(version) = object.resource_version() else {
            return Err(StoreError::Invalid(
                "resourceVersion must be set for update requests".to_string(),
            ));
        };
        if stored.resource_version() != Some(version) {
            return Err(StoreError::Conflict(format!(
                "the object has been modified; stored resourceVersion is {}, got {version}",
                stored.resource_version().unwrap_or_default()
            )));
        }

        let mut object = object.clone();
        if let Some(uid) = stored.uid() {
            object.set_uid(uid);
        }
        debug!("Replacing object {}", key);
        Ok(state.insert(&key, object))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.operations.push(StoreOperation {
            verb: StoreVerb::Delete,
            key: key.clone(),
        });
        state
            .objects
            .remove(&key.canonical())
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
