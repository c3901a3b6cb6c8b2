//! # Scheme
//!
//! Registry mapping concrete Rust types to their group-version-kind, and the
//! [`Owner`] handle that uses it to build owner references.
//!
//! ## Usage
//!
//! ```rust
//! use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
//! use manifest_applier::scheme::Scheme;
//!
//! let mut scheme = Scheme::new();
//! scheme.register::<Namespace>().register::<ServiceAccount>();
//! assert_eq!(scheme.resolve_kind::<Namespace>().unwrap().kind, "Namespace");
//! ```

use crate::error::{ApplierError, Result};
use kube::core::GroupVersionKind;
use std::any::{type_name, TypeId};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Registration {
    type_name: &'static str,
    gvk: GroupVersionKind,
}

/// Type registry built at startup and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct Scheme {
    kinds: HashMap<TypeId, Registration>,
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a statically typed Kubernetes resource (any `k8s_openapi` type)
    pub fn register<K>(&mut self) -> &mut Self
    where
        K: kube::Resource<DynamicType = ()> + 'static,
    {
        let gvk = GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()));
        self.register_kind::<K>(gvk)
    }

    /// Register any type under an explicit group-version-kind
    pub fn register_kind<T: 'static>(&mut self, gvk: GroupVersionKind) -> &mut Self {
        self.kinds.insert(
            TypeId::of::<T>(),
            Registration {
                type_name: type_name::<T>(),
                gvk,
            },
        );
        self
    }

    pub fn resolve_kind<T: 'static>(&self) -> Result<GroupVersionKind> {
        self.resolve(TypeId::of::<T>(), type_name::<T>())
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.kinds.contains_key(&TypeId::of::<T>())
    }

    pub(crate) fn resolve(&self, type_id: TypeId, type_name: &str) -> Result<GroupVersionKind> {
        self.kinds
            .get(&type_id)
            .map(|registration| registration.gvk.clone())
            .ok_or_else(|| ApplierError::SchemeResolution {
                type_name: type_name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Names of the registered types, for diagnostics
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.kinds.values().map(|r| r.type_name).collect();
        names.sort_unstable();
        names
    }
}

/// The object that applied resources are attached to for garbage collection
///
/// Captures the owner's concrete type (resolved through a [`Scheme`]) and its
/// identity at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    type_id: TypeId,
    type_name: &'static str,
    name: String,
    namespace: Option<String>,
    uid: String,
}

impl Owner {
    pub fn from_resource<K>(owner: &K) -> Self
    where
        K: kube::Resource + 'static,
    {
        let meta = owner.meta();
        Self {
            type_id: TypeId::of::<K>(),
            type_name: type_name::<K>(),
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone().filter(|ns| !ns.is_empty()),
            uid: meta.uid.clone().unwrap_or_default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Look up this owner's group-version-kind
    pub fn resolve_kind(&self, scheme: &Scheme) -> Result<GroupVersionKind> {
        scheme.resolve(self.type_id, self.type_name)
    }
}
