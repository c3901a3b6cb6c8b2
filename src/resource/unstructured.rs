//! # Unstructured
//!
//! Generic representation of one cluster object, kept as a JSON object tree so
//! any kind can be handled without a compiled-in type for it.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::core::GroupVersionKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identity of a stored object: group-version-kind plus namespaced name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub gvk: GroupVersionKind,
    /// `None` for cluster-scoped objects
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(gvk: GroupVersionKind, namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            gvk,
            namespace,
            name: name.into(),
        }
    }

    /// `apiVersion` string for this key's group and version
    pub fn api_version(&self) -> String {
        api_version_of(&self.gvk)
    }

    /// Stable string form, unique per object
    pub fn canonical(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.gvk.group,
            self.gvk.version,
            self.gvk.kind,
            self.namespace.as_deref().unwrap_or_default(),
            self.name
        )
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(
                f,
                "{} {} {}/{}",
                self.gvk.kind,
                self.api_version(),
                namespace,
                self.name
            ),
            None => write!(f, "{} {} {}", self.gvk.kind, self.api_version(), self.name),
        }
    }
}

/// Build the `apiVersion` string for a group-version-kind (core group has no prefix)
pub fn api_version_of(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        gvk.version.clone()
    } else {
        format!("{}/{}", gvk.group, gvk.version)
    }
}

/// Split an `apiVersion` string into a group-version-kind
pub fn parse_api_version(api_version: &str, kind: &str) -> GroupVersionKind {
    match api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, kind),
        None => GroupVersionKind::gvk("", api_version, kind),
    }
}

/// A schema-less cluster object
///
/// Mandatory fields are `apiVersion`, `kind` and `metadata.name`; use
/// [`Unstructured::validate`] before handing an object to a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unstructured {
    object: Map<String, Value>,
}

impl Unstructured {
    pub fn from_map(object: Map<String, Value>) -> Self {
        Self { object }
    }

    /// Wrap a JSON value; anything but an object is rejected
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(object) => Ok(Self { object }),
            Value::Null => Err("document is empty".to_string()),
            other => Err(format!(
                "document must be a mapping, found {}",
                value_type_name(&other)
            )),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.object
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.object
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.object)
    }

    /// Top-level field lookup
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.object.get(field)
    }

    /// Nested field lookup through object keys, e.g. `["metadata", "name"]`
    pub fn nested(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.object.get(*first)?, |value, key| value.get(key))
    }

    pub fn nested_str(&self, path: &[&str]) -> Option<&str> {
        self.nested(path).and_then(Value::as_str)
    }

    pub fn api_version(&self) -> Option<&str> {
        self.nested_str(&["apiVersion"]).filter(|s| !s.is_empty())
    }

    pub fn kind(&self) -> Option<&str> {
        self.nested_str(&["kind"]).filter(|s| !s.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.nested_str(&["metadata", "name"])
            .filter(|s| !s.is_empty())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.nested_str(&["metadata", "namespace"])
            .filter(|s| !s.is_empty())
    }

    pub fn uid(&self) -> Option<&str> {
        self.nested_str(&["metadata", "uid"])
            .filter(|s| !s.is_empty())
    }

    /// Concurrency token set by the store on read
    pub fn resource_version(&self) -> Option<&str> {
        self.nested_str(&["metadata", "resourceVersion"])
            .filter(|s| !s.is_empty())
    }

    pub fn set_resource_version(&mut self, resource_version: &str) {
        self.metadata_mut().insert(
            "resourceVersion".to_string(),
            Value::String(resource_version.to_string()),
        );
    }

    pub fn set_uid(&mut self, uid: &str) {
        self.metadata_mut()
            .insert("uid".to_string(), Value::String(uid.to_string()));
    }

    /// Mutable access to `metadata`, created (or replaced if malformed) on demand
    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        let entry = self
            .object
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(metadata) => metadata,
            _ => unreachable!("metadata was just set to an object"),
        }
    }

    pub fn gvk(&self) -> Option<GroupVersionKind> {
        Some(parse_api_version(self.api_version()?, self.kind()?))
    }

    pub fn key(&self) -> Option<ObjectKey> {
        Some(ObjectKey::new(
            self.gvk()?,
            self.namespace().map(ToString::to_string),
            self.name()?,
        ))
    }

    /// Check the mandatory fields and return the object's identity
    pub fn validate(&self) -> Result<ObjectKey, String> {
        if self.api_version().is_none() {
            return Err("missing apiVersion".to_string());
        }
        if self.kind().is_none() {
            return Err("missing kind".to_string());
        }
        if self.name().is_none() {
            return Err("missing metadata.name".to_string());
        }
        self.key()
            .ok_or_else(|| "incomplete object identity".to_string())
    }

    pub fn owner_references(&self) -> Result<Vec<OwnerReference>, serde_json::Error> {
        match self.nested(&["metadata", "ownerReferences"]) {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(refs) => serde_json::from_value(refs.clone()),
        }
    }

    pub fn set_owner_references(
        &mut self,
        references: &[OwnerReference],
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(references)?;
        self.metadata_mut()
            .insert("ownerReferences".to_string(), value);
        Ok(())
    }
}

impl TryFrom<Value> for Unstructured {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Unstructured> for Value {
    fn from(object: Unstructured) -> Self {
        object.into_value()
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
