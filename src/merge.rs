//! # Merge
//!
//! Reconciles the object held by the store with the freshly rendered one
//! before an update.
//!
//! A [`Merger`] receives `(current, desired)` and returns the object to write
//! plus whether a write is needed at all. Any `Fn(&Unstructured, &Unstructured)
//! -> (Unstructured, bool)` closure is a merger; [`DefaultKubernetesMerger`] is
//! the provided strategy.

use crate::constants::{ACCUMULATING_FIELDS, SERVER_OWNED_FIELDS, SERVER_OWNED_METADATA_FIELDS};
use crate::resource::Unstructured;
use serde_json::Value;

pub trait Merger: Send + Sync {
    /// Returns the object to write and whether it differs from `current`
    fn merge(&self, current: &Unstructured, desired: &Unstructured) -> (Unstructured, bool);
}

impl<F> Merger for F
where
    F: Fn(&Unstructured, &Unstructured) -> (Unstructured, bool) + Send + Sync,
{
    fn merge(&self, current: &Unstructured, desired: &Unstructured) -> (Unstructured, bool) {
        self(current, desired)
    }
}

/// Desired state wins, except for fields the platform owns
///
/// - `metadata`: the live metadata with each rendered metadata key laid over
///   it; server-populated keys (`resourceVersion`, `uid`, ...) always stay live
/// - `status`: always kept from the live object
/// - accumulating lists (`ServiceAccount.secrets`): kept from the live object
///   unless the rendered object sets its own list
/// - every other top-level field: taken from the rendered object
///
/// An update is needed only when the result differs from the live object.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKubernetesMerger;

impl Merger for DefaultKubernetesMerger {
    fn merge(&self, current: &Unstructured, desired: &Unstructured) -> (Unstructured, bool) {
        let mut merged = desired.clone();
        let live = current.as_map();

        let mut metadata = match live.get("metadata") {
            Some(Value::Object(metadata)) => metadata.clone(),
            _ => serde_json::Map::new(),
        };
        if let Some(Value::Object(rendered)) = desired.get("metadata") {
            for (key, value) in rendered {
                if !SERVER_OWNED_METADATA_FIELDS.contains(&key.as_str()) {
                    metadata.insert(key.clone(), value.clone());
                }
            }
        }
        merged
            .as_map_mut()
            .insert("metadata".to_string(), Value::Object(metadata));

        for field in SERVER_OWNED_FIELDS {
            match live.get(*field) {
                Some(value) => {
                    merged.as_map_mut().insert((*field).to_string(), value.clone());
                }
                None => {
                    merged.as_map_mut().remove(*field);
                }
            }
        }

        let kind = current.kind().unwrap_or_default();
        for (_, field) in ACCUMULATING_FIELDS.iter().filter(|(k, _)| *k == kind) {
            if desired.get(field).is_none() {
                if let Some(value) = live.get(*field) {
                    merged.as_map_mut().insert((*field).to_string(), value.clone());
                }
            }
        }

        let needs_update = merged != *current;
        (merged, needs_update)
    }
}
