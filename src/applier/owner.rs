//! # Controller References
//!
//! Stamps the applier's owner onto objects as their controlling owner reference.

use crate::error::{ApplierError, Result};
use crate::resource::{api_version_of, parse_api_version, ObjectKey, Unstructured};
use crate::scheme::{Owner, Scheme};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

/// Make `owner` the controller of `object`
///
/// A reference to the same owner (same group, kind and name) is replaced in
/// place; a controller reference to any other owner is an error, as is a
/// namespaced owner for a cluster-scoped or cross-namespace object.
pub(crate) fn set_controller_reference(
    object: &mut Unstructured,
    key: &ObjectKey,
    owner: &Owner,
    scheme: Option<&Scheme>,
) -> Result<()> {
    let owner_reference_error = |reason: String| ApplierError::OwnerReference {
        resource: key.clone(),
        reason,
    };

    let scheme = scheme.ok_or_else(|| ApplierError::SchemeResolution {
        type_name: owner.type_name().to_string(),
    })?;
    let gvk = owner.resolve_kind(scheme)?;

    if let Some(owner_namespace) = owner.namespace() {
        match key.namespace.as_deref() {
            None => {
                return Err(owner_reference_error(format!(
                    "cluster-scoped resource must not have a namespace-scoped owner, owner's namespace {owner_namespace}"
                )))
            }
            Some(namespace) if namespace != owner_namespace => {
                return Err(owner_reference_error(format!(
                    "cross-namespace owner references are disallowed, owner's namespace {owner_namespace}, object's namespace {namespace}"
                )))
            }
            Some(_) => {}
        }
    }

    let reference = OwnerReference {
        api_version: api_version_of(&gvk),
        kind: gvk.kind.clone(),
        name: owner.name().to_string(),
        uid: owner.uid().to_string(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    };

    let mut references = object
        .owner_references()
        .map_err(|e| owner_reference_error(format!("malformed ownerReferences: {e}")))?;

    if let Some(existing) = references
        .iter()
        .find(|r| r.controller == Some(true) && !same_owner(r, &reference))
    {
        return Err(owner_reference_error(format!(
            "already controlled by {} {}",
            existing.kind, existing.name
        )));
    }

    match references.iter().position(|r| same_owner(r, &reference)) {
        Some(index) => references[index] = reference,
        None => references.push(reference),
    }

    object
        .set_owner_references(&references)
        .map_err(|e| owner_reference_error(e.to_string()))
}

/// Owner references match on group, kind and name; version and uid may differ
fn same_owner(a: &OwnerReference, b: &OwnerReference) -> bool {
    let a_gvk = parse_api_version(&a.api_version, &a.kind);
    let b_gvk = parse_api_version(&b.api_version, &b.kind);
    a_gvk.group == b_gvk.group && a.kind == b.kind && a.name == b.name
}
