//! # Errors
//!
//! Error taxonomy for rendering and applying manifests.
//!
//! Every variant carries enough context (template path, document reference or
//! resource identity) to locate the offending manifest.

use crate::resource::{DocumentRef, ObjectKey};
use crate::store::StoreError;
use crate::template::ReaderError;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = ApplierError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ApplierError {
    /// Bad constructor arguments; the caller must fix its setup
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("template not found: {path}")]
    TemplateNotFound { path: String },

    /// The template source failed for a reason other than a missing path
    #[error("failed to read template {path}: {source}")]
    TemplateRead {
        path: String,
        #[source]
        source: ReaderError,
    },

    #[error("template {path} failed to parse: {source}")]
    TemplateSyntax {
        path: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("template {path} failed to render: {source}")]
    TemplateExecution {
        path: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("manifest document {document} could not be decoded: {reason}")]
    ManifestDecode {
        document: DocumentRef,
        reason: String,
    },

    #[error("cannot set owner reference on {resource}: {reason}")]
    OwnerReference { resource: ObjectKey, reason: String },

    #[error("type {type_name} is not registered in the scheme")]
    SchemeResolution { type_name: String },

    #[error("{resource} does not exist")]
    ResourceNotFound { resource: ObjectKey },

    #[error("{resource} already exists")]
    ResourceAlreadyExists { resource: ObjectKey },

    /// Update refused because no merge strategy was configured
    #[error("{resource} already exists and no merger is configured to update it")]
    MergeNotConfigured { resource: ObjectKey },

    #[error("update of {resource} conflicted with a concurrent change: {source}")]
    UpdateConflict {
        resource: ObjectKey,
        #[source]
        source: StoreError,
    },

    /// Any other store failure, propagated verbatim
    #[error("{operation} {resource} failed: {source}")]
    Store {
        operation: &'static str,
        resource: ObjectKey,
        #[source]
        source: StoreError,
    },
}

impl ApplierError {
    /// Identity of the resource the error refers to, when one was decoded
    pub fn resource(&self) -> Option<&ObjectKey> {
        match self {
            ApplierError::OwnerReference { resource, .. }
            | ApplierError::ResourceNotFound { resource }
            | ApplierError::ResourceAlreadyExists { resource }
            | ApplierError::MergeNotConfigured { resource }
            | ApplierError::UpdateConflict { resource, .. }
            | ApplierError::Store { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// Template path the error refers to, for rendering failures
    pub fn template_path(&self) -> Option<&str> {
        match self {
            ApplierError::TemplateNotFound { path }
            | ApplierError::TemplateRead { path, .. }
            | ApplierError::TemplateSyntax { path, .. }
            | ApplierError::TemplateExecution { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether retrying the same call could succeed without changing inputs
    pub fn is_transient(&self) -> bool {
        match self {
            ApplierError::UpdateConflict { .. } => true,
            ApplierError::Store { source, .. } => matches!(source, StoreError::Other(_)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::GroupVersionKind;

    fn key() -> ObjectKey {
        ObjectKey::new(
            GroupVersionKind::gvk("", "v1", "ServiceAccount"),
            Some("ns1".to_string()),
            "sa1",
        )
    }

    #[test]
    fn test_error_message_names_resource() {
        let err = ApplierError::MergeNotConfigured { resource: key() };
        let message = err.to_string();
        assert!(message.contains("ServiceAccount"), "got: {message}");
        assert!(message.contains("ns1/sa1"), "got: {message}");
        assert_eq!(err.resource(), Some(&key()));
    }

    #[test]
    fn test_template_path_accessor() {
        let err = ApplierError::TemplateNotFound {
            path: "test/missing.yaml".to_string(),
        };
        assert_eq!(err.template_path(), Some("test/missing.yaml"));
        assert!(err.resource().is_none());
    }

    #[test]
    fn test_transient_classification() {
        let conflict = ApplierError::UpdateConflict {
            resource: key(),
            source: StoreError::Conflict("stale".to_string()),
        };
        assert!(conflict.is_transient());

        let exists = ApplierError::ResourceAlreadyExists { resource: key() };
        assert!(!exists.is_transient());

        let invalid = ApplierError::Store {
            operation: "create",
            resource: key(),
            source: StoreError::Invalid("bad".to_string()),
        };
        assert!(!invalid.is_transient());
    }
}
