//! # Prelude
//!
//! Re-exports commonly used types for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use manifest_applier::prelude::*;
//!
//! let store = MemoryObjectStore::new();
//! let reader = InMemoryReader::new().with_file("cm.yaml", "kind: ConfigMap\n");
//! ```

pub use crate::applier::{Applier, ApplierBuilder, ApplyMode, ApplyOutcome, ApplyReport};
pub use crate::config::ApplierConfig;
pub use crate::error::{ApplierError, Result};
pub use crate::merge::{DefaultKubernetesMerger, Merger};
pub use crate::resource::{DocumentRef, ObjectKey, Unstructured};
pub use crate::scheme::{Owner, Scheme};
pub use crate::store::{KubeObjectStore, MemoryObjectStore, ObjectStore, StoreError};
pub use crate::template::{
    FileSystemReader, InMemoryReader, TemplateFunctions, TemplateReader, TemplateRenderer,
};
