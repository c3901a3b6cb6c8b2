//! ApplierBuilder implementation
//!
//! Collects the renderer, store and optional owner/scheme/merger, then checks
//! the combination once in [`ApplierBuilder::build`].

use super::Applier;
use crate::config::ApplierConfig;
use crate::constants::DEFAULT_DOCUMENT_DELIMITER;
use crate::error::{ApplierError, Result};
use crate::merge::Merger;
use crate::scheme::{Owner, Scheme};
use crate::store::ObjectStore;
use crate::template::TemplateRenderer;
use std::sync::Arc;

/// Builder for [`Applier`]
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use manifest_applier::prelude::*;
///
/// let renderer = TemplateRenderer::new(
///     Arc::new(InMemoryReader::new()),
///     &TemplateFunctions::new(),
/// );
/// let applier = Applier::builder()
///     .renderer(Arc::new(renderer))
///     .store(MemoryObjectStore::new())
///     .merger(DefaultKubernetesMerger)
///     .build()
///     .unwrap();
/// assert!(applier.owner().is_none());
/// ```
#[derive(Clone)]
pub struct ApplierBuilder {
    renderer: Option<Arc<TemplateRenderer>>,
    store: Option<Arc<dyn ObjectStore>>,
    owner: Option<Owner>,
    scheme: Option<Arc<Scheme>>,
    merger: Option<Arc<dyn Merger>>,
    delimiter: String,
}

impl std::fmt::Debug for ApplierBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplierBuilder")
            .field("has_renderer", &self.renderer.is_some())
            .field("has_store", &self.store.is_some())
            .field("owner", &self.owner)
            .field("has_merger", &self.merger.is_some())
            .field("delimiter", &self.delimiter)
            .finish_non_exhaustive()
    }
}

impl Default for ApplierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplierBuilder {
    pub fn new() -> Self {
        Self {
            renderer: None,
            store: None,
            owner: None,
            scheme: None,
            merger: None,
            delimiter: DEFAULT_DOCUMENT_DELIMITER.to_string(),
        }
    }

    pub fn renderer(mut self, renderer: Arc<TemplateRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn store<S: ObjectStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Use a store already shared elsewhere
    pub fn shared_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Stamp every applied object with `owner` as its controller
    pub fn owner(mut self, owner: Owner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = Some(Arc::new(scheme));
        self
    }

    pub fn shared_scheme(mut self, scheme: Arc<Scheme>) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// Without a merger, existing objects are never updated
    pub fn merger<M: Merger + 'static>(mut self, merger: M) -> Self {
        self.merger = Some(Arc::new(merger));
        self
    }

    /// Delimiter for manifests rendered from paths
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Take the settings that apply to an applier from `config`
    pub fn config(self, config: &ApplierConfig) -> Self {
        self.delimiter(config.document_delimiter.clone())
    }

    pub fn build(self) -> Result<Applier> {
        let renderer = self.renderer.ok_or_else(|| {
            ApplierError::InvalidConfiguration("template renderer is required".to_string())
        })?;
        let store = self.store.ok_or_else(|| {
            ApplierError::InvalidConfiguration("object store is required".to_string())
        })?;
        if self.delimiter.trim().is_empty() {
            return Err(ApplierError::InvalidConfiguration(
                "document delimiter must not be empty".to_string(),
            ));
        }

        Ok(Applier {
            renderer,
            store,
            owner: self.owner,
            scheme: self.scheme,
            merger: self.merger,
            delimiter: self.delimiter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::DefaultKubernetesMerger;
    use crate::store::MemoryObjectStore;
    use crate::template::{InMemoryReader, TemplateFunctions};

    fn renderer() -> Arc<TemplateRenderer> {
        Arc::new(TemplateRenderer::new(
            Arc::new(InMemoryReader::new()),
            &TemplateFunctions::new(),
        ))
    }

    #[test]
    fn test_build_requires_renderer() {
        let err = ApplierBuilder::new()
            .store(MemoryObjectStore::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, ApplierError::InvalidConfiguration(ref m) if m.contains("renderer")));
    }

    #[test]
    fn test_build_requires_store() {
        let err = ApplierBuilder::new()
            .renderer(renderer())
            .build()
            .unwrap_err();
        assert!(matches!(err, ApplierError::InvalidConfiguration(ref m) if m.contains("store")));
    }

    #[test]
    fn test_build_rejects_empty_delimiter() {
        let err = ApplierBuilder::new()
            .renderer(renderer())
            .store(MemoryObjectStore::new())
            .delimiter("  ")
            .build()
            .unwrap_err();
        assert!(matches!(err, ApplierError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_build_with_optional_parts() {
        let config = ApplierConfig {
            document_delimiter: "%%%".to_string(),
            ..ApplierConfig::default()
        };
        let applier = ApplierBuilder::new()
            .renderer(renderer())
            .store(MemoryObjectStore::new())
            .merger(DefaultKubernetesMerger)
            .scheme(Scheme::new())
            .config(&config)
            .build()
            .expect("builds");
        assert_eq!(applier.delimiter(), "%%%");
        assert!(applier.has_merger());
        assert!(applier.owner().is_none());
    }
}
