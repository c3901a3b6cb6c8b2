//! # Applier
//!
//! Renders manifest templates and writes the resulting objects to an
//! [`ObjectStore`].
//!
//! For each document, in template order then document order:
//! 1. Decode it and stamp the configured owner as controller
//! 2. Read the live object by group-version-kind and namespaced name
//! 3. Absent: create it (unless update-only)
//! 4. Present: merge live and desired state and replace only when the
//!    merger reports a change (unless create-only)
//!
//! A batch stops at the first failure; resources already written stay written.

use crate::constants::ASSETS_TEMPLATE_NAME;
use crate::error::{ApplierError, Result};
use crate::merge::Merger;
use crate::resource::{decode_document, split_documents, DocumentRef, ObjectKey, Unstructured};
use crate::scheme::{Owner, Scheme};
use crate::store::{ObjectStore, StoreError};
use crate::template::{RenderedTemplate, TemplateRenderer};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

mod builder;
mod owner;
mod report;

pub use builder::ApplierBuilder;
pub use report::{AppliedResource, ApplyOutcome, ApplyReport};

/// Source label for resources handed to the applier already decoded
const RESOURCES_SOURCE: &str = "<resources>";

/// How an apply treats the presence or absence of the target object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Create when absent, update when present
    CreateOrUpdate,
    /// Fail with `ResourceAlreadyExists` when present
    CreateOnly,
    /// Fail with `ResourceNotFound` when absent
    UpdateOnly,
}

impl ApplyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyMode::CreateOrUpdate => "create_or_update",
            ApplyMode::CreateOnly => "create",
            ApplyMode::UpdateOnly => "update",
        }
    }

    fn allows_create(self) -> bool {
        self != ApplyMode::UpdateOnly
    }

    fn allows_update(self) -> bool {
        self != ApplyMode::CreateOnly
    }
}

/// Applies rendered manifests to a store
///
/// Immutable after construction; concurrent calls against the same store
/// race only at the store's own concurrency check.
#[derive(Clone)]
pub struct Applier {
    renderer: Arc<TemplateRenderer>,
    store: Arc<dyn ObjectStore>,
    owner: Option<Owner>,
    scheme: Option<Arc<Scheme>>,
    merger: Option<Arc<dyn Merger>>,
    delimiter: String,
}

impl std::fmt::Debug for Applier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Applier")
            .field("owner", &self.owner)
            .field("has_merger", &self.merger.is_some())
            .field("delimiter", &self.delimiter)
            .finish_non_exhaustive()
    }
}

impl Applier {
    pub fn builder() -> ApplierBuilder {
        ApplierBuilder::new()
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn has_merger(&self) -> bool {
        self.merger.is_some()
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Render `path` (a template or a directory of templates) and create or
    /// update every resource it yields
    pub async fn create_or_update_in_path<V>(
        &self,
        path: &str,
        excluded: &[&str],
        recursive: bool,
        values: &V,
    ) -> Result<ApplyReport>
    where
        V: Serialize + ?Sized,
    {
        self.apply_in_path(path, excluded, recursive, values, ApplyMode::CreateOrUpdate)
            .await
    }

    /// Like [`Applier::create_or_update_in_path`], but every target must be absent
    pub async fn create_in_path<V>(
        &self,
        path: &str,
        excluded: &[&str],
        recursive: bool,
        values: &V,
    ) -> Result<ApplyReport>
    where
        V: Serialize + ?Sized,
    {
        self.apply_in_path(path, excluded, recursive, values, ApplyMode::CreateOnly)
            .await
    }

    /// Like [`Applier::create_or_update_in_path`], but every target must exist
    pub async fn update_in_path<V>(
        &self,
        path: &str,
        excluded: &[&str],
        recursive: bool,
        values: &V,
    ) -> Result<ApplyReport>
    where
        V: Serialize + ?Sized,
    {
        self.apply_in_path(path, excluded, recursive, values, ApplyMode::UpdateOnly)
            .await
    }

    pub async fn apply_in_path<V>(
        &self,
        path: &str,
        excluded: &[&str],
        recursive: bool,
        values: &V,
        mode: ApplyMode,
    ) -> Result<ApplyReport>
    where
        V: Serialize + ?Sized,
    {
        let span = info_span!("applier.apply_path", path = %path, mode = mode.as_str());
        async move {
            let templates = self.render_path(path, excluded, recursive, values)?;
            let mut report = ApplyReport::default();
            for template in &templates {
                self.apply_manifest(
                    &template.content,
                    &template.path,
                    &self.delimiter,
                    mode,
                    &mut report,
                )
                .await?;
            }
            info!("Applied templates in {}: {}", path, report);
            Ok::<_, ApplierError>(report)
        }
        .instrument(span)
        .await
    }

    /// Render one in-memory multi-document template and create or update
    /// every resource in it
    pub async fn create_or_update_assets<V>(
        &self,
        assets: &[u8],
        values: &V,
        delimiter: &str,
    ) -> Result<ApplyReport>
    where
        V: Serialize + ?Sized,
    {
        if delimiter.trim().is_empty() {
            return Err(ApplierError::InvalidConfiguration(
                "document delimiter must not be empty".to_string(),
            ));
        }

        let span = info_span!("applier.apply_assets", delimiter = %delimiter);
        async move {
            let source = std::str::from_utf8(assets).map_err(|e| ApplierError::ManifestDecode {
                document: DocumentRef::new(ASSETS_TEMPLATE_NAME, 0),
                reason: format!("assets are not valid UTF-8: {e}"),
            })?;
            let rendered = self
                .renderer
                .render_str(ASSETS_TEMPLATE_NAME, source, values)?;

            let mut report = ApplyReport::default();
            self.apply_manifest(
                &rendered,
                ASSETS_TEMPLATE_NAME,
                delimiter,
                ApplyMode::CreateOrUpdate,
                &mut report,
            )
            .await?;
            info!("Applied assets: {}", report);
            Ok::<_, ApplierError>(report)
        }
        .instrument(span)
        .await
    }

    /// Create or update already-decoded resources, in order
    pub async fn create_or_update_resources(&self, resources: &[Unstructured]) -> Result<ApplyReport> {
        let span = info_span!("applier.apply_resources", count = resources.len());
        async move {
            let mut report = ApplyReport::default();
            for (index, resource) in resources.iter().enumerate() {
                let document = DocumentRef::new(RESOURCES_SOURCE, index);
                let key = validate(resource, &document)?;
                let outcome = self
                    .apply_object(resource.clone(), &key, ApplyMode::CreateOrUpdate)
                    .await?;
                report.push(document, key, outcome);
            }
            Ok::<_, ApplierError>(report)
        }
        .instrument(span)
        .await
    }

    /// Create or update a single already-decoded resource
    pub async fn create_or_update_resource(&self, resource: Unstructured) -> Result<ApplyOutcome> {
        let key = validate(&resource, &DocumentRef::new(RESOURCES_SOURCE, 0))?;
        self.apply_object(resource, &key, ApplyMode::CreateOrUpdate)
            .await
    }

    /// Render `path` and decode every resource without touching the store
    pub fn render_resources_in_path<V>(
        &self,
        path: &str,
        excluded: &[&str],
        recursive: bool,
        values: &V,
    ) -> Result<Vec<(DocumentRef, Unstructured)>>
    where
        V: Serialize + ?Sized,
    {
        let mut resources = Vec::new();
        for template in self.render_path(path, excluded, recursive, values)? {
            let content = manifest_text(&template.content, &template.path)?;
            for (index, document) in split_documents(content, &self.delimiter).iter().enumerate() {
                let document_ref = DocumentRef::new(template.path.as_str(), index);
                let object = decode_document(document, &document_ref)?;
                resources.push((document_ref, object));
            }
        }
        Ok(resources)
    }

    /// Delete every resource rendered from `path`, last rendered first
    ///
    /// Resources already absent are reported as [`ApplyOutcome::Absent`].
    pub async fn delete_in_path<V>(
        &self,
        path: &str,
        excluded: &[&str],
        recursive: bool,
        values: &V,
    ) -> Result<ApplyReport>
    where
        V: Serialize + ?Sized,
    {
        let span = info_span!("applier.delete_path", path = %path);
        async move {
            let resources = self.render_resources_in_path(path, excluded, recursive, values)?;
            let mut report = ApplyReport::default();
            for (document, object) in resources.into_iter().rev() {
                let key = validate(&object, &document)?;
                let outcome = match self.store.delete(&key).await {
                    Ok(()) => {
                        info!("Deleted {}", key);
                        ApplyOutcome::Deleted
                    }
                    Err(StoreError::NotFound) => {
                        debug!("{} already absent", key);
                        ApplyOutcome::Absent
                    }
                    Err(source) => {
                        return Err(ApplierError::Store {
                            operation: "delete",
                            resource: key,
                            source,
                        })
                    }
                };
                report.push(document, key, outcome);
            }
            info!("Deleted templates in {}: {}", path, report);
            Ok::<_, ApplierError>(report)
        }
        .instrument(span)
        .await
    }

    /// Templates to render for `path`: the directory's listing or the single template
    fn render_path<V>(
        &self,
        path: &str,
        excluded: &[&str],
        recursive: bool,
        values: &V,
    ) -> Result<Vec<RenderedTemplate>>
    where
        V: Serialize + ?Sized,
    {
        if self.renderer.is_directory(path)? {
            return self
                .renderer
                .render_directory(path, excluded, recursive, values);
        }
        if excluded.contains(&path) {
            debug!("Skipping excluded template {}", path);
            return Ok(Vec::new());
        }
        let content = self.renderer.render(path, values)?;
        Ok(vec![RenderedTemplate {
            path: path.to_string(),
            content,
        }])
    }

    /// Decode and apply each document of one rendered manifest, in order
    async fn apply_manifest(
        &self,
        content: &[u8],
        source: &str,
        delimiter: &str,
        mode: ApplyMode,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let content = manifest_text(content, source)?;
        let documents = split_documents(content, delimiter);
        debug!("Template {} rendered {} documents", source, documents.len());

        for (index, document) in documents.iter().enumerate() {
            let document_ref = DocumentRef::new(source, index);
            let object = decode_document(document, &document_ref)?;
            let key = validate(&object, &document_ref)?;
            let outcome = self.apply_object(object, &key, mode).await?;
            report.push(document_ref, key, outcome);
        }
        Ok(())
    }

    /// Reconcile one object with the store according to `mode`
    async fn apply_object(
        &self,
        mut object: Unstructured,
        key: &ObjectKey,
        mode: ApplyMode,
    ) -> Result<ApplyOutcome> {
        if let Some(owner) = &self.owner {
            owner::set_controller_reference(&mut object, key, owner, self.scheme.as_deref())?;
        }

        let current = match self.store.get(key).await {
            Ok(current) => current,
            Err(StoreError::NotFound) => return self.create_object(object, key, mode).await,
            Err(source) => {
                return Err(ApplierError::Store {
                    operation: "get",
                    resource: key.clone(),
                    source,
                })
            }
        };

        if !mode.allows_update() {
            return Err(ApplierError::ResourceAlreadyExists {
                resource: key.clone(),
            });
        }
        let Some(merger) = &self.merger else {
            return Err(ApplierError::MergeNotConfigured {
                resource: key.clone(),
            });
        };

        let (mut merged, needs_update) = merger.merge(&current, &object);
        if !needs_update {
            debug!("{} is up to date", key);
            return Ok(ApplyOutcome::Unchanged);
        }

        let merged_key = merged.validate().map_err(|reason| ApplierError::Store {
            operation: "update",
            resource: key.clone(),
            source: StoreError::Invalid(format!("merged object is incomplete: {reason}")),
        })?;
        if merged_key != *key {
            return Err(ApplierError::Store {
                operation: "update",
                resource: key.clone(),
                source: StoreError::Invalid(format!("merger changed object identity to {merged_key}")),
            });
        }
        if let Some(version) = current.resource_version() {
            merged.set_resource_version(version);
        }

        match self.store.update(&merged).await {
            Ok(_) => {
                info!("Updated {}", key);
                Ok(ApplyOutcome::Updated)
            }
            Err(source @ StoreError::Conflict(_)) => {
                warn!("Update of {} conflicted: {}", key, source);
                Err(ApplierError::UpdateConflict {
                    resource: key.clone(),
                    source,
                })
            }
            Err(StoreError::NotFound) => Err(ApplierError::ResourceNotFound {
                resource: key.clone(),
            }),
            Err(source) => Err(ApplierError::Store {
                operation: "update",
                resource: key.clone(),
                source,
            }),
        }
    }

    async fn create_object(
        &self,
        object: Unstructured,
        key: &ObjectKey,
        mode: ApplyMode,
    ) -> Result<ApplyOutcome> {
        if !mode.allows_create() {
            return Err(ApplierError::ResourceNotFound {
                resource: key.clone(),
            });
        }

        match self.store.create(&object).await {
            Ok(_) => {
                info!("Created {}", key);
                Ok(ApplyOutcome::Created)
            }
            Err(StoreError::AlreadyExists) => Err(ApplierError::ResourceAlreadyExists {
                resource: key.clone(),
            }),
            Err(source) => Err(ApplierError::Store {
                operation: "create",
                resource: key.clone(),
                source,
            }),
        }
    }
}

fn manifest_text<'a>(content: &'a [u8], source: &str) -> Result<&'a str> {
    std::str::from_utf8(content).map_err(|e| ApplierError::ManifestDecode {
        document: DocumentRef::new(source, 0),
        reason: format!("rendered manifest is not valid UTF-8: {e}"),
    })
}

fn validate(object: &Unstructured, document: &DocumentRef) -> Result<ObjectKey> {
    object.validate().map_err(|reason| ApplierError::ManifestDecode {
        document: document.clone(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::DefaultKubernetesMerger;
    use crate::store::{MemoryObjectStore, StoreVerb};
    use crate::template::{InMemoryReader, TemplateFunctions};
    use serde_json::json;

    fn applier(reader: InMemoryReader, store: &MemoryObjectStore) -> Applier {
        Applier::builder()
            .renderer(Arc::new(TemplateRenderer::new(
                Arc::new(reader),
                &TemplateFunctions::new(),
            )))
            .store(store.clone())
            .merger(DefaultKubernetesMerger)
            .build()
            .expect("builds")
    }

    fn config_map(name: &str, value: &str) -> Unstructured {
        Unstructured::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": "ns1"},
            "data": {"value": value}
        }))
        .expect("object")
    }

    #[tokio::test]
    async fn test_single_template_path() {
        let store = MemoryObjectStore::new();
        let reader = InMemoryReader::new().with_file(
            "cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {{ Name }}\n  namespace: ns1\n",
        );
        let report = applier(reader, &store)
            .create_or_update_in_path("cm.yaml", &[], false, &json!({"Name": "cm1"}))
            .await
            .expect("applies");
        assert_eq!(report.count(ApplyOutcome::Created), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_excluded_single_template_is_skipped() {
        let store = MemoryObjectStore::new();
        let reader = InMemoryReader::new().with_file("cm.yaml", "not: rendered\n");
        let report = applier(reader, &store)
            .create_or_update_in_path("cm.yaml", &["cm.yaml"], false, &json!({}))
            .await
            .expect("applies");
        assert!(report.is_empty());
        assert!(store.operations().await.is_empty());
    }

    #[tokio::test]
    async fn test_resources_round_trip_and_update() {
        let store = MemoryObjectStore::new();
        let applier = applier(InMemoryReader::new(), &store);

        let report = applier
            .create_or_update_resources(&[config_map("a", "1"), config_map("b", "1")])
            .await
            .expect("applies");
        assert_eq!(report.count(ApplyOutcome::Created), 2);

        let outcome = applier
            .create_or_update_resource(config_map("a", "1"))
            .await
            .expect("applies");
        assert_eq!(outcome, ApplyOutcome::Unchanged);

        let outcome = applier
            .create_or_update_resource(config_map("a", "2"))
            .await
            .expect("applies");
        assert_eq!(outcome, ApplyOutcome::Updated);

        let key = config_map("a", "2").validate().expect("valid");
        let stored = store.object(&key).await.expect("stored");
        assert_eq!(stored.get("data"), Some(&json!({"value": "2"})));
        assert_eq!(stored.resource_version(), Some("3"));
    }

    #[tokio::test]
    async fn test_invalid_resource_is_decode_error() {
        let store = MemoryObjectStore::new();
        let incomplete = Unstructured::from_value(json!({"apiVersion": "v1", "kind": "ConfigMap"}))
            .expect("object");
        let err = applier(InMemoryReader::new(), &store)
            .create_or_update_resources(&[config_map("a", "1"), incomplete])
            .await
            .unwrap_err();
        match err {
            ApplierError::ManifestDecode { document, .. } => {
                assert_eq!(document, DocumentRef::new(RESOURCES_SOURCE, 1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_merger_changing_identity_is_rejected() {
        let store = MemoryObjectStore::with_objects([config_map("a", "1")]).expect("seeded");
        let applier = Applier::builder()
            .renderer(Arc::new(TemplateRenderer::new(
                Arc::new(InMemoryReader::new()),
                &TemplateFunctions::new(),
            )))
            .store(store.clone())
            .merger(|_current: &Unstructured, _desired: &Unstructured| {
                (config_map("renamed", "1"), true)
            })
            .build()
            .expect("builds");

        let err = applier
            .create_or_update_resource(config_map("a", "2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplierError::Store { operation: "update", .. }), "got {err:?}");
        assert!(store.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_in_path_reverses_order() {
        let store = MemoryObjectStore::new();
        let reader = InMemoryReader::new()
            .with_file(
                "dir/a.yaml",
                "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n  namespace: ns1\n",
            )
            .with_file(
                "dir/b.yaml",
                "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: b\n  namespace: ns1\n",
            );
        let applier = applier(reader, &store);
        applier
            .create_or_update_in_path("dir", &[], false, &json!({}))
            .await
            .expect("applies");
        store.clear_operations().await;

        let report = applier
            .delete_in_path("dir", &["dir/a.yaml"], false, &json!({}))
            .await
            .expect("deletes");
        assert_eq!(report.count(ApplyOutcome::Deleted), 1);
        assert_eq!(store.len().await, 1);

        let report = applier
            .delete_in_path("dir", &[], false, &json!({}))
            .await
            .expect("deletes");
        let names: Vec<_> = report.keys().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(report.count(ApplyOutcome::Absent), 1);
        assert!(store.is_empty().await);

        let verbs: Vec<_> = store.operations().await.iter().map(|op| op.verb).collect();
        assert!(verbs.iter().all(|verb| *verb == StoreVerb::Delete));
    }

    #[tokio::test]
    async fn test_assets_reject_empty_delimiter() {
        let store = MemoryObjectStore::new();
        let err = applier(InMemoryReader::new(), &store)
            .create_or_update_assets(b"kind: A\n", &json!({}), "")
            .await
            .unwrap_err();
        assert!(matches!(err, ApplierError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_mode_permissions() {
        assert!(ApplyMode::CreateOrUpdate.allows_create());
        assert!(ApplyMode::CreateOrUpdate.allows_update());
        assert!(!ApplyMode::CreateOnly.allows_update());
        assert!(!ApplyMode::UpdateOnly.allows_create());
    }

    /// Records each event's message with the names of the spans it fired in
    #[derive(Clone, Default)]
    struct SpanRecorder {
        events: Arc<std::sync::Mutex<Vec<(String, Vec<&'static str>)>>>,
    }

    struct MessageVisitor<'a>(&'a mut String);

    impl tracing::field::Visit for MessageVisitor<'_> {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                *self.0 = format!("{value:?}");
            }
        }
    }

    impl<S> tracing_subscriber::Layer<S> for SpanRecorder
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let spans = ctx
                .event_scope(event)
                .map(|scope| scope.map(|span| span.name()).collect())
                .unwrap_or_default();
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            if let Ok(mut events) = self.events.lock() {
                events.push((message, spans));
            }
        }
    }

    impl SpanRecorder {
        fn spans_of(&self, message: &str) -> Vec<&'static str> {
            self.events
                .lock()
                .expect("lock")
                .iter()
                .find(|(recorded, _)| recorded == message)
                .map(|(_, spans)| spans.clone())
                .unwrap_or_else(|| panic!("no event {message:?}"))
        }
    }

    #[tokio::test]
    async fn test_rendering_happens_inside_operation_span() {
        use tracing_subscriber::layer::SubscriberExt;

        let recorder = SpanRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = MemoryObjectStore::new();
        let reader = InMemoryReader::new().with_file(
            "cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {{ Name }}\n  namespace: ns1\n",
        );
        let applier = applier(reader, &store);
        let values = json!({"Name": "cm1"});

        applier
            .create_or_update_in_path("cm.yaml", &[], false, &values)
            .await
            .expect("applies");
        applier
            .create_or_update_assets(
                b"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {{ Name }}-assets\n  namespace: ns1\n",
                &values,
                "---",
            )
            .await
            .expect("applies assets");
        applier
            .delete_in_path("cm.yaml", &[], false, &values)
            .await
            .expect("deletes");

        let spans = recorder.spans_of("Rendering template cm.yaml");
        assert!(spans.contains(&"applier.apply_path"), "got {spans:?}");
        let spans = recorder.spans_of("Rendering template <assets>");
        assert!(spans.contains(&"applier.apply_assets"), "got {spans:?}");

        let delete_spans: Vec<_> = recorder
            .events
            .lock()
            .expect("lock")
            .iter()
            .filter(|(message, _)| message == "Rendering template cm.yaml")
            .map(|(_, spans)| spans.clone())
            .collect();
        assert_eq!(delete_spans.len(), 2);
        assert!(delete_spans[1].contains(&"applier.delete_path"), "got {delete_spans:?}");
    }
}
