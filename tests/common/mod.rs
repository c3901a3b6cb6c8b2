//! Common test utilities for applier integration tests
//!
//! Provides the template fixtures, the values they render against and
//! helpers to build appliers over an in-memory store.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use manifest_applier::prelude::*;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Values the fixture templates are rendered against
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BootstrapValues {
    pub managed_cluster_name: String,
    pub managed_cluster_namespace: String,
    pub bootstrap_service_account_name: String,
    pub labels: Option<BTreeMap<String, String>>,
}

pub fn values() -> BootstrapValues {
    BootstrapValues {
        managed_cluster_name: "cluster1".to_string(),
        managed_cluster_namespace: "ns1".to_string(),
        bootstrap_service_account_name: "sa1".to_string(),
        labels: None,
    }
}

/// Same three resources as the `test` fixture directory, as one blob
pub const ASSETS_YAML: &str = r#"apiVersion: v1
kind: ServiceAccount
metadata:
  name: {{ BootstrapServiceAccountName }}
  namespace: {{ ManagedClusterNamespace }}
secrets:
- name: mysecret
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: {{ ManagedClusterName }}
rules:
- apiGroups:
  - ""
  resources:
  - secrets
  verbs:
  - get
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRoleBinding
metadata:
  name: {{ ManagedClusterName }}
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: ClusterRole
  name: {{ ManagedClusterName }}
subjects:
- kind: ServiceAccount
  name: {{ BootstrapServiceAccountName }}
  namespace: {{ ManagedClusterNamespace }}
"#;

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn fixture_renderer() -> Arc<TemplateRenderer> {
    Arc::new(TemplateRenderer::new(
        Arc::new(FileSystemReader::new(fixtures_dir())),
        &TemplateFunctions::new(),
    ))
}

pub fn renderer_for(reader: InMemoryReader) -> Arc<TemplateRenderer> {
    Arc::new(TemplateRenderer::new(
        Arc::new(reader),
        &TemplateFunctions::new(),
    ))
}

/// Applier over the fixture templates with the default merger
pub fn merging_applier(store: &MemoryObjectStore) -> Applier {
    Applier::builder()
        .renderer(fixture_renderer())
        .store(store.clone())
        .merger(DefaultKubernetesMerger)
        .build()
        .expect("applier builds")
}

/// Applier over the fixture templates without a merger
pub fn plain_applier(store: &MemoryObjectStore) -> Applier {
    Applier::builder()
        .renderer(fixture_renderer())
        .store(store.clone())
        .build()
        .expect("applier builds")
}

pub fn service_account_key() -> ObjectKey {
    ObjectKey::new(
        kube::core::GroupVersionKind::gvk("", "v1", "ServiceAccount"),
        Some("ns1".to_string()),
        "sa1",
    )
}

pub fn cluster_role_key() -> ObjectKey {
    ObjectKey::new(
        kube::core::GroupVersionKind::gvk("rbac.authorization.k8s.io", "v1", "ClusterRole"),
        None,
        "cluster1",
    )
}

pub fn cluster_role_binding_key() -> ObjectKey {
    ObjectKey::new(
        kube::core::GroupVersionKind::gvk(
            "rbac.authorization.k8s.io",
            "v1",
            "ClusterRoleBinding",
        ),
        None,
        "cluster1",
    )
}

/// Live service account `ns1/sa1`, optionally with secrets already attached
pub fn live_service_account(secrets: &[&str]) -> Unstructured {
    let mut sa = json!({
        "apiVersion": "v1",
        "kind": "ServiceAccount",
        "metadata": {"name": "sa1", "namespace": "ns1"}
    });
    if !secrets.is_empty() {
        sa["secrets"] = secrets.iter().map(|name| json!({"name": name})).collect();
    }
    Unstructured::from_value(sa).expect("valid service account")
}

/// Names listed under `secrets` of a stored service account
pub fn secret_names(sa: &Unstructured) -> Vec<String> {
    sa.get("secrets")
        .and_then(|secrets| secrets.as_array())
        .map(|secrets| {
            secrets
                .iter()
                .filter_map(|s| s.get("name").and_then(|n| n.as_str()))
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}
