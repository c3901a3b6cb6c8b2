//! # Template Renderer
//!
//! Renders templates from a [`TemplateReader`] with MiniJinja.
//!
//! Templates use Jinja2 syntax:
//!
//! ```yaml
//! apiVersion: v1
//! kind: ServiceAccount
//! metadata:
//!   name: {{ BootstrapServiceAccountName }}
//!   namespace: {{ ManagedClusterNamespace }}
//! ```

use super::{ReaderError, TemplateFunctions, TemplateReader};
use crate::config::ApplierConfig;
use crate::error::{ApplierError, Result};
use minijinja::{AutoEscape, Environment, ErrorKind, UndefinedBehavior};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// What to do when a template references a value the context does not define
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingKey {
    /// Fail with a template execution error
    #[default]
    Error,
    /// Render the missing value as empty
    Zero,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RendererOptions {
    pub missing_key: MissingKey,
}

impl From<&ApplierConfig> for RendererOptions {
    fn from(config: &ApplierConfig) -> Self {
        Self {
            missing_key: if config.strict_undefined {
                MissingKey::Error
            } else {
                MissingKey::Zero
            },
        }
    }
}

/// One rendered template from a directory render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub path: String,
    pub content: Vec<u8>,
}

/// Renders named templates against a values structure
///
/// The renderer is immutable after construction and safe to share across threads.
pub struct TemplateRenderer {
    reader: Arc<dyn TemplateReader>,
    env: Environment<'static>,
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer").finish_non_exhaustive()
    }
}

impl TemplateRenderer {
    pub fn new(reader: Arc<dyn TemplateReader>, functions: &TemplateFunctions) -> Self {
        Self::with_options(reader, functions, &RendererOptions::default())
    }

    pub fn with_options(
        reader: Arc<dyn TemplateReader>,
        functions: &TemplateFunctions,
        options: &RendererOptions,
    ) -> Self {
        let mut env = Environment::new();
        // Manifests are YAML; escaping would corrupt quoted values
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        env.set_undefined_behavior(match options.missing_key {
            MissingKey::Error => UndefinedBehavior::Strict,
            MissingKey::Zero => UndefinedBehavior::Lenient,
        });
        functions.install(&mut env);

        Self { reader, env }
    }

    pub fn reader(&self) -> &dyn TemplateReader {
        self.reader.as_ref()
    }

    /// Load `template_path` from the reader and render it against `values`
    pub fn render<V>(&self, template_path: &str, values: &V) -> Result<Vec<u8>>
    where
        V: Serialize + ?Sized,
    {
        let bytes = self.reader.read(template_path).map_err(|e| match e {
            ReaderError::NotFound(_) => ApplierError::TemplateNotFound {
                path: template_path.to_string(),
            },
            ReaderError::Io { .. } => ApplierError::TemplateRead {
                path: template_path.to_string(),
                source: e,
            },
        })?;

        let source = String::from_utf8(bytes).map_err(|e| ApplierError::TemplateSyntax {
            path: template_path.to_string(),
            source: minijinja::Error::new(
                ErrorKind::SyntaxError,
                format!("template is not valid UTF-8: {e}"),
            ),
        })?;

        self.render_str(template_path, &source, values)
    }

    /// Render an in-memory template; `name` is used in error messages
    pub fn render_str<V>(&self, name: &str, source: &str, values: &V) -> Result<Vec<u8>>
    where
        V: Serialize + ?Sized,
    {
        debug!("Rendering template {}", name);
        self.env
            .render_named_str(name, source, values)
            .map(String::into_bytes)
            .map_err(|e| {
                if e.kind() == ErrorKind::SyntaxError {
                    ApplierError::TemplateSyntax {
                        path: name.to_string(),
                        source: e,
                    }
                } else {
                    ApplierError::TemplateExecution {
                        path: name.to_string(),
                        source: e,
                    }
                }
            })
    }

    /// Whether `path` names a directory of templates rather than a single template
    pub fn is_directory(&self, path: &str) -> Result<bool> {
        self.reader.is_dir(path).map_err(|e| ApplierError::TemplateRead {
            path: path.to_string(),
            source: e,
        })
    }

    /// Template paths under `dir_path`, minus `excluded`, in lexicographic order
    pub fn list_templates(
        &self,
        dir_path: &str,
        excluded: &[&str],
        recursive: bool,
    ) -> Result<Vec<String>> {
        let mut paths = self
            .reader
            .list(dir_path, recursive)
            .map_err(|e| ApplierError::TemplateRead {
                path: dir_path.to_string(),
                source: e,
            })?;
        paths.retain(|path| {
            let keep = !excluded.contains(&path.as_str());
            if !keep {
                debug!("Skipping excluded template {}", path);
            }
            keep
        });
        paths.sort();
        Ok(paths)
    }

    /// Render every template under `dir_path` against the same `values`
    ///
    /// Stops at the first template that fails to render.
    pub fn render_directory<V>(
        &self,
        dir_path: &str,
        excluded: &[&str],
        recursive: bool,
        values: &V,
    ) -> Result<Vec<RenderedTemplate>>
    where
        V: Serialize + ?Sized,
    {
        self.list_templates(dir_path, excluded, recursive)?
            .into_iter()
            .map(|path| {
                let content = self.render(&path, values)?;
                Ok(RenderedTemplate { path, content })
            })
            .collect()
    }
}
