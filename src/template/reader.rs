//! # Template Reader
//!
//! Read-only sources of template bytes addressed by relative path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Source of template bytes
///
/// Paths are relative and `/`-separated. Implementations must be safe for
/// concurrent reads; the renderer never mutates a source.
pub trait TemplateReader: Send + Sync {
    /// Read one template
    fn read(&self, path: &str) -> Result<Vec<u8>, ReaderError>;

    /// List template paths under `prefix`, sorted lexicographically.
    /// Without `recursive` only direct children are returned.
    fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>, ReaderError>;

    /// Whether `path` names a directory; sources without directory entries
    /// treat any path with templates beneath it as one
    fn is_dir(&self, path: &str) -> Result<bool, ReaderError> {
        Ok(!self.list(path, true)?.is_empty())
    }
}

/// Normalize a relative path: strip `./`, leading and trailing `/`
fn normalize(path: &str) -> &str {
    let path = path.strip_prefix("./").unwrap_or(path);
    path.trim_matches('/')
}

/// Templates held in memory, e.g. an embedded bundle
#[derive(Debug, Clone, Default)]
pub struct InMemoryReader {
    files: BTreeMap<String, Vec<u8>>,
}

impl InMemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<str>, content: impl Into<Vec<u8>>) {
        self.files
            .insert(normalize(path.as_ref()).to_string(), content.into());
    }
}

impl<P: AsRef<str>, C: Into<Vec<u8>>> FromIterator<(P, C)> for InMemoryReader {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut reader = Self::new();
        for (path, content) in iter {
            reader.insert(path, content);
        }
        reader
    }
}

impl TemplateReader for InMemoryReader {
    fn read(&self, path: &str) -> Result<Vec<u8>, ReaderError> {
        self.files
            .get(normalize(path))
            .cloned()
            .ok_or_else(|| ReaderError::NotFound(path.to_string()))
    }

    fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>, ReaderError> {
        let prefix = normalize(prefix);
        let paths = self
            .files
            .keys()
            .filter(|path| {
                let rest = if prefix.is_empty() {
                    Some(path.as_str())
                } else {
                    path.strip_prefix(prefix)
                        .and_then(|rest| rest.strip_prefix('/'))
                };
                rest.is_some_and(|rest| recursive || !rest.contains('/'))
            })
            .cloned()
            .collect();
        // BTreeMap keys are already sorted
        Ok(paths)
    }
}

/// Templates read from a directory tree on disk
#[derive(Debug, Clone)]
pub struct FileSystemReader {
    root: PathBuf,
}

impl FileSystemReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = normalize(path);
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }
}

impl TemplateReader for FileSystemReader {
    fn read(&self, path: &str) -> Result<Vec<u8>, ReaderError> {
        let full_path = self.resolve(path);
        if full_path.is_dir() {
            return Err(ReaderError::NotFound(path.to_string()));
        }
        std::fs::read(&full_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ReaderError::NotFound(path.to_string()),
            _ => ReaderError::Io {
                path: path.to_string(),
                source: e,
            },
        })
    }

    fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>, ReaderError> {
        let dir = self.resolve(prefix);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut paths = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(max_depth) {
            let entry = entry.map_err(|e| ReaderError::Io {
                path: prefix.to_string(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            paths.push(relative);
        }
        paths.sort();
        Ok(paths)
    }

    fn is_dir(&self, path: &str) -> Result<bool, ReaderError> {
        Ok(self.resolve(path).is_dir())
    }
}
