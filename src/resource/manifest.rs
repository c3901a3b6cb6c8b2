//! # Manifest
//!
//! Split rendered manifests into documents and decode each into an [`Unstructured`].

use super::Unstructured;
use crate::error::{ApplierError, Result};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Locates one document inside a rendered manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Template path the manifest was rendered from
    pub source: String,
    /// Zero-based position among the non-empty documents of the manifest
    pub index: usize,
}

impl DocumentRef {
    pub fn new(source: impl Into<String>, index: usize) -> Self {
        Self {
            source: source.into(),
            index,
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.source, self.index)
    }
}

/// Split a manifest into documents on lines starting with `delimiter`
///
/// The delimiter must sit at column 0; an indented one belongs to a block
/// scalar. A delimiter line may carry trailing content (`--- # comment` or
/// `--- key: value`); comments are dropped, anything else starts the next document.
/// Documents made only of blank or comment lines are skipped.
pub fn split_documents(content: &str, delimiter: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        match delimiter_remainder(line, delimiter) {
            Some(rest) => {
                push_document(&mut documents, &current);
                current.clear();
                if !rest.is_empty() && !rest.starts_with('#') {
                    current.push(rest);
                }
            }
            None => current.push(line),
        }
    }
    push_document(&mut documents, &current);

    documents
}

/// Returns the trimmed text after the delimiter when `line` is a delimiter line
fn delimiter_remainder<'a>(line: &'a str, delimiter: &str) -> Option<&'a str> {
    let rest = line.trim_end().strip_prefix(delimiter)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn push_document(documents: &mut Vec<String>, lines: &[&str]) {
    let blank = lines.iter().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed.starts_with('#')
    });
    if !blank {
        documents.push(lines.join("\n"));
    }
}

/// Decode one document, requiring `apiVersion`, `kind` and `metadata.name`
pub fn decode_document(document: &str, document_ref: &DocumentRef) -> Result<Unstructured> {
    let decode_error = |reason: String| ApplierError::ManifestDecode {
        document: document_ref.clone(),
        reason,
    };

    let value: Value = serde_yaml::from_str(document).map_err(|e| decode_error(e.to_string()))?;
    let object = Unstructured::from_value(value).map_err(decode_error)?;
    object.validate().map_err(decode_error)?;

    Ok(object)
}

/// Split and decode a whole manifest; stops at the first undecodable document
pub fn decode_manifest(
    content: &str,
    delimiter: &str,
    source: &str,
) -> Result<Vec<(DocumentRef, Unstructured)>> {
    let documents = split_documents(content, delimiter);
    debug!("Manifest {} holds {} documents", source, documents.len());

    documents
        .iter()
        .enumerate()
        .map(|(index, document)| {
            let document_ref = DocumentRef::new(source, index);
            decode_document(document, &document_ref).map(|object| (document_ref, object))
        })
        .collect()
}
