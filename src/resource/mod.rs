//! # Resources
//!
//! Schema-less cluster objects and the manifests that describe them.
//!
//! - `unstructured`: [`Unstructured`] objects and their [`ObjectKey`] identity
//! - `manifest`: splitting rendered manifests into documents and decoding them

mod manifest;
mod unstructured;

pub use manifest::{decode_document, decode_manifest, split_documents, DocumentRef};
pub use unstructured::{api_version_of, parse_api_version, ObjectKey, Unstructured};
