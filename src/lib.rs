//! Manifest Applier Library
//!
//! Renders Kubernetes manifest templates against a set of values and applies
//! the resulting resources to a cluster (or any [`store::ObjectStore`]).
//!
//! - `template`: template sources and the MiniJinja-backed renderer
//! - `resource`: schema-less objects and manifest decoding
//! - `scheme`: type registry and owner identity for owner references
//! - `merge`: reconciliation of live and desired objects
//! - `store`: the object store contract with Kubernetes and in-memory backends
//! - `applier`: create, update and delete of rendered resources

pub mod applier;
pub mod config;
pub mod constants;
pub mod error;
pub mod merge;
pub mod observability;
pub mod prelude;
pub mod resource;
pub mod scheme;
pub mod store;
pub mod template;

pub use applier::{Applier, ApplierBuilder, ApplyMode, ApplyOutcome, ApplyReport};
pub use error::{ApplierError, Result};
