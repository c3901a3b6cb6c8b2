//! # Constants
//!
//! Shared constants used throughout the applier.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default separator between resource documents in a rendered manifest
pub const DEFAULT_DOCUMENT_DELIMITER: &str = "---";

/// Template name used when rendering an in-memory manifest blob
pub const ASSETS_TEMPLATE_NAME: &str = "<assets>";

/// Default global log level
pub const DEFAULT_LOG_LEVEL: &str = "INFO";

/// Default log format (json, text)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Tracing target used as the fallback env filter
pub const DEFAULT_TRACING_TARGET: &str = "manifest_applier";

/// Environment variable overriding the document delimiter
pub const ENV_DOCUMENT_DELIMITER: &str = "APPLIER_DOCUMENT_DELIMITER";

/// Environment variable toggling strict handling of undefined template values
pub const ENV_STRICT_UNDEFINED: &str = "APPLIER_STRICT_UNDEFINED";

/// Metadata keys populated by the API server; never taken from a rendered manifest
pub const SERVER_OWNED_METADATA_FIELDS: &[&str] = &[
    "resourceVersion",
    "uid",
    "creationTimestamp",
    "generation",
    "managedFields",
    "selfLink",
    "deletionTimestamp",
    "deletionGracePeriodSeconds",
];

/// Top-level fields written by the platform rather than by manifests
pub const SERVER_OWNED_FIELDS: &[&str] = &["status"];

/// List fields that accumulate server-issued values after creation, keyed by kind.
/// Kept from the live object when the rendered manifest does not set them.
pub const ACCUMULATING_FIELDS: &[(&str, &str)] = &[("ServiceAccount", "secrets")];
