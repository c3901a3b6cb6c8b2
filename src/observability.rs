//! # Observability
//!
//! Installs the process-wide `tracing` subscriber.

use crate::config::ApplierConfig;
use crate::constants::DEFAULT_TRACING_TARGET;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber configured from `config`
///
/// `RUST_LOG` overrides the configured level. Returns `false` when a global
/// subscriber was already installed, which leaves that subscriber in place.
pub fn init_tracing(config: &ApplierConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.json_logs() {
        builder.json().try_init()
    } else {
        builder.with_ansi(config.log_enable_color).try_init()
    };

    installed.is_ok()
}

fn default_directive(config: &ApplierConfig) -> String {
    format!(
        "{}={}",
        DEFAULT_TRACING_TARGET,
        config.log_level.to_lowercase()
    )
}
