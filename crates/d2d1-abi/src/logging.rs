//! Tracing subscriber setup for plugin processes.
//!
//! A host may load several effects from the same binary, so installation is
//! attempted once per process and later calls are no-ops.

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

/// Environment variable read for the filter directive.
pub const LOG_ENV_VAR: &str = "D2D1_SHADER_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Build the filter from [`LOG_ENV_VAR`], falling back to `RUST_LOG`, then
/// to `warn`.
pub fn env_filter() -> Result<EnvFilter> {
    let directive = std::env::var(LOG_ENV_VAR)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_DIRECTIVE.to_string());
    EnvFilter::try_new(&directive).map_err(|e| anyhow!("invalid log filter {directive:?}: {e}"))
}

/// Install a `fmt` subscriber writing to stderr.
///
/// Returns an error if the filter directive is invalid. If another
/// subscriber is already installed (the host or a sibling plugin did it),
/// this one is silently skipped.
pub fn init() -> Result<()> {
    INSTALLED
        .get_or_try_init(|| {
            let filter = env_filter()?;
            let installed = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .is_ok();
            tracing::debug!(installed, "d2d1 logging initialised");
            Ok(())
        })
        .map(|_| ())
}
