use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::Result;

/// Initialize console logging for the suite.
///
/// Default: info for our crates, overridable with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter(service_name))
        .with_target(false)
        .with_ansi(true)
        .init();
    Ok(())
}

/// Headless/service mode: append to a log file instead of the console.
/// Rotation is left to the service manager.
pub fn init_to_file(service_name: &str, path: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(default_filter(service_name))
        .with_target(false)
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .init();
    Ok(())
}

fn default_filter(service_name: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,telsuit_core=info,{service_name}=info")))
}
