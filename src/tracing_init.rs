use std::sync::Arc;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::target::LogTarget;
use crate::writer::TargetMakeWriter;
use crate::{Error, Result};

/// Route the application's `tracing` output into `target`.
///
/// Each formatted record becomes one text event on the target, with the
/// tracing level mapped to the event severity. The target adds its own
/// timestamp and severity tag, so the fmt layer omits both. This crate's
/// own diagnostics are filtered out to keep the target from logging into
/// itself.
pub fn init_logging(target: Arc<LogTarget>, level: &str, cli_verbose: Option<u8>) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let log_spec = effective_log_spec(level, cli_verbose, rust_log.as_deref());

    let env_filter = EnvFilter::try_new(&log_spec).map_err(|e| Error::Init(e.to_string()))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(TargetMakeWriter::new(target))
        .with_ansi(false)
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Init(e.to_string()))?;

    Ok(())
}

/// Determine the effective filter, considering RUST_LOG and CLI overrides.
fn effective_log_spec(level: &str, cli_verbose: Option<u8>, rust_log: Option<&str>) -> String {
    let base = match (rust_log, cli_verbose) {
        // RUST_LOG takes precedence over everything
        (Some(spec), _) if !spec.is_empty() => spec.to_string(),
        (_, Some(0)) | (_, None) if !level.is_empty() => level.to_string(),
        (_, Some(0)) | (_, None) => "info".to_string(),
        (_, Some(1)) => "debug".to_string(),
        (_, Some(_)) => "trace".to_string(),
    };
    format!("{},rotalog=off", base)
}
