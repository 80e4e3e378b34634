//! Optional process-wide target for applications that want one.
//!
//! Nothing in the engine depends on this; targets are ordinary values.

use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::event::Severity;
use crate::queue::lock;
use crate::target::LogTarget;
use crate::{Error, Result};

static DEFAULT_TARGET: Lazy<Mutex<Option<Arc<LogTarget>>>> = Lazy::new(|| Mutex::new(None));

/// Install `target` as the process-wide default, returning the previous one.
pub fn install(target: LogTarget) -> Option<Arc<LogTarget>> {
    debug!(target_name = target.name(), "Installing default target");
    lock(&DEFAULT_TARGET).replace(Arc::new(target))
}

/// The current default target.
pub fn get() -> Option<Arc<LogTarget>> {
    lock(&DEFAULT_TARGET).clone()
}

/// Log a text event to the default target.
pub fn log(severity: Severity, message: impl Into<String>) -> Result<()> {
    match get() {
        Some(target) => target.log(severity, message),
        None => Err(Error::Config("no default target installed".to_string())),
    }
}

/// Remove the default target and shut it down.
pub fn shutdown() -> Result<()> {
    let target = lock(&DEFAULT_TARGET).take();
    match target {
        Some(target) => target.shutdown(),
        None => Ok(()),
    }
}
