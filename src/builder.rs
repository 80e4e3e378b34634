//! Builder pattern for creating log targets.
//!
//! This module provides a fluent API for configuring a [`LogTarget`] in a
//! single chain of method calls, including the parts of a target that cannot
//! come from a configuration file: custom processors, redirect and fork
//! stages, the error callback and the echo writer.
//!
//! # Example
//!
//! ```rust,no_run
//! use rotalog::{ConcurrencyMode, LogTarget, Postfix, Severity};
//!
//! let target = LogTarget::builder()
//!     .with_log_dir("/var/log/svc")
//!     .with_app_name("svc")
//!     .with_postfix(Postfix::Day)
//!     .with_mode(ConcurrencyMode::MultiThreadedSeparateThread)
//!     .build()
//!     .expect("Failed to create log target");
//!
//! target.log(Severity::Info, "service started").unwrap();
//! target.shutdown().unwrap();
//! ```

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::arena::Arena;
use crate::config::TargetConfig;
use crate::error::ProcessorError;
use crate::event::Event;
use crate::path::{self, LogBase, LogPath, Postfix};
use crate::pipeline::{Output, Pipeline, TargetOptions};
use crate::processor::{Processor, default_processors};
use crate::rotation::RotationEngine;
use crate::target::{ConcurrencyMode, ErrorAction, ErrorCallback, LogTarget};
use crate::timestamp::{self, TimestampFormat};
use crate::{Error, Result};

/// A builder for configuring and starting a log target.
pub struct TargetBuilder {
    config: TargetConfig,
    processors: Vec<Processor>,
    error_callback: Option<ErrorCallback>,
    echo: Option<Box<dyn Write + Send>>,
}

impl TargetBuilder {
    /// Create a new TargetBuilder with default configuration.
    pub fn new() -> Self {
        Self::from_config(TargetConfig::new())
    }

    /// Create a TargetBuilder from an existing configuration.
    pub fn from_config(config: TargetConfig) -> Self {
        Self {
            config,
            processors: Vec::new(),
            error_callback: None,
            echo: None,
        }
    }

    /// Set the log directory.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config = self.config.with_log_dir(dir);
        self
    }

    /// Set what a relative log directory is relative to.
    pub fn with_base(mut self, base: LogBase) -> Self {
        self.config = self.config.with_base(base);
        self
    }

    /// Set the application name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.with_app_name(name);
        self
    }

    /// Set the file name postfix scheme.
    pub fn with_postfix(mut self, postfix: Postfix) -> Self {
        self.config = self.config.with_postfix(postfix);
        self
    }

    /// Set the concurrency mode.
    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.config = self.config.with_mode(mode);
        self
    }

    /// Enable or disable echoing.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.config = self.config.with_echo(echo);
        self
    }

    /// Enable or disable file writes.
    pub fn with_file_write(mut self, write: bool) -> Self {
        self.config = self.config.with_file_write(write);
        self
    }

    /// Colour echoed lines by severity.
    pub fn with_colour(mut self, colour: bool) -> Self {
        self.config = self.config.with_colour(colour);
        self
    }

    /// Run every processor once for the first event.
    pub fn with_run_all_on_startup(mut self, run_all: bool) -> Self {
        self.config = self.config.with_run_all_on_startup(run_all);
        self
    }

    /// Set the line timestamp format.
    pub fn with_line_format(mut self, format: TimestampFormat) -> Self {
        self.config = self.config.with_line_format(format);
        self
    }

    /// Set the trash root used by move-to-trash rotation.
    pub fn with_trash_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config = self.config.with_trash_dir(dir);
        self
    }

    /// Append a processor after those in the configuration.
    ///
    /// Once any processor is given, the default pipeline is not used.
    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processors.push(processor);
        self
    }

    /// Set the callback consulted when a processor fails.
    pub fn with_error_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProcessorError, &Processor, &Event) -> ErrorAction + Send + Sync + 'static,
    {
        self.error_callback = Some(Arc::new(callback));
        self
    }

    /// Echo to `writer` instead of stdout.
    pub fn with_echo_writer<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.echo = Some(Box::new(writer));
        self
    }

    /// The configuration collected so far.
    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Resolve paths, assemble the pipeline and start the target.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The log directory or application name cannot be resolved
    /// - The concurrency mode is not supported
    /// - The worker thread cannot be spawned
    pub fn build(self) -> Result<LogTarget> {
        let Self {
            config,
            processors,
            error_callback,
            echo,
        } = self;

        if config.arena_block_size == 0 {
            return Err(Error::Config("arena block size must be non-zero".to_string()));
        }

        let dir = path::resolve_dir(config.base, config.log_dir.as_deref())?;
        let app = path::resolve_app_name(config.app_name.as_deref())?;
        let log_path = LogPath::new(dir, &app, config.postfix, timestamp::now())?;
        debug!(path = log_path.as_str(), mask = log_path.mask().as_str(), "Resolved log path");

        let mut list: Vec<Processor> = match (config.processors, processors.is_empty()) {
            (None, true) => default_processors(),
            (configured, _) => configured
                .into_iter()
                .flatten()
                .map(Processor::from)
                .chain(processors)
                .collect(),
        };
        for processor in &mut list {
            processor.resolve_auto(config.postfix);
        }

        let options = TargetOptions {
            no_echo: config.no_echo,
            no_file_write: config.no_file_write,
            colour_echo: config.colour,
        };
        let rotation = RotationEngine::new(Arena::new(config.arena_block_size), config.trash_dir);
        let echo = echo.unwrap_or_else(|| Box::new(io::stdout()));
        let out = Output::new(log_path, echo, options, config.line_format, rotation);
        let pipeline = Pipeline::new(list, out, error_callback, config.run_all_on_startup);

        LogTarget::start(app, config.mode, pipeline)
    }
}

impl Default for TargetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TargetBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetBuilder")
            .field("config", &self.config)
            .field("processors", &self.processors)
            .field("error_callback", &self.error_callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::{Boundary, Frequency};
    use crate::processor::Task;

    fn in_dir(dir: &std::path::Path) -> TargetBuilder {
        TargetBuilder::new()
            .with_log_dir(dir)
            .with_app_name("svc")
            .with_echo_writer(io::sink())
    }

    #[test]
    fn test_builder_new() {
        let builder = TargetBuilder::new();
        let config = builder.config();
        assert!(!config.no_echo);
        assert_eq!(config.postfix, Postfix::Day);
        assert_eq!(config.mode, ConcurrencyMode::MultiThreaded);
    }

    #[test]
    fn test_builder_chaining() {
        let builder = TargetBuilder::new()
            .with_log_dir("logs")
            .with_base(LogBase::Home)
            .with_echo(false)
            .with_colour(true)
            .with_postfix(Postfix::Hour);
        let config = builder.config();
        assert_eq!(config.log_dir, Some(PathBuf::from("logs")));
        assert_eq!(config.base, LogBase::Home);
        assert!(config.no_echo);
        assert!(config.colour);
        assert_eq!(config.postfix, Postfix::Hour);
    }

    #[test]
    fn test_build_uses_default_processors() {
        let dir = tempfile::tempdir().unwrap();
        let target = in_dir(dir.path()).build().unwrap();
        let frequencies = target.with_processors(|ps| {
            ps.iter().map(Processor::frequency).collect::<Vec<_>>()
        });
        assert_eq!(frequencies.len(), 6);
        assert_eq!(frequencies[0], Frequency::Always);
        assert_eq!(frequencies[3], Frequency::Boundary(Boundary::Day));
        assert_eq!(frequencies[5], Frequency::Boundary(Boundary::Day));
        target.shutdown().unwrap();
    }

    #[test]
    fn test_build_resolves_auto_from_numbered_postfix() {
        let dir = tempfile::tempdir().unwrap();
        let target = in_dir(dir.path())
            .with_postfix(Postfix::DotNumber(Boundary::Hour))
            .with_processor(Processor::new(Task::Flush))
            .build()
            .unwrap();
        let frequency = target.with_processors(|ps| ps[0].frequency());
        assert_eq!(frequency, Frequency::Boundary(Boundary::Hour));
        assert!(target.log_path().ends_with("svc.log"));
        target.shutdown().unwrap();
    }

    #[test]
    fn test_build_rejects_multi_process() {
        let dir = tempfile::tempdir().unwrap();
        let err = in_dir(dir.path())
            .with_mode(ConcurrencyMode::MultiProcess)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_build_rejects_relative_absolute_base() {
        let err = TargetBuilder::new()
            .with_base(LogBase::Absolute)
            .with_log_dir("relative/logs")
            .with_app_name("svc")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::BasePath(_)));
    }

    #[test]
    fn test_build_rejects_bad_app_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = TargetBuilder::new()
            .with_log_dir(dir.path())
            .with_app_name("")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::AppName(_)));
    }
}
