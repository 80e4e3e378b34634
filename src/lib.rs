//! # Rotalog
//!
//! An embeddable logging engine: each log target runs its events through a
//! configurable chain of processors (echo, write, flush, rotate, custom,
//! redirect, fork), either inline or on a dedicated worker thread, and
//! rotates dated or numbered log files by compressing, trashing or deleting
//! the older ones.
//!
//! ## Features
//!
//! - Processor chains with per-processor trigger frequencies
//! - Synchronous or queued dispatch with pause, resume, shutdown and cancel
//! - Date/time and numbered file name postfixes with rotation
//! - Configuration through serde (YAML, TOML) or a fluent builder
//! - Integration with the `tracing` ecosystem
//!
//! ## Example
//!
//! ```rust,no_run
//! use rotalog::{ConcurrencyMode, LogTarget, Severity};
//!
//! let target = LogTarget::builder()
//!     .with_log_dir("logs")
//!     .with_app_name("svc")
//!     .with_mode(ConcurrencyMode::MultiThreadedSeparateThread)
//!     .build()?;
//!
//! target.log(Severity::Info, "This is an info message")?;
//! target.shutdown()?;
//! # Ok::<(), rotalog::Error>(())
//! ```

pub mod arena;
pub mod builder;
pub mod config;
pub mod default_target;
pub mod error;
pub mod event;
pub mod frequency;
pub mod fsops;
pub mod path;
mod pipeline;
pub mod processor;
mod queue;
pub mod rotation;
pub mod target;
pub mod timestamp;
pub mod tracing_init;
pub mod writer;

pub use builder::TargetBuilder;
pub use config::{ProcessorConfig, TargetConfig, TaskConfig};
pub use error::{Error, ErrorKind, ProcessorError, Result};
pub use event::{Command, Event, EventKind, Severity};
pub use frequency::{Boundary, Frequency};
pub use path::{LogBase, Postfix};
pub use pipeline::TargetOptions;
pub use processor::{Processor, RotateAction, RotateLimit, RotateTask, Task, default_processors};
pub use target::{ConcurrencyMode, ErrorAction, ErrorCallback, LogTarget, TargetState, TargetStats};
pub use timestamp::TimestampFormat;
pub use tracing_init::init_logging;
pub use writer::{EventWriter, TargetMakeWriter};
