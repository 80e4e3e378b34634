use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::arena::DEFAULT_BLOCK_SIZE;
use crate::frequency::Frequency;
use crate::path::{LogBase, Postfix};
use crate::processor::{Processor, RotateTask, Task};
use crate::target::ConcurrencyMode;
use crate::timestamp::TimestampFormat;

/// Configuration for a log target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Log directory; relative paths are resolved against `base`
    pub log_dir: Option<PathBuf>,
    /// What a relative `log_dir` is relative to
    pub base: LogBase,
    /// Application name used in file names (derived from the executable when unset)
    pub app_name: Option<String>,
    /// File name postfix scheme
    pub postfix: Postfix,
    /// How events reach the processor chain
    pub mode: ConcurrencyMode,
    /// Suppress the echo stage
    pub no_echo: bool,
    /// Suppress the write stage
    pub no_file_write: bool,
    /// Colour echoed lines by severity
    pub colour: bool,
    /// Run every processor once for the first event
    pub run_all_on_startup: bool,
    /// Timestamp layout at the start of each line
    pub line_format: TimestampFormat,
    /// Trash root used by move-to-trash rotation (XDG data dir when unset)
    pub trash_dir: Option<PathBuf>,
    /// Block size of the rotation scratch arena
    #[serde(default = "default_arena_block_size")]
    pub arena_block_size: usize,
    /// Processor list; `None` selects the default pipeline
    pub processors: Option<Vec<ProcessorConfig>>,
}

impl TargetConfig {
    /// Create a new TargetConfig with defaults
    pub fn new() -> Self {
        Self {
            log_dir: None,
            base: LogBase::default(),
            app_name: None,
            postfix: Postfix::default(),
            mode: ConcurrencyMode::default(),
            no_echo: false,
            no_file_write: false,
            colour: false,
            run_all_on_startup: false,
            line_format: TimestampFormat::default(),
            trash_dir: None,
            arena_block_size: default_arena_block_size(),
            processors: None,
        }
    }

    /// Set the log directory
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Set the directory base
    pub fn with_base(mut self, base: LogBase) -> Self {
        self.base = base;
        self
    }

    /// Set the application name
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the postfix scheme
    pub fn with_postfix(mut self, postfix: Postfix) -> Self {
        self.postfix = postfix;
        self
    }

    /// Set the concurrency mode
    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable or disable echoing
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.no_echo = !echo;
        self
    }

    /// Enable or disable file writes
    pub fn with_file_write(mut self, write: bool) -> Self {
        self.no_file_write = !write;
        self
    }

    /// Enable or disable coloured echo
    pub fn with_colour(mut self, colour: bool) -> Self {
        self.colour = colour;
        self
    }

    /// Run every processor for the first event
    pub fn with_run_all_on_startup(mut self, run_all: bool) -> Self {
        self.run_all_on_startup = run_all;
        self
    }

    /// Set the line timestamp format
    pub fn with_line_format(mut self, format: TimestampFormat) -> Self {
        self.line_format = format;
        self
    }

    /// Set the trash root
    pub fn with_trash_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trash_dir = Some(dir.into());
        self
    }

    /// Set the arena block size
    pub fn with_arena_block_size(mut self, size: usize) -> Self {
        self.arena_block_size = size;
        self
    }

    /// Append a processor to the configured list
    pub fn with_processor(mut self, processor: ProcessorConfig) -> Self {
        self.processors.get_or_insert_with(Vec::new).push(processor);
        self
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_arena_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

/// Serializable processor task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskConfig {
    /// Does nothing
    Noop,
    /// Echo to the console
    Echo,
    /// Move the file name to the event's stamp
    UpdateFilename,
    /// Append to the log file
    Write,
    /// Flush the log file
    Flush,
    /// Rotate old log files
    Rotate(RotateTask),
}

impl From<TaskConfig> for Task {
    fn from(task: TaskConfig) -> Self {
        match task {
            TaskConfig::Noop => Task::Noop,
            TaskConfig::Echo => Task::Echo,
            TaskConfig::UpdateFilename => Task::UpdateFilename,
            TaskConfig::Write => Task::Write,
            TaskConfig::Flush => Task::Flush,
            TaskConfig::Rotate(rotate) => Task::Rotate(rotate),
        }
    }
}

/// Serializable processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// What the processor does
    pub task: TaskConfig,
    /// When it runs
    #[serde(default)]
    pub frequency: Frequency,
    /// Continue to the next processor regardless of outcome
    #[serde(default)]
    pub force_next: bool,
    /// Skip the processor
    #[serde(default)]
    pub disabled: bool,
    /// Run for the first event regardless of frequency
    #[serde(default)]
    pub run_on_startup: bool,
}

impl ProcessorConfig {
    /// Create a new ProcessorConfig with the automatic frequency
    pub fn new(task: TaskConfig) -> Self {
        Self {
            task,
            frequency: Frequency::Auto,
            force_next: false,
            disabled: false,
            run_on_startup: false,
        }
    }

    /// Set frequency
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    /// Set force-next
    pub fn with_force_next(mut self, force_next: bool) -> Self {
        self.force_next = force_next;
        self
    }
}

impl From<ProcessorConfig> for Processor {
    fn from(config: ProcessorConfig) -> Self {
        Processor::new(config.task.into())
            .with_frequency(config.frequency)
            .with_force_next(config.force_next)
            .with_disabled(config.disabled)
            .with_run_on_startup(config.run_on_startup)
    }
}
