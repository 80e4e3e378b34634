use std::fmt;

use thiserror::Error as ThisError;

/// Errors that can occur while building or driving a log target
#[derive(ThisError, Debug)]
pub enum Error {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
    /// The log directory could not be resolved.
    #[error("Base path error: {0}")]
    BasePath(String),
    /// The application name could not be resolved.
    #[error("Application name error: {0}")]
    AppName(String),
    /// The tracing subscriber could not be installed.
    #[error("Initialization error: {0}")]
    Init(String),
    /// The requested mode or operation is not supported.
    #[error("Not supported: {0}")]
    Unsupported(&'static str),
    /// The target no longer accepts events.
    #[error("Target is shut down")]
    ShutDown,
    /// Pause and resume need a queued concurrency mode.
    #[error("Target has no queue")]
    NotQueued,
    /// The worker thread could not be spawned.
    #[error("Worker thread error: {0}")]
    ThreadCreate(std::io::Error),
    /// The worker thread panicked.
    #[error("Worker thread of {0} panicked")]
    WorkerPanicked(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy reported to the error callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    /// The log file could not be opened.
    FileOpen = 1,
    /// Writing to the log file failed.
    Write = 2,
    /// Flushing the log file failed.
    Flush = 3,
    /// A path or base directory could not be resolved.
    BasePath = 4,
    /// A memory allocation failed.
    Heap = 5,
    /// The queue semaphore could not be created.
    Semaphore = 6,
    /// The application name could not be resolved.
    AppName = 7,
    /// The worker thread could not be created.
    ThreadCreate = 8,
    /// Renaming a log file failed.
    Rename = 9,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FileOpen => "file open failed",
            Self::Write => "write failed",
            Self::Flush => "flush failed",
            Self::BasePath => "base path resolution failed",
            Self::Heap => "allocation failed",
            Self::Semaphore => "semaphore creation failed",
            Self::AppName => "application name resolution failed",
            Self::ThreadCreate => "thread creation failed",
            Self::Rename => "log file rename failed",
        };
        f.write_str(s)
    }
}

/// A processor failure: taxonomy code plus the underlying OS error.
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{kind} (os error {os_code})")]
pub struct ProcessorError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Raw OS error, 0 when there is none.
    pub os_code: u32,
}

impl ProcessorError {
    /// Create an error without an OS code.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, os_code: 0 }
    }

    /// Create an error from an I/O failure, keeping its raw OS code.
    pub fn from_io(kind: ErrorKind, err: &std::io::Error) -> Self {
        Self {
            kind,
            os_code: err.raw_os_error().map(|c| c as u32).unwrap_or(0),
        }
    }

    /// Combined value: taxonomy in the high 32 bits, OS error in the low 32 bits.
    pub fn code(&self) -> u64 {
        ((self.kind as u64) << 32) | u64::from(self.os_code)
    }
}
