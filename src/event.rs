//! Log events and their rendering.

use std::fmt::{self, Write as _};

use colored::Color;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::timestamp::{self, TimestampFormat};

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// No severity tag is written.
    None,
    /// Very fine-grained tracing.
    Trace,
    /// Debugging output.
    Debug,
    /// Informational.
    #[default]
    Info,
    /// Normal but significant.
    Notice,
    /// Something unexpected that the application recovered from.
    Warning,
    /// An operation failed.
    Error,
    /// A failure that needs attention.
    Critical,
    /// The application cannot continue.
    Fatal,
}

impl Severity {
    /// Fixed-width tag written after the timestamp.
    pub fn tag(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Trace => "TRC",
            Self::Debug => "DBG",
            Self::Info => "INF",
            Self::Notice => "NOT",
            Self::Warning => "WRN",
            Self::Error => "ERR",
            Self::Critical => "CRI",
            Self::Fatal => "FTL",
        }
    }

    /// Echo colour, if any.
    pub fn color(self) -> Option<Color> {
        match self {
            Self::None | Self::Info => None,
            Self::Trace | Self::Debug => Some(Color::BrightBlack),
            Self::Notice => Some(Color::Cyan),
            Self::Warning => Some(Color::Yellow),
            Self::Error => Some(Color::Red),
            Self::Critical | Self::Fatal => Some(Color::BrightRed),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Configuration changes carried through the queue as events, so they take
/// effect in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Colour echoed lines by severity.
    UseColour(bool),
    /// Suppress the echo stage.
    NoEcho(bool),
    /// Suppress the write stage.
    NoFileWrite(bool),
    /// Enable or disable the processor at `index`.
    SetProcessorDisabled {
        /// Position in the processor list.
        index: usize,
        /// New state.
        disabled: bool,
    },
    /// Run every processor unconditionally for the next event.
    RunAllProcessors,
}

/// Payload of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A text line.
    Text(String),
    /// A configuration command, not written anywhere.
    Command(Command),
    /// Binary data rendered as a caption followed by a hex dump.
    Binary {
        /// Line written before the dump.
        caption: String,
        /// The data.
        data: Vec<u8>,
    },
}

/// One log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    severity: Severity,
    kind: EventKind,
    timestamp: OffsetDateTime,
    echo_only: bool,
    no_echo: bool,
    internal: bool,
    stop_processing: bool,
}

impl Event {
    /// A text event stamped with the current time.
    pub fn text(severity: Severity, message: impl Into<String>) -> Self {
        Self::new(severity, EventKind::Text(message.into()))
    }

    /// A binary event with a caption, stamped with the current time.
    pub fn binary(
        severity: Severity,
        caption: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(
            severity,
            EventKind::Binary {
                caption: caption.into(),
                data: data.into(),
            },
        )
    }

    /// A command event.
    pub fn command(command: Command) -> Self {
        Self::new(Severity::None, EventKind::Command(command))
    }

    /// An event with an explicit payload, stamped with the current time.
    pub fn new(severity: Severity, kind: EventKind) -> Self {
        Self {
            severity,
            kind,
            timestamp: timestamp::now(),
            echo_only: false,
            no_echo: false,
            internal: false,
            stop_processing: false,
        }
    }

    /// Replace the timestamp.
    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Only the echo stage runs for this event.
    pub fn echo_only(mut self) -> Self {
        self.echo_only = true;
        self
    }

    /// The echo stage skips this event.
    pub fn without_echo(mut self) -> Self {
        self.no_echo = true;
        self
    }

    /// Engine-generated event: only echo and write run, no trigger
    /// accounting, never rotates.
    pub(crate) fn internal(severity: Severity, message: String, timestamp: OffsetDateTime) -> Self {
        Self {
            internal: true,
            ..Self::text(severity, message).with_timestamp(timestamp)
        }
    }

    /// Severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Payload.
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Timestamp.
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Whether only the echo stage runs.
    pub fn is_echo_only(&self) -> bool {
        self.echo_only
    }

    /// Whether the echo stage skips this event.
    pub fn is_no_echo(&self) -> bool {
        self.no_echo
    }

    /// Whether the engine generated this event.
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// Whether the rest of the chain is skipped for this event.
    pub fn is_stopped(&self) -> bool {
        self.stop_processing
    }

    pub(crate) fn stop(&mut self) {
        self.stop_processing = true;
    }

    pub(crate) fn reset_stop(&mut self) {
        self.stop_processing = false;
    }

    /// Payload size used by octet-counting triggers.
    pub fn octets(&self) -> usize {
        match &self.kind {
            EventKind::Text(text) => text.len(),
            EventKind::Command(_) => 0,
            EventKind::Binary { caption, data } => caption.len() + data.len(),
        }
    }

    /// Render the event as one or more newline-terminated lines, without
    /// colour.
    pub fn render(&self, format: TimestampFormat) -> String {
        let mut prefix = timestamp::format(self.timestamp, format);
        if self.severity != Severity::None {
            prefix.push(' ');
            prefix.push_str(self.severity.tag());
        }

        let mut out = String::with_capacity(prefix.len() + self.octets() + 2);
        match &self.kind {
            EventKind::Text(text) => {
                for line in text.lines() {
                    out.push_str(&prefix);
                    out.push(' ');
                    out.push_str(line);
                    out.push('\n');
                }
                if text.is_empty() {
                    out.push_str(&prefix);
                    out.push('\n');
                }
            }
            EventKind::Command(_) => {}
            EventKind::Binary { caption, data } => {
                out.push_str(&prefix);
                out.push(' ');
                out.push_str(caption);
                out.push('\n');
                hex_dump(&mut out, data);
            }
        }
        out
    }
}

/// Append a 16-bytes-per-line hex dump with an ASCII column.
fn hex_dump(out: &mut String, data: &[u8]) {
    for (row, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:08X}  ", row * 16);
        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{:02X} ", b);
                }
                None => out.push_str("   "),
            }
            if i == 7 {
                out.push(' ');
            }
        }
        out.push(' ');
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
}
