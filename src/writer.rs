//! `io::Write` adapters that turn written lines into target events.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

use crate::event::{Event, Severity};
use crate::target::LogTarget;

/// Buffers written bytes and submits one text event per complete line.
///
/// A trailing partial line is submitted on `flush` or drop.
#[derive(Debug)]
pub struct EventWriter<'a> {
    target: &'a LogTarget,
    severity: Severity,
    buf: Vec<u8>,
}

impl<'a> EventWriter<'a> {
    /// A writer submitting to `target` with `severity`.
    pub fn new(target: &'a LogTarget, severity: Severity) -> Self {
        Self {
            target,
            severity,
            buf: Vec::new(),
        }
    }

    fn submit_line(&self, line: &[u8]) -> io::Result<()> {
        let text = String::from_utf8_lossy(line);
        let text = text.trim_end_matches(['\r', '\n']);
        self.target
            .submit(Event::text(self.severity, text))
            .map_err(io::Error::other)
    }
}

impl Write for EventWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        while let Some(end) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=end).collect();
            self.submit_line(&line)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let line = std::mem::take(&mut self.buf);
        self.submit_line(&line)
    }
}

impl Drop for EventWriter<'_> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// A `tracing-subscriber` writer factory backed by a log target.
#[derive(Debug, Clone)]
pub struct TargetMakeWriter {
    target: Arc<LogTarget>,
}

impl TargetMakeWriter {
    /// Write into `target`.
    pub fn new(target: Arc<LogTarget>) -> Self {
        Self { target }
    }
}

impl<'a> MakeWriter<'a> for TargetMakeWriter {
    type Writer = EventWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        EventWriter::new(&self.target, Severity::Info)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        EventWriter::new(&self.target, severity_of(meta.level()))
    }
}

fn severity_of(level: &Level) -> Severity {
    match *level {
        Level::TRACE => Severity::Trace,
        Level::DEBUG => Severity::Debug,
        Level::INFO => Severity::Info,
        Level::WARN => Severity::Warning,
        Level::ERROR => Severity::Error,
    }
}
