//! The processor chain runner and the I/O state its stages share.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::sync::Arc;

use colored::Colorize;
use tracing::{debug, trace, warn};

use crate::error::{ErrorKind, ProcessorError};
use crate::event::{Command, Event, EventKind};
use crate::path::{COMPRESSED_EXTENSION, LogPath, Postfix};
use crate::processor::{Processor, Task};
use crate::rotation::RotationEngine;
use crate::target::{ErrorAction, ErrorCallback};
use crate::timestamp::TimestampFormat;

/// Target-level switches that commands can change at run time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetOptions {
    /// Suppress the echo stage.
    pub no_echo: bool,
    /// Suppress the write stage.
    pub no_file_write: bool,
    /// Colour echoed lines by severity.
    pub colour_echo: bool,
}

/// Stop request raised from inside a chain through the error callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopRequest {
    /// Drain what is queued, then stop.
    Shutdown,
    /// Discard what is queued, then stop.
    Cancel,
}

struct OpenFile {
    file: File,
    stamp: String,
}

/// Everything the stages touch besides the processor list.
pub(crate) struct Output {
    path: LogPath,
    file: Option<OpenFile>,
    echo: Box<dyn Write + Send>,
    options: TargetOptions,
    line_format: TimestampFormat,
    rotation: RotationEngine,
    numbered_key: Option<i64>,
    internal_echo: bool,
    internal_write: bool,
}

impl Output {
    pub(crate) fn new(
        path: LogPath,
        echo: Box<dyn Write + Send>,
        options: TargetOptions,
        line_format: TimestampFormat,
        rotation: RotationEngine,
    ) -> Self {
        Self {
            path,
            file: None,
            echo,
            options,
            line_format,
            rotation,
            numbered_key: None,
            internal_echo: false,
            internal_write: false,
        }
    }

    fn execute(
        &mut self,
        processor: &Processor,
        event: &Event,
    ) -> Result<(bool, Vec<Event>), ProcessorError> {
        let cont = match processor.task() {
            Task::Noop => true,
            Task::Echo => self.echo(event)?,
            Task::UpdateFilename => self.update_filename(event)?,
            Task::Write => self.write(event)?,
            Task::Flush => self.flush()?,
            Task::Rotate(task) => {
                let notes = self.rotation.rotate(task, &self.path, event.timestamp())?;
                return Ok((true, notes));
            }
            Task::Custom(f) => f(processor, event),
            Task::Redirect(target) => {
                forward(target, event);
                false
            }
            Task::Fork(target) => {
                forward(target, event);
                true
            }
        };
        Ok((cont, Vec::new()))
    }

    fn echo(&mut self, event: &Event) -> Result<bool, ProcessorError> {
        if self.options.no_echo || event.is_no_echo() {
            return Ok(true);
        }
        let text = event.render(self.line_format);
        if text.is_empty() {
            return Ok(true);
        }
        let result = match event.severity().color() {
            Some(color) if self.options.colour_echo => {
                writeln!(self.echo, "{}", text.trim_end_matches('\n').color(color))
            }
            _ => self.echo.write_all(text.as_bytes()),
        };
        result
            .and_then(|_| self.echo.flush())
            .map_err(|e| ProcessorError::from_io(ErrorKind::Write, &e))?;
        Ok(true)
    }

    fn update_filename(&mut self, event: &Event) -> Result<bool, ProcessorError> {
        match self.path.postfix() {
            Postfix::DotNumber(boundary) => {
                let key = boundary.key(event.timestamp());
                if let Some(previous) = self.numbered_key.replace(key)
                    && previous != key
                {
                    self.shift_numbered()?;
                }
            }
            _ => {
                if self.path.update_stamp(event.timestamp()) {
                    trace!(path = self.path.as_str(), "Log file stamp changed");
                }
            }
        }
        Ok(true)
    }

    /// Rename `name.N[.gz]` to `name.N+1[.gz]`, highest first, then the
    /// active file to `name.1`.
    fn shift_numbered(&mut self) -> Result<(), ProcessorError> {
        self.file = None;
        let dir = self.path.dir().to_path_buf();
        let base = self.path.file_name().to_string();
        let mask = self.path.mask().clone();

        let mut numbered: Vec<(u64, String)> = match fs::read_dir(&dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter_map(|name| mask.numeric_suffix(&name).map(|n| (n, name)))
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(ProcessorError::from_io(ErrorKind::Rename, &e)),
        };
        numbered.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        let mut first_error = None;
        for (n, name) in numbered {
            let ext = if name.ends_with(COMPRESSED_EXTENSION) {
                COMPRESSED_EXTENSION
            } else {
                ""
            };
            let to = format!("{}.{}{}", base, n + 1, ext);
            if let Err(e) = fs::rename(dir.join(&name), dir.join(&to)) {
                warn!(from = %name, to = %to, error = %e, "Renaming numbered log file failed");
                first_error.get_or_insert(ProcessorError::from_io(ErrorKind::Rename, &e));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn write(&mut self, event: &Event) -> Result<bool, ProcessorError> {
        if self.options.no_file_write {
            return Ok(true);
        }
        let text = event.render(self.line_format);
        if text.is_empty() {
            return Ok(true);
        }
        let open = self.open_file()?;
        open.file
            .write_all(text.as_bytes())
            .map_err(|e| ProcessorError::from_io(ErrorKind::Write, &e))?;
        Ok(true)
    }

    /// The open log file, reopened when the path's stamp has moved on.
    fn open_file(&mut self) -> Result<&mut OpenFile, ProcessorError> {
        if self
            .file
            .as_ref()
            .is_some_and(|f| f.stamp != self.path.stamp())
        {
            self.file = None;
        }
        if self.file.is_none() {
            fs::create_dir_all(self.path.dir())
                .map_err(|e| ProcessorError::from_io(ErrorKind::BasePath, &e))?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path.path())
                .map_err(|e| ProcessorError::from_io(ErrorKind::FileOpen, &e))?;
            debug!(path = self.path.as_str(), "Opened log file");
            self.file = Some(OpenFile {
                file,
                stamp: self.path.stamp().to_string(),
            });
        }
        self.file
            .as_mut()
            .ok_or(ProcessorError::new(ErrorKind::FileOpen))
    }

    fn flush(&mut self) -> Result<bool, ProcessorError> {
        if let Some(open) = &self.file {
            open.file
                .sync_all()
                .map_err(|e| ProcessorError::from_io(ErrorKind::Flush, &e))?;
        }
        Ok(true)
    }

    /// Echo and write an engine-generated event, with no trigger accounting.
    fn emit_internal(&mut self, event: &Event) {
        if self.internal_echo && let Err(e) = self.echo(event) {
            trace!(error = %e, "Echo of internal event failed");
        }
        if self.internal_write && let Err(e) = self.write(event) {
            trace!(error = %e, "Write of internal event failed");
        }
    }

    pub(crate) fn path(&self) -> &LogPath {
        &self.path
    }

    pub(crate) fn close(&mut self) {
        if let Some(open) = self.file.take() {
            let _ = open.file.sync_all();
        }
    }
}

fn forward(target: &Arc<crate::target::LogTarget>, event: &Event) {
    let mut copy = event.clone();
    copy.reset_stop();
    if let Err(e) = target.submit(copy) {
        debug!(target_name = target.name(), error = %e, "Forwarding event failed");
    }
}

/// A target's processors plus the state they run against.
pub(crate) struct Pipeline {
    processors: Vec<Processor>,
    out: Output,
    error_callback: Option<ErrorCallback>,
    run_all_pending: bool,
    first_event: bool,
}

impl Pipeline {
    pub(crate) fn new(
        processors: Vec<Processor>,
        out: Output,
        error_callback: Option<ErrorCallback>,
        run_all_on_startup: bool,
    ) -> Self {
        let mut pipeline = Self {
            processors,
            out,
            error_callback,
            run_all_pending: run_all_on_startup,
            first_event: true,
        };
        pipeline.refresh_internal_sinks();
        pipeline
    }

    fn refresh_internal_sinks(&mut self) {
        let enabled = |want: fn(&Task) -> bool| {
            self.processors
                .iter()
                .any(|p| !p.is_disabled() && want(p.task()))
        };
        let echo = enabled(|t| matches!(t, Task::Echo));
        let write = enabled(|t| matches!(t, Task::Write));
        self.out.internal_echo = echo;
        self.out.internal_write = write;
    }

    pub(crate) fn processors(&self) -> &[Processor] {
        &self.processors
    }

    pub(crate) fn out(&self) -> &Output {
        &self.out
    }

    pub(crate) fn close(&mut self) {
        self.out.close();
    }

    /// Run the chain for one event.
    pub(crate) fn run(&mut self, event: &mut Event) -> Option<StopRequest> {
        if let EventKind::Command(command) = event.kind() {
            self.apply(command.clone());
            return None;
        }
        if event.is_internal() {
            self.out.emit_internal(event);
            return None;
        }

        let startup = std::mem::take(&mut self.run_all_pending);
        let first = std::mem::take(&mut self.first_event);
        self.out.rotation.begin_pass();
        let mut request = None;

        for index in 0..self.processors.len() {
            let processor = &mut self.processors[index];
            if processor.is_disabled() {
                continue;
            }
            let is_echo = matches!(processor.task(), Task::Echo);
            if event.is_echo_only() && !is_echo {
                continue;
            }

            let fired = processor.observe(event);
            let run = fired
                || startup
                || (first && processor.run_on_startup())
                || (is_echo && event.is_echo_only());

            let processor = &self.processors[index];
            let mut cont = false;
            if run {
                match self.out.execute(processor, event) {
                    Ok((c, notes)) => {
                        cont = c;
                        for note in &notes {
                            self.out.emit_internal(note);
                        }
                    }
                    Err(err) => {
                        let action = match &self.error_callback {
                            Some(callback) => callback(&err, processor, event),
                            None => ErrorAction::ContinueNext,
                        };
                        debug!(
                            task = processor.task().name(),
                            error = %err,
                            ?action,
                            "Processor failed"
                        );
                        match action {
                            ErrorAction::ContinueNext => cont = true,
                            ErrorAction::StopEvent => event.stop(),
                            ErrorAction::Shutdown => {
                                request = Some(StopRequest::Shutdown);
                                cont = true;
                            }
                            ErrorAction::Cancel => {
                                request = Some(StopRequest::Cancel);
                                event.stop();
                            }
                        }
                    }
                }
            }

            if event.is_stopped() {
                break;
            }
            if processor.force_next() || startup {
                continue;
            }
            if !cont {
                break;
            }
        }
        request
    }

    fn apply(&mut self, command: Command) {
        debug!(?command, "Applying command");
        let options = &mut self.out.options;
        match command {
            Command::UseColour(on) => options.colour_echo = on,
            Command::NoEcho(on) => options.no_echo = on,
            Command::NoFileWrite(on) => options.no_file_write = on,
            Command::SetProcessorDisabled { index, disabled } => {
                match self.processors.get_mut(index) {
                    Some(p) => p.set_disabled(disabled),
                    None => warn!(index, "No processor at index"),
                }
                self.refresh_internal_sinks();
            }
            Command::RunAllProcessors => self.run_all_pending = true,
        }
    }
}
