//! Pipeline stages and their trigger state.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::frequency::{Frequency, TriggerState};
use crate::path::Postfix;
use crate::target::LogTarget;

/// Caller-supplied stage. Returns whether the chain continues.
pub type CustomFn = Arc<dyn Fn(&Processor, &Event) -> bool + Send + Sync>;

/// Destructive action applied to rotated files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotateAction {
    /// Gzip the file (skipped when already compressed).
    Compress,
    /// Move the file to the trash.
    MoveToTrash,
    /// Delete the file.
    Delete,
}

/// Upper bound on files a rotate stage acts on in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotateLimit {
    /// No bound.
    Unbounded,
    /// At most this many files.
    AtMost(usize),
    /// The ignore count of the previous rotate stage in the same pass, or
    /// no bound when this is the first rotate stage.
    #[default]
    FromPrevious,
}

/// Parameters of a rotate stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotateTask {
    /// What to do with each selected file.
    pub action: RotateAction,
    /// Most recent files left untouched.
    #[serde(default)]
    pub ignore: usize,
    /// How many files to act on.
    #[serde(default)]
    pub limit: RotateLimit,
}

impl RotateTask {
    /// A rotate task with the default limit.
    pub fn new(action: RotateAction, ignore: usize) -> Self {
        Self {
            action,
            ignore,
            limit: RotateLimit::default(),
        }
    }

    /// Replace the limit.
    pub fn with_limit(mut self, limit: RotateLimit) -> Self {
        self.limit = limit;
        self
    }
}

/// What a processor does.
#[derive(Clone)]
pub enum Task {
    /// Nothing.
    Noop,
    /// Print the rendered event to the echo writer.
    Echo,
    /// Move the file name stamp forward, or shift numbered files.
    UpdateFilename,
    /// Append the rendered event to the log file.
    Write,
    /// Sync the log file to disk.
    Flush,
    /// Run a rotation pass.
    Rotate(RotateTask),
    /// Call a user function.
    Custom(CustomFn),
    /// Forward the event to another target and stop this chain.
    ///
    /// The destination is built before the target holding this task and
    /// chains are fixed once built, so forwarding never loops back.
    Redirect(Arc<LogTarget>),
    /// Forward a copy of the event to another target and continue.
    Fork(Arc<LogTarget>),
}

impl Task {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Echo => "echo",
            Self::UpdateFilename => "update_filename",
            Self::Write => "write",
            Self::Flush => "flush",
            Self::Rotate(_) => "rotate",
            Self::Custom(_) => "custom",
            Self::Redirect(_) => "redirect",
            Self::Fork(_) => "fork",
        }
    }

    /// Frequency that [`Frequency::Auto`] resolves to for this task.
    pub fn auto_frequency(&self, postfix: Postfix) -> Frequency {
        match self {
            Self::Flush | Self::Rotate(_) => Frequency::Boundary(postfix.cadence()),
            Self::Noop
            | Self::Echo
            | Self::UpdateFilename
            | Self::Write
            | Self::Custom(_)
            | Self::Redirect(_)
            | Self::Fork(_) => Frequency::Always,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotate(task) => f.debug_tuple("Rotate").field(task).finish(),
            Self::Redirect(target) | Self::Fork(target) => f
                .debug_tuple(if matches!(self, Self::Redirect(_)) {
                    "Redirect"
                } else {
                    "Fork"
                })
                .field(&target.name())
                .finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// One stage of a target's pipeline.
#[derive(Debug, Clone)]
pub struct Processor {
    task: Task,
    frequency: Frequency,
    trigger: TriggerState,
    force_next: bool,
    disabled: bool,
    run_on_startup: bool,
}

impl Processor {
    /// A processor with [`Frequency::Auto`] and no flags.
    pub fn new(task: Task) -> Self {
        Self {
            task,
            frequency: Frequency::Auto,
            trigger: TriggerState::default(),
            force_next: false,
            disabled: false,
            run_on_startup: false,
        }
    }

    /// A custom stage calling `f`.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Processor, &Event) -> bool + Send + Sync + 'static,
    {
        Self::new(Task::Custom(Arc::new(f)))
    }

    /// Set the frequency.
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    /// Always continue to the next processor, whatever this one does.
    pub fn with_force_next(mut self, force_next: bool) -> Self {
        self.force_next = force_next;
        self
    }

    /// Skip this processor.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Run unconditionally for the target's first event.
    pub fn with_run_on_startup(mut self, run_on_startup: bool) -> Self {
        self.run_on_startup = run_on_startup;
        self
    }

    /// The task.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// The frequency (resolved once the processor belongs to a target).
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Count threshold of counting frequencies, 0 otherwise.
    pub fn threshold(&self) -> u64 {
        match self.frequency {
            Frequency::EveryEvents(n) | Frequency::EveryOctets(n) => n,
            _ => 0,
        }
    }

    /// Events or octets counted since the last fire.
    pub fn current(&self) -> u64 {
        self.trigger.current
    }

    /// Whether the chain always continues past this processor.
    pub fn force_next(&self) -> bool {
        self.force_next
    }

    /// Whether the processor is skipped.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Whether the processor runs unconditionally for the first event.
    pub fn run_on_startup(&self) -> bool {
        self.run_on_startup
    }

    pub(crate) fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub(crate) fn resolve_auto(&mut self, postfix: Postfix) {
        if self.frequency == Frequency::Auto {
            self.frequency = self.task.auto_frequency(postfix);
        }
    }

    /// Account for `event` and report whether the trigger fires.
    pub(crate) fn observe(&mut self, event: &Event) -> bool {
        self.trigger
            .observe(self.frequency, event.timestamp(), event.octets())
    }
}

/// The processors used when a target is built without an explicit list.
///
/// Echo, stamp update and write run for every event. Flush and two rotate
/// stages run for the first event and then on the postfix boundary: files
/// beyond the 2 most recent are compressed, and files beyond the 30 after
/// those are moved to the trash.
pub fn default_processors() -> Vec<Processor> {
    vec![
        Processor::new(Task::Echo).with_frequency(Frequency::Always),
        Processor::new(Task::UpdateFilename).with_frequency(Frequency::Always),
        Processor::new(Task::Write).with_frequency(Frequency::Always),
        Processor::new(Task::Flush)
            .with_force_next(true)
            .with_run_on_startup(true),
        Processor::new(Task::Rotate(
            RotateTask::new(RotateAction::Compress, 2).with_limit(RotateLimit::Unbounded),
        ))
        .with_force_next(true)
        .with_run_on_startup(true),
        Processor::new(Task::Rotate(RotateTask::new(RotateAction::MoveToTrash, 30)))
            .with_run_on_startup(true),
    ]
}
