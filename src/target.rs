//! Log targets: lifecycle, dispatch by concurrency mode, and the worker.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, JoinHandle, ThreadId};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::builder::TargetBuilder;
use crate::config::TargetConfig;
use crate::error::ProcessorError;
use crate::event::{Command, Event, Severity};
use crate::pipeline::{Pipeline, StopRequest};
use crate::processor::Processor;
use crate::queue::{Queue, QueueItem, Semaphore, lock};
use crate::{Error, Result};

/// Called when a processor fails; decides what happens next.
pub type ErrorCallback =
    Arc<dyn Fn(&ProcessorError, &Processor, &Event) -> ErrorAction + Send + Sync>;

/// Outcome chosen by an [`ErrorCallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Carry on with the next processor.
    ContinueNext,
    /// Skip the remaining processors for this event.
    StopEvent,
    /// Finish the queued events, then shut the target down.
    Shutdown,
    /// Drop the queued events and shut the target down.
    Cancel,
}

/// How events get from the submitter to the processor chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// The submitter runs the chain; a single thread submits.
    SingleThreaded,
    /// One worker thread runs the chain; a single thread submits.
    SingleThreadedSeparateThread,
    /// The submitter runs the chain under the target lock.
    #[default]
    MultiThreaded,
    /// One worker thread runs the chain; any thread submits.
    MultiThreadedSeparateThread,
    /// Several processes sharing log files. Not supported yet.
    MultiProcess,
}

impl ConcurrencyMode {
    /// Whether events go through a queue and a worker thread.
    pub const fn is_queued(self) -> bool {
        matches!(
            self,
            Self::SingleThreadedSeparateThread | Self::MultiThreadedSeparateThread
        )
    }

    /// Whether several threads may submit at once.
    pub const fn is_multi_threaded(self) -> bool {
        matches!(
            self,
            Self::MultiThreaded | Self::MultiThreadedSeparateThread | Self::MultiProcess
        )
    }
}

/// Lifecycle of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetState {
    /// Configured; the worker is not running yet.
    Initialized,
    /// Accepting and processing events.
    Running,
    /// Accepting events but not waking the worker.
    Paused,
    /// Draining; new events are rejected.
    ShuttingDown,
    /// Stopped.
    ShutDown,
}

/// Counters describing what a target has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetStats {
    /// Events accepted by `submit`.
    pub submitted: u64,
    /// Events that ran through the chain.
    pub processed: u64,
    /// Times the worker was signalled.
    pub signals: u64,
    /// Events dropped by a cancel.
    pub discarded: u64,
    /// Items waiting in the queue.
    pub queued: usize,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    processed: AtomicU64,
    signals: AtomicU64,
    discarded: AtomicU64,
}

struct Control {
    state: TargetState,
    queue: Queue,
    paused_events: usize,
}

struct Shared {
    name: String,
    mode: ConcurrencyMode,
    control: Mutex<Control>,
    /// Notified once `control.state` reaches `ShutDown`.
    stopped: Condvar,
    pipeline: Mutex<Pipeline>,
    semaphore: Semaphore,
    cancelled: AtomicBool,
    counters: Counters,
}

impl Shared {
    fn lock_pipeline(&self) -> MutexGuard<'_, Pipeline> {
        if !self.mode.is_multi_threaded() && !self.mode.is_queued() {
            match self.pipeline.try_lock() {
                Ok(guard) => return guard,
                Err(TryLockError::Poisoned(p)) => return p.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    debug_assert!(
                        false,
                        "single-threaded target {} used from several threads",
                        self.name
                    );
                }
            }
        }
        self.pipeline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.semaphore.release(n);
        self.counters.signals.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn enqueue(&self, event: Event) -> Result<()> {
        let signal = {
            let mut control = lock(&self.control);
            match control.state {
                TargetState::ShuttingDown | TargetState::ShutDown => return Err(Error::ShutDown),
                TargetState::Paused => {
                    control.queue.push(QueueItem::Event(event));
                    control.paused_events += 1;
                    false
                }
                TargetState::Initialized | TargetState::Running => {
                    control.queue.push(QueueItem::Event(event));
                    true
                }
            }
        };
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        if signal {
            self.signal(1);
        }
        Ok(())
    }

    /// Queue the shutdown marker (once) and, for a cancel, drop what is queued.
    fn request_stop(&self, request: StopRequest) {
        let mut control = lock(&self.control);
        if request == StopRequest::Cancel {
            self.cancelled.store(true, Ordering::SeqCst);
            let dropped = control.queue.discard_events();
            self.counters
                .discarded
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
        if control.state < TargetState::ShuttingDown {
            control.state = TargetState::ShuttingDown;
            control.paused_events = 0;
            control.queue.push(QueueItem::Shutdown);
            drop(control);
            self.signal(1);
        }
    }

    fn run_inline(&self, mut event: Event) -> Result<()> {
        if lock(&self.control).state >= TargetState::ShuttingDown {
            return Err(Error::ShutDown);
        }
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let request = self.lock_pipeline().run(&mut event);
        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        if request.is_some() {
            self.stop_inline();
        }
        Ok(())
    }

    fn stop_inline(&self) {
        self.mark_stopped();
        self.lock_pipeline().close();
    }

    fn mark_stopped(&self) {
        lock(&self.control).state = TargetState::ShutDown;
        self.stopped.notify_all();
    }

    fn wait_stopped(&self) {
        let control = lock(&self.control);
        let _control = self
            .stopped
            .wait_while(control, |c| c.state != TargetState::ShutDown)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

fn worker_loop(shared: Arc<Shared>) {
    trace!(target_name = %shared.name, "Worker started");
    loop {
        shared.semaphore.acquire();
        let batch = lock(&shared.control).queue.drain_all();
        if batch.is_empty() {
            continue;
        }

        let mut pipeline = shared.lock_pipeline();
        for item in batch {
            match item {
                QueueItem::Shutdown => {
                    pipeline.close();
                    drop(pipeline);
                    shared.mark_stopped();
                    trace!(target_name = %shared.name, "Worker finished");
                    return;
                }
                QueueItem::Event(mut event) => {
                    if shared.cancelled.load(Ordering::SeqCst) {
                        shared.counters.discarded.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    let request = pipeline.run(&mut event);
                    shared.counters.processed.fetch_add(1, Ordering::Relaxed);
                    if let Some(request) = request {
                        shared.request_stop(request);
                    }
                }
            }
        }
    }
}

/// A log destination: configuration, processor chain, and optionally a
/// queue drained by a dedicated worker thread.
pub struct LogTarget {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: Option<ThreadId>,
}

impl LogTarget {
    /// Build a target from a configuration.
    pub fn new(config: TargetConfig) -> Result<Self> {
        TargetBuilder::from_config(config).build()
    }

    /// Start a fluent configuration.
    pub fn builder() -> TargetBuilder {
        TargetBuilder::new()
    }

    pub(crate) fn start(name: String, mode: ConcurrencyMode, pipeline: Pipeline) -> Result<Self> {
        if mode == ConcurrencyMode::MultiProcess {
            return Err(Error::Unsupported("multi-process concurrency"));
        }

        let shared = Arc::new(Shared {
            name,
            mode,
            control: Mutex::new(Control {
                state: TargetState::Initialized,
                queue: Queue::default(),
                paused_events: 0,
            }),
            stopped: Condvar::new(),
            pipeline: Mutex::new(pipeline),
            semaphore: Semaphore::new(),
            cancelled: AtomicBool::new(false),
            counters: Counters::default(),
        });

        let worker = if mode.is_queued() {
            let worker_shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("rotalog-{}", shared.name))
                .spawn(move || worker_loop(worker_shared))
                .map_err(Error::ThreadCreate)?;
            Some(handle)
        } else {
            None
        };

        lock(&shared.control).state = TargetState::Running;
        debug!(target_name = %shared.name, ?mode, "Log target started");

        let worker_id = worker.as_ref().map(|h| h.thread().id());
        Ok(Self {
            shared,
            worker: Mutex::new(worker),
            worker_id,
        })
    }

    /// The application name the target logs for.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The concurrency mode.
    pub fn mode(&self) -> ConcurrencyMode {
        self.shared.mode
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TargetState {
        lock(&self.shared.control).state
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> TargetStats {
        let counters = &self.shared.counters;
        TargetStats {
            submitted: counters.submitted.load(Ordering::Relaxed),
            processed: counters.processed.load(Ordering::Relaxed),
            signals: counters.signals.load(Ordering::Relaxed),
            discarded: counters.discarded.load(Ordering::Relaxed),
            queued: lock(&self.shared.control).queue.len(),
        }
    }

    /// Absolute path of the active log file.
    pub fn log_path(&self) -> String {
        self.shared.lock_pipeline().out().path().as_str().to_string()
    }

    /// Wildcard mask selecting this target's log files.
    pub fn search_mask(&self) -> String {
        self.shared
            .lock_pipeline()
            .out()
            .path()
            .mask()
            .as_str()
            .to_string()
    }

    /// Inspect the processor list.
    pub fn with_processors<R>(&self, f: impl FnOnce(&[Processor]) -> R) -> R {
        f(self.shared.lock_pipeline().processors())
    }

    /// Submit an event. Synchronous modes run the chain before returning;
    /// queued modes hand the event to the worker.
    pub fn submit(&self, event: Event) -> Result<()> {
        match self.shared.mode {
            ConcurrencyMode::SingleThreaded | ConcurrencyMode::MultiThreaded => {
                self.shared.run_inline(event)
            }
            ConcurrencyMode::SingleThreadedSeparateThread
            | ConcurrencyMode::MultiThreadedSeparateThread => self.shared.enqueue(event),
            ConcurrencyMode::MultiProcess => Err(Error::Unsupported("multi-process concurrency")),
        }
    }

    /// Submit a text event stamped now.
    pub fn log(&self, severity: Severity, message: impl Into<String>) -> Result<()> {
        self.submit(Event::text(severity, message))
    }

    /// Submit a captioned binary event stamped now.
    pub fn log_binary(
        &self,
        severity: Severity,
        caption: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Result<()> {
        self.submit(Event::binary(severity, caption, data))
    }

    /// Submit a command; it takes effect in queue order.
    pub fn command(&self, command: Command) -> Result<()> {
        self.submit(Event::command(command))
    }

    /// Keep accepting events but stop waking the worker.
    pub fn pause(&self) -> Result<()> {
        if !self.shared.mode.is_queued() {
            return Err(Error::NotQueued);
        }
        let mut control = lock(&self.shared.control);
        match control.state {
            TargetState::ShuttingDown | TargetState::ShutDown => Err(Error::ShutDown),
            _ => {
                control.state = TargetState::Paused;
                Ok(())
            }
        }
    }

    /// Wake the worker once for every event submitted while paused.
    pub fn resume(&self) -> Result<()> {
        if !self.shared.mode.is_queued() {
            return Err(Error::NotQueued);
        }
        let owed = {
            let mut control = lock(&self.shared.control);
            if control.state != TargetState::Paused {
                return Ok(());
            }
            control.state = TargetState::Running;
            std::mem::take(&mut control.paused_events)
        };
        trace!(target_name = %self.shared.name, owed, "Resuming");
        self.shared.signal(owed);
        Ok(())
    }

    /// Process everything already queued, then stop. Blocks until the
    /// worker has exited.
    pub fn shutdown(&self) -> Result<()> {
        self.stop(StopRequest::Shutdown)
    }

    /// Drop everything queued, then stop. Blocks until the worker has exited.
    pub fn cancel(&self) -> Result<()> {
        self.stop(StopRequest::Cancel)
    }

    fn stop(&self, request: StopRequest) -> Result<()> {
        if !self.shared.mode.is_queued() {
            self.shared.stop_inline();
            return Ok(());
        }

        self.shared.request_stop(request);
        if self.worker_id == Some(thread::current().id()) {
            // Called from this target's own chain; the worker exits on its
            // own once it reaches the shutdown marker.
            return Ok(());
        }

        // One caller joins; any other waits for the worker to report.
        let handle = lock(&self.worker).take();
        match handle {
            Some(handle) => {
                if handle.join().is_err() {
                    self.shared.mark_stopped();
                    return Err(Error::WorkerPanicked(self.shared.name.clone()));
                }
            }
            None => self.shared.wait_stopped(),
        }
        debug!(target_name = %self.shared.name, ?request, "Log target stopped");
        Ok(())
    }
}

impl fmt::Debug for LogTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogTarget")
            .field("name", &self.shared.name)
            .field("mode", &self.shared.mode)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for LogTarget {
    fn drop(&mut self) {
        if self.state() != TargetState::ShutDown {
            warn!(target_name = %self.shared.name, "Log target dropped without shutdown");
            let _ = self.shutdown();
        }
    }
}
