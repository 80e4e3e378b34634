//! Rotation passes: find a target's log files, keep the most recent ones and
//! hand the rest to a destructive action.

use std::cmp::Ordering;
use std::ops::Range;
use std::path::Path;

use time::OffsetDateTime;
use tracing::{debug, trace};

use crate::arena::{Arena, ArenaRef};
use crate::error::{ErrorKind, ProcessorError};
use crate::event::{Event, Severity};
use crate::fsops::{self, Compression};
use crate::path::{COMPRESSED_EXTENSION, LogPath, SearchMask};
use crate::processor::{RotateAction, RotateLimit, RotateTask};

/// Bookkeeping shared by the rotate stages that run for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassInfo {
    /// Files dispatched so far in this pass.
    pub count: usize,
    /// Most recent files left untouched by the rotate stages so far.
    pub ignored_total: usize,
    /// Ignore count of the previous rotate stage, if any ran.
    pub previous_ignore: Option<usize>,
}

/// Pick the candidates a rotate stage acts on.
///
/// `total` candidates are ordered most recent first. The first
/// `ignore + pass.ignored_total` are skipped and recorded as ignored; the
/// returned range holds at most `limit` of the following ones.
pub fn select(
    total: usize,
    ignore: usize,
    limit: RotateLimit,
    pass: &mut PassInfo,
) -> Range<usize> {
    let skip = ignore.saturating_add(pass.ignored_total).min(total);
    let max = match limit {
        RotateLimit::Unbounded => usize::MAX,
        RotateLimit::AtMost(n) => n,
        RotateLimit::FromPrevious => pass.previous_ignore.unwrap_or(usize::MAX),
    };
    let end = skip.saturating_add(max).min(total);

    pass.ignored_total = skip;
    pass.previous_ignore = Some(ignore);
    pass.count += end - skip;
    skip..end
}

/// Order two candidate names most recent first.
///
/// Dated names sort descending byte-wise, ignoring a trailing NUL and the
/// compression extension. Numbered names sort by ascending suffix.
pub fn recency_order(mask: &SearchMask, numbered: bool, a: &str, b: &str) -> Ordering {
    if numbered {
        let na = mask.numeric_suffix(a).unwrap_or(u64::MAX);
        let nb = mask.numeric_suffix(b).unwrap_or(u64::MAX);
        return na.cmp(&nb).then_with(|| a.cmp(b));
    }
    sort_key(b).cmp(sort_key(a))
}

fn sort_key(name: &str) -> &[u8] {
    let name = name.strip_suffix('\0').unwrap_or(name);
    name.strip_suffix(COMPRESSED_EXTENSION)
        .unwrap_or(name)
        .as_bytes()
}

/// Runs rotation passes for one target. The candidate list lives in an
/// arena that is reset, not freed, between passes.
#[derive(Debug)]
pub struct RotationEngine {
    arena: Arena,
    candidates: Vec<ArenaRef>,
    pass: PassInfo,
    trash_dir: Option<std::path::PathBuf>,
}

impl RotationEngine {
    /// Create an engine. `trash_dir` overrides the XDG trash location.
    pub fn new(arena: Arena, trash_dir: Option<std::path::PathBuf>) -> Self {
        Self {
            arena,
            candidates: Vec::new(),
            pass: PassInfo::default(),
            trash_dir,
        }
    }

    /// Start a new pass; called once per event before its chain runs.
    pub fn begin_pass(&mut self) {
        self.pass = PassInfo::default();
    }

    /// Bookkeeping of the current pass.
    pub fn pass(&self) -> PassInfo {
        self.pass
    }

    /// Run one rotate stage. Progress and failures come back as internal
    /// events stamped with `ts`.
    pub fn rotate(
        &mut self,
        task: &RotateTask,
        path: &LogPath,
        ts: OffsetDateTime,
    ) -> Result<Vec<Event>, ProcessorError> {
        let numbered = path.postfix().is_numbered();
        self.collect(path.dir(), path.mask())?;

        let arena = &self.arena;
        let mask = path.mask();
        self.candidates.sort_by(|a, b| {
            recency_order(mask, numbered, as_name(arena, *a), as_name(arena, *b))
        });

        let range = select(self.candidates.len(), task.ignore, task.limit, &mut self.pass);
        debug!(
            mask = mask.as_str(),
            candidates = self.candidates.len(),
            skipped = range.start,
            selected = range.len(),
            action = ?task.action,
            "Rotation pass"
        );

        let mut notes = Vec::with_capacity(range.len());
        for slot in &self.candidates[range] {
            let name = as_name(&self.arena, *slot);
            let file = path.dir().join(name);
            notes.push(self.apply(task.action, &file, name, ts));
        }
        Ok(notes)
    }

    fn collect(&mut self, dir: &Path, mask: &SearchMask) -> Result<(), ProcessorError> {
        self.arena.reset();
        self.candidates.clear();

        let listing =
            fsops::list_dir(dir).map_err(|e| ProcessorError::from_io(ErrorKind::BasePath, &e))?;
        for entry in listing {
            let entry = entry.map_err(|e| ProcessorError::from_io(ErrorKind::BasePath, &e))?;
            if entry.is_dir || entry.name == "." || entry.name == ".." || !mask.matches(&entry.name)
            {
                continue;
            }
            let slot = self
                .arena
                .alloc_bytes(entry.name.as_bytes())
                .map_err(|_| ProcessorError::new(ErrorKind::Heap))?;
            trace!(name = %entry.name, "Rotation candidate");
            self.candidates.push(slot);
        }
        Ok(())
    }

    fn apply(&self, action: RotateAction, file: &Path, name: &str, ts: OffsetDateTime) -> Event {
        let (severity, message) = match action {
            RotateAction::Compress => match fsops::is_compressed(file) {
                Compression::Compressed => (
                    Severity::Debug,
                    format!("Rotation: {} is already compressed", name),
                ),
                Compression::Error => (
                    Severity::Warning,
                    format!("Rotation: cannot inspect {}", name),
                ),
                Compression::Uncompressed => outcome(fsops::compress(file), "compressed", name),
            },
            RotateAction::MoveToTrash => outcome(
                fsops::move_to_trash(file, self.trash_dir.as_deref()),
                "moved to trash",
                name,
            ),
            RotateAction::Delete => outcome(fsops::delete(file), "deleted", name),
        };
        Event::internal(severity, message, ts)
    }
}

fn outcome(ok: bool, verb: &str, name: &str) -> (Severity, String) {
    if ok {
        (Severity::Info, format!("Rotation: {} {}", verb, name))
    } else {
        (Severity::Warning, format!("Rotation: {} not {}", name, verb))
    }
}

fn as_name(arena: &Arena, slot: ArenaRef) -> &str {
    // Slots only ever hold names copied from `String`s.
    std::str::from_utf8(arena.get(slot)).unwrap_or_default()
}
