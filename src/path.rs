//! Log file naming: directory resolution, stamped file names and the
//! rotation search mask.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::frequency::Boundary;
use crate::{Error, Result};

/// Extension of every log file.
pub const LOG_EXTENSION: &str = ".log";
/// Extension appended by the compress action.
pub const COMPRESSED_EXTENSION: &str = ".gz";

/// Date/time or numeric suffix scheme of a log file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Postfix {
    /// `app.log`, never changes.
    None,
    /// `app_2024-01-01 13_45.log`
    Minute,
    /// `app_2024-01-01 13.log`
    Hour,
    /// `app_2024-01-01.log`
    #[default]
    Day,
    /// `app_2024-W01.log`
    Week,
    /// `app_2024-01.log`
    Month,
    /// `app_2024.log`
    Year,
    /// `app.log`, shifted to `app.log.1`, `app.log.2`, ... on each boundary.
    DotNumber(Boundary),
}

impl Postfix {
    /// Width of the stamp embedded in the file name.
    pub const fn stamp_len(self) -> usize {
        match self {
            Self::None | Self::DotNumber(_) => 0,
            Self::Minute => 16,
            Self::Hour => 13,
            Self::Day => 10,
            Self::Week => 8,
            Self::Month => 7,
            Self::Year => 4,
        }
    }

    /// Stamp for `ts`, empty for postfixes without one.
    pub fn stamp(self, ts: OffsetDateTime) -> String {
        let (y, m, d) = (ts.year(), u8::from(ts.month()), ts.day());
        match self {
            Self::None | Self::DotNumber(_) => String::new(),
            Self::Minute => format!(
                "{:04}-{:02}-{:02} {:02}_{:02}",
                y,
                m,
                d,
                ts.hour(),
                ts.minute()
            ),
            Self::Hour => format!("{:04}-{:02}-{:02} {:02}", y, m, d, ts.hour()),
            Self::Day => format!("{:04}-{:02}-{:02}", y, m, d),
            Self::Week => {
                let (iso_year, week, _) = ts.to_iso_week_date();
                format!("{:04}-W{:02}", iso_year, week)
            }
            Self::Month => format!("{:04}-{:02}", y, m),
            Self::Year => format!("{:04}", y),
        }
    }

    /// Boundary implied by the postfix; the default cadence of flush and
    /// rotate processors.
    pub const fn cadence(self) -> Boundary {
        match self {
            Self::None | Self::Day => Boundary::Day,
            Self::Minute => Boundary::Minute,
            Self::Hour => Boundary::Hour,
            Self::Week => Boundary::Week,
            Self::Month => Boundary::Month,
            Self::Year => Boundary::Year,
            Self::DotNumber(b) => b,
        }
    }

    /// Whether rotated files carry a numeric suffix.
    pub const fn is_numbered(self) -> bool {
        matches!(self, Self::DotNumber(_))
    }
}

/// What a relative log directory is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogBase {
    /// The directory must be given and absolute.
    Absolute,
    /// Directory of the running executable.
    Executable,
    /// Current working directory.
    #[default]
    CurrentDir,
    /// The user's home directory.
    Home,
}

/// Resolve the absolute log directory.
pub fn resolve_dir(base: LogBase, dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = dir {
        if dir.as_os_str().is_empty() {
            return Err(Error::BasePath("log directory is empty".to_string()));
        }
        if dir.is_absolute() {
            return Ok(dir.to_path_buf());
        }
    }

    let root = match base {
        LogBase::Absolute => {
            return Err(Error::BasePath(match dir {
                Some(d) => format!("{} is not absolute", d.display()),
                None => "no log directory given".to_string(),
            }));
        }
        LogBase::Executable => {
            let exe = std::env::current_exe()
                .map_err(|e| Error::BasePath(format!("executable path: {}", e)))?;
            exe.parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| Error::BasePath("executable has no parent".to_string()))?
        }
        LogBase::CurrentDir => std::env::current_dir()
            .map_err(|e| Error::BasePath(format!("current directory: {}", e)))?,
        LogBase::Home => dirs::home_dir()
            .ok_or_else(|| Error::BasePath("home directory unknown".to_string()))?,
    };

    Ok(match dir {
        Some(d) => root.join(d),
        None => root,
    })
}

/// Resolve the application name, deriving it from the executable when absent.
pub fn resolve_app_name(name: Option<&str>) -> Result<String> {
    let name = match name {
        Some(n) => n.to_string(),
        None => std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .ok_or_else(|| Error::AppName("cannot derive from executable".to_string()))?,
    };
    if name.is_empty() {
        return Err(Error::AppName("application name is empty".to_string()));
    }
    if name.contains(['/', '\\']) {
        return Err(Error::AppName(format!("{} contains a path separator", name)));
    }
    Ok(name)
}

/// Pattern selecting the files that belong to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMask {
    pattern: String,
    numbered: bool,
}

impl SearchMask {
    fn new(file_name: &str, stamp: std::ops::Range<usize>, numbered: bool) -> Self {
        let pattern = if numbered {
            format!("{}*", file_name)
        } else {
            // Only the digits vary; separators and the week marker stay literal.
            file_name
                .char_indices()
                .map(|(i, c)| {
                    if stamp.contains(&i) && c.is_ascii_digit() {
                        '?'
                    } else {
                        c
                    }
                })
                .collect()
        };
        Self { pattern, numbered }
    }

    /// Wildcard form: `?` for one stamp digit, trailing `*` for a numeric suffix.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Whether `name` (optionally compressed) belongs to the target.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.strip_suffix(COMPRESSED_EXTENSION).unwrap_or(name);
        if self.numbered {
            return self.numeric_suffix(name).is_some();
        }
        name.len() == self.pattern.len()
            && self
                .pattern
                .bytes()
                .zip(name.bytes())
                .all(|(p, n)| if p == b'?' { n.is_ascii_digit() } else { p == n })
    }

    /// Numeric suffix of a numbered file: 0 for the active file, N for `.N`.
    pub fn numeric_suffix(&self, name: &str) -> Option<u64> {
        let name = name.strip_suffix(COMPRESSED_EXTENSION).unwrap_or(name);
        let base = self.pattern.strip_suffix('*')?;
        let rest = name.strip_prefix(base)?;
        if rest.is_empty() {
            return Some(0);
        }
        let digits = rest.strip_prefix('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

/// Absolute path of the active log file with its stamp at a known offset.
#[derive(Debug, Clone)]
pub struct LogPath {
    dir: PathBuf,
    full: String,
    name_offset: usize,
    stamp_offset: usize,
    stamp_len: usize,
    postfix: Postfix,
    mask: SearchMask,
}

impl LogPath {
    /// Build the path for `app` in `dir`, stamped with `ts`.
    pub fn new(dir: PathBuf, app: &str, postfix: Postfix, ts: OffsetDateTime) -> Result<Self> {
        let stamp = postfix.stamp(ts);
        let file_name = if stamp.is_empty() {
            format!("{}{}", app, LOG_EXTENSION)
        } else {
            format!("{}_{}{}", app, stamp, LOG_EXTENSION)
        };
        let stamp_in_name = app.len() + 1..app.len() + 1 + stamp.len();

        let full = dir
            .join(&file_name)
            .to_str()
            .map(str::to_string)
            .ok_or_else(|| Error::BasePath(format!("{} is not UTF-8", dir.display())))?;
        let name_offset = full.len() - file_name.len();

        Ok(Self {
            mask: SearchMask::new(&file_name, stamp_in_name.clone(), postfix.is_numbered()),
            dir,
            name_offset,
            stamp_offset: name_offset + stamp_in_name.start,
            stamp_len: stamp.len(),
            full,
            postfix,
        })
    }

    /// The full path.
    pub fn path(&self) -> &Path {
        Path::new(&self.full)
    }

    /// The full path as a string.
    pub fn as_str(&self) -> &str {
        &self.full
    }

    /// The log directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of the active log file.
    pub fn file_name(&self) -> &str {
        &self.full[self.name_offset..]
    }

    /// Byte offset of the stamp in [`as_str`](Self::as_str).
    pub fn stamp_offset(&self) -> usize {
        self.stamp_offset
    }

    /// Current stamp, empty without a dated postfix.
    pub fn stamp(&self) -> &str {
        &self.full[self.stamp_offset..self.stamp_offset + self.stamp_len]
    }

    /// Postfix the path was built with.
    pub fn postfix(&self) -> Postfix {
        self.postfix
    }

    /// Rotation search mask.
    pub fn mask(&self) -> &SearchMask {
        &self.mask
    }

    /// Overwrite the stamp in place for `ts`. Returns whether it changed.
    pub fn update_stamp(&mut self, ts: OffsetDateTime) -> bool {
        if self.stamp_len == 0 {
            return false;
        }
        let stamp = self.postfix.stamp(ts);
        debug_assert_eq!(stamp.len(), self.stamp_len);
        if stamp == self.stamp() || stamp.len() != self.stamp_len {
            return false;
        }
        let range = self.stamp_offset..self.stamp_offset + self.stamp_len;
        self.full.replace_range(range, &stamp);
        true
    }
}
