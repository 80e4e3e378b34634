//! File system collaborators of the rotation engine: directory listing and
//! the destructive actions.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression as Level;
use flate2::write::GzEncoder;
use tracing::{debug, warn};

use crate::path::COMPRESSED_EXTENSION;
use crate::timestamp;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One entry produced by [`list_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    /// File name without the directory.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Lazy listing of a directory.
#[derive(Debug)]
pub enum DirListing {
    /// The directory does not exist; nothing can match.
    NoMatches,
    /// Entries as the OS returns them.
    Entries(fs::ReadDir),
}

impl Iterator for DirListing {
    type Item = io::Result<DirEntryInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::NoMatches => None,
            Self::Entries(read_dir) => loop {
                let entry = match read_dir.next()? {
                    Ok(e) => e,
                    Err(e) => return Some(Err(e)),
                };
                // Names that are not UTF-8 never match a mask.
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                return Some(Ok(DirEntryInfo { name, is_dir }));
            },
        }
    }
}

/// List `dir`. A missing directory yields [`DirListing::NoMatches`]; any
/// other failure is an error.
pub fn list_dir(dir: &Path) -> io::Result<DirListing> {
    match fs::read_dir(dir) {
        Ok(rd) => Ok(DirListing::Entries(rd)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DirListing::NoMatches),
        Err(e) => Err(e),
    }
}

/// Result of [`is_compressed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Already compressed.
    Compressed,
    /// Plain file.
    Uncompressed,
    /// The file could not be inspected.
    Error,
}

/// Whether `path` is already compressed: by extension, else by gzip magic.
pub fn is_compressed(path: &Path) -> Compression {
    if path
        .to_str()
        .is_some_and(|p| p.ends_with(COMPRESSED_EXTENSION))
    {
        return Compression::Compressed;
    }
    let mut magic = [0u8; 2];
    match File::open(path).and_then(|mut f| f.read(&mut magic)) {
        Ok(2) if magic == GZIP_MAGIC => Compression::Compressed,
        Ok(_) => Compression::Uncompressed,
        Err(_) => Compression::Error,
    }
}

/// Gzip `path` into `<path>.gz` and remove the original.
pub fn compress(path: &Path) -> bool {
    match try_compress(path) {
        Ok(target) => {
            debug!(from = %path.display(), to = %target.display(), "Compressed log file");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Compression failed");
            false
        }
    }
}

fn try_compress(path: &Path) -> io::Result<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(COMPRESSED_EXTENSION);
    let target = PathBuf::from(target);

    let mut input = BufReader::new(File::open(path)?);
    let output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)?;
    let mut encoder = GzEncoder::new(output, Level::default());
    let copied = io::copy(&mut input, &mut encoder).and_then(|_| encoder.finish());
    match copied {
        Ok(mut file) => {
            file.flush()?;
            fs::remove_file(path)?;
            Ok(target)
        }
        Err(e) => {
            let _ = fs::remove_file(&target);
            Err(e)
        }
    }
}

/// Delete `path`.
pub fn delete(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Delete failed");
            false
        }
    }
}

/// Default trash root: `$XDG_DATA_HOME/Trash`, usually `~/.local/share/Trash`.
pub fn default_trash_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("Trash"))
}

/// Move `path` into the trash following the XDG trash specification: the
/// file goes to `<root>/files/<name>` and a `<root>/info/<name>.trashinfo`
/// records its original location and deletion time.
pub fn move_to_trash(path: &Path, trash_root: Option<&Path>) -> bool {
    let root = match trash_root.map(Path::to_path_buf).or_else(default_trash_dir) {
        Some(r) => r,
        None => {
            warn!(path = %path.display(), "No trash directory available");
            return false;
        }
    };
    match try_move_to_trash(path, &root) {
        Ok(dest) => {
            debug!(from = %path.display(), to = %dest.display(), "Moved log file to trash");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Move to trash failed");
            false
        }
    }
}

fn try_move_to_trash(path: &Path, root: &Path) -> io::Result<PathBuf> {
    let files = root.join("files");
    let info = root.join("info");
    fs::create_dir_all(&files)?;
    fs::create_dir_all(&info)?;

    let original = fs::canonicalize(path)?;
    let name = original
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "file name is not UTF-8"))?
        .to_string();

    // Reserve a unique name by creating the .trashinfo file exclusively.
    let mut candidate = name.clone();
    let mut counter = 1u32;
    let mut info_file = loop {
        let info_path = info.join(format!("{}.trashinfo", candidate));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&info_path)
        {
            Ok(f) => break f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                counter += 1;
                candidate = format!("{}.{}", name, counter);
            }
            Err(e) => return Err(e),
        }
    };

    let deleted = timestamp::now();
    write!(
        info_file,
        "[Trash Info]\nPath={}\nDeletionDate={:04}-{:02}-{:02}T{:02}:{:02}:{:02}\n",
        percent_encode(original.to_string_lossy().as_ref()),
        deleted.year(),
        u8::from(deleted.month()),
        deleted.day(),
        deleted.hour(),
        deleted.minute(),
        deleted.second(),
    )?;

    let dest = files.join(&candidate);
    let moved = fs::rename(&original, &dest).or_else(|_| {
        // Different file systems: copy then remove.
        fs::copy(&original, &dest).and_then(|_| fs::remove_file(&original))
    });
    if let Err(e) = moved {
        let _ = fs::remove_file(info.join(format!("{}.trashinfo", candidate)));
        return Err(e);
    }
    Ok(dest)
}

/// Percent-encode a path for the `Path=` key of a `.trashinfo` file.
fn percent_encode(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for b in path.bytes() {
        if b.is_ascii_alphanumeric() || b"/-_.~".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;

    #[test]
    fn test_list_dir_missing_is_no_matches() {
        let dir = tempfile::tempdir().unwrap();
        let listing = list_dir(&dir.path().join("missing")).unwrap();
        assert!(matches!(listing, DirListing::NoMatches));
    }

    #[test]
    fn test_list_dir_reports_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.log"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let mut entries: Vec<DirEntryInfo> =
            list_dir(dir.path()).unwrap().map(|e| e.unwrap()).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            entries,
            vec![
                DirEntryInfo {
                    name: "a.log".to_string(),
                    is_dir: false
                },
                DirEntryInfo {
                    name: "sub".to_string(),
                    is_dir: true
                },
            ]
        );
    }

    #[test]
    fn test_compress_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svc_2024-01-01.log");
        fs::write(&path, b"line one\nline two\n").unwrap();

        assert_eq!(is_compressed(&path), Compression::Uncompressed);
        assert!(compress(&path));
        assert!(!path.exists());

        let gz = dir.path().join("svc_2024-01-01.log.gz");
        assert_eq!(is_compressed(&gz), Compression::Compressed);
        let mut text = String::new();
        GzDecoder::new(File::open(&gz).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "line one\nline two\n");
    }

    #[test]
    fn test_is_compressed_by_magic_and_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packed.log");
        fs::write(&path, [0x1f, 0x8b, 0x08, 0x00]).unwrap();
        assert_eq!(is_compressed(&path), Compression::Compressed);
        assert_eq!(
            is_compressed(&dir.path().join("absent.log")),
            Compression::Error
        );
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.log");
        fs::write(&path, b"x").unwrap();
        assert!(delete(&path));
        assert!(!path.exists());
        assert!(!delete(&path));
    }

    #[test]
    fn test_move_to_trash_writes_info() {
        let dir = tempfile::tempdir().unwrap();
        let trash = dir.path().join("Trash");
        let path = dir.path().join("old log.log");
        fs::write(&path, b"x").unwrap();

        assert!(move_to_trash(&path, Some(&trash)));
        assert!(!path.exists());
        assert!(trash.join("files").join("old log.log").exists());

        let info = fs::read_to_string(trash.join("info").join("old log.log.trashinfo")).unwrap();
        assert!(info.starts_with("[Trash Info]\nPath="));
        assert!(info.contains("old%20log.log"));
        assert!(info.contains("DeletionDate="));

        // A second file with the same name gets a distinct slot.
        fs::write(&path, b"y").unwrap();
        assert!(move_to_trash(&path, Some(&trash)));
        assert!(trash.join("files").join("old log.log.2").exists());
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("/a b/c%.log"), "/a%20b/c%25.log");
    }
}
