//! Backup-set volumes: control-file discovery and payload pairing.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{RestoreError, Result};

/// How much of the set's ordering discipline applies to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// A whole set scanned in sequence. Every file's first chunk must be
    /// fragment 1, and files left incomplete at the end are warned about.
    FullSet,
    /// A single control file out of a larger set. Later fragments resume
    /// files on disk from an earlier run; no completeness sweep.
    Incremental,
}

/// Payload file paired with one control file, located once per volume.
#[derive(Debug, Clone)]
pub struct PayloadRef {
    pub path: PathBuf,
    pub size: u64,
}

impl PayloadRef {
    /// Locate `BACKUP.NNN` for the decoded volume number, next to `control`.
    /// The pairing follows the header's number, not the control file's own
    /// extension.
    pub fn locate(control: &Path, sequence: u8) -> Result<PayloadRef> {
        let dir = control.parent().unwrap_or_else(|| Path::new("."));
        let path = dir.join(payload_name(sequence));
        match fs::metadata(&path) {
            Ok(meta) => Ok(PayloadRef {
                path,
                size: meta.len(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RestoreError::MissingPayload {
                control: control.to_path_buf(),
                payload: path,
            }),
            Err(e) => Err(RestoreError::io(path, e)),
        }
    }
}

/// Payload file name for a volume number, as DOS wrote it.
pub fn payload_name(sequence: u8) -> String {
    format!("BACKUP.{sequence:03}")
}

/// `CONTROL.NNN` with exactly three ASCII digits, uppercase.
pub fn is_control_name(name: &str) -> bool {
    let Some(digits) = name.strip_prefix("CONTROL.") else {
        return false;
    };
    digits.len() == 3 && digits.bytes().all(|b| b.is_ascii_digit())
}

/// All control files in a set directory, sorted by name so `CONTROL.001`,
/// `CONTROL.002`, … come back in volume order. A directory with none is not
/// a backup set.
pub fn discover_control_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| RestoreError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RestoreError::io(dir, e))?;
        if entry.file_name().to_str().is_some_and(is_control_name) {
            found.push(entry.path());
        }
    }
    if found.is_empty() {
        return Err(RestoreError::NoControlFiles {
            dir: dir.to_path_buf(),
        });
    }
    found.sort();
    Ok(found)
}
