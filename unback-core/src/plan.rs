//! Restore plan: the flat action list and the validation pass over it.
//!
//! Validation is a fold of [`DestinationProgress`] transitions over the
//! actions in stream order. The transitions themselves are pure (existence
//! of the destination on disk is passed in as a boolean), so every ordering
//! rule is checkable without touching a file system. Nothing is written
//! until the whole plan validates.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{RestoreError, Result};
use crate::record::FileAttributes;
use crate::timestamp::DosTimestamp;
use crate::volume::RestoreMode;

/// One byte-copy operation: a chunk of one payload file creating or
/// extending one destination. Produced by the walker in stream order and
/// never reordered.
#[derive(Debug, Clone)]
pub struct PlannedAction {
    pub control: PathBuf,
    pub payload: PathBuf,
    pub offset: u32,
    pub length: u32,
    pub fragment: u16,
    pub complete: bool,
    pub final_size: u32,
    /// Relative to the restore root: normalized marker path plus entry name.
    pub destination: PathBuf,
    pub attributes: FileAttributes,
    pub stamp: DosTimestamp,
}

/// Reconstruction state for one destination while validating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationProgress {
    pub last_fragment: u16,
    pub bytes_written: u64,
    pub complete: bool,
}

impl DestinationProgress {
    /// Transition for the first action seen for a destination. `exists` is
    /// whether the destination file is already on disk.
    pub fn begin(
        action: &PlannedAction,
        mode: RestoreMode,
        exists: bool,
        clobber: bool,
    ) -> Result<DestinationProgress> {
        if action.fragment == 1 {
            if exists && !clobber {
                return Err(RestoreError::ClobberRefused {
                    destination: action.destination.clone(),
                });
            }
        } else {
            if mode == RestoreMode::FullSet {
                return Err(RestoreError::OutOfOrderFirstFragment {
                    destination: action.destination.clone(),
                    control: action.control.clone(),
                    fragment: action.fragment,
                });
            }
            if !exists {
                return Err(RestoreError::MissingPriorFragment {
                    destination: action.destination.clone(),
                    fragment: action.fragment,
                });
            }
        }
        Ok(DestinationProgress {
            last_fragment: action.fragment,
            bytes_written: u64::from(action.length),
            complete: action.complete,
        })
    }

    /// Transition for every later action on the same destination.
    pub fn advance(&self, action: &PlannedAction) -> Result<DestinationProgress> {
        if self.complete {
            return Err(RestoreError::AppendToCompletedFile {
                control: action.control.clone(),
                destination: action.destination.clone(),
            });
        }
        if Some(action.fragment) != self.last_fragment.checked_add(1) {
            return Err(RestoreError::FragmentOutOfOrder {
                destination: action.destination.clone(),
                prev: self.last_fragment,
                found: action.fragment,
            });
        }
        let next = DestinationProgress {
            last_fragment: action.fragment,
            bytes_written: self.bytes_written + u64::from(action.length),
            complete: action.complete,
        };
        if action.complete && next.bytes_written != u64::from(action.final_size) {
            return Err(RestoreError::SizeMismatch {
                destination: action.destination.clone(),
                expected: u64::from(action.final_size),
                actual: next.bytes_written,
            });
        }
        Ok(next)
    }
}

/// Non-fatal findings from validation. The run proceeds; the caller decides
/// how loudly to report them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The set ended without this destination's completing fragment.
    IncompleteFile { destination: PathBuf },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::IncompleteFile { destination } => write!(
                f,
                "not all chunks of {} are present in the set",
                destination.display()
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Distinct destinations the plan touches.
    pub files: usize,
    pub chunks: usize,
    pub warnings: Vec<Warning>,
}

/// Pass 1. Folds every action through the progress transitions, probing the
/// destination under `dest_root` the first time each path comes up. Fatal
/// conditions abort here, before anything is written; in full-set mode,
/// destinations never completed come back as warnings in path order.
pub fn validate(
    actions: &[PlannedAction],
    mode: RestoreMode,
    clobber: bool,
    dest_root: &Path,
) -> Result<ValidationReport> {
    let mut state: BTreeMap<&Path, DestinationProgress> = BTreeMap::new();
    for action in actions {
        match state.get_mut(action.destination.as_path()) {
            None => {
                let exists = dest_root.join(&action.destination).is_file();
                let progress = DestinationProgress::begin(action, mode, exists, clobber)?;
                state.insert(action.destination.as_path(), progress);
            }
            Some(progress) => {
                *progress = progress.advance(action)?;
            }
        }
    }
    let mut report = ValidationReport {
        files: state.len(),
        chunks: actions.len(),
        warnings: Vec::new(),
    };
    if mode == RestoreMode::FullSet {
        for (dest, progress) in &state {
            if !progress.complete {
                report.warnings.push(Warning::IncompleteFile {
                    destination: dest.to_path_buf(),
                });
            }
        }
    }
    Ok(report)
}
