use std::path::PathBuf;

use thiserror::Error;

use crate::record::RecordKind;

/// Structural violation found while decoding one fixed-layout record.
///
/// Decoders report these without any file or stream position attached; the
/// walker wraps them into [`RestoreError::MalformedRecord`] with the
/// control-file path and byte offset of the block at fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordViolation {
    #[error("block is {have} bytes, record needs {need}")]
    Truncated { need: usize, have: usize },
    #[error("declared length {declared:#04x}, expected {expected:#04x}")]
    WrongLength { declared: u8, expected: u8 },
    #[error("signature {found:?}, expected {expected:?}")]
    BadSignature { expected: &'static str, found: String },
    #[error("pad byte at record offset {at:#04x} is {value:#04x}, expected 0x00")]
    NonZeroPad { at: usize, value: u8 },
    #[error("sentinel byte {value:#04x} is neither 0x00 nor 0xFF")]
    BadSentinel { value: u8 },
    #[error("completeness flag {value:#04x} is neither 0x02 (split) nor 0x03 (complete)")]
    BadCompletenessFlag { value: u8 },
    #[error("non-ASCII byte {value:#04x} in text field at record offset {at:#04x}")]
    NonAscii { at: usize, value: u8 },
    #[error("no record kind has length tag {tag:#04x}")]
    UnknownTag { tag: u8 },
}

/// Fatal restore conditions. Any of these aborts the run; warnings that do
/// not abort (an incomplete file at the end of a full set) are reported as
/// data in the validation report instead.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("{}: malformed {kind} record at offset {offset}: {violation}", file.display())]
    MalformedRecord {
        file: PathBuf,
        kind: RecordKind,
        offset: u64,
        violation: RecordViolation,
    },

    #[error("{}: unknown block tag {tag:#04x} at offset {offset}", file.display())]
    UnknownBlockTag { file: PathBuf, tag: u8, offset: u64 },

    #[error("{}: file entry at offset {offset} appears before any directory marker", file.display())]
    FileEntryBeforeDirectory { file: PathBuf, offset: u64 },

    #[error("{}: directory {dir:?} declared {declared} entries, only {seen} present", file.display())]
    IncompleteDirectory {
        file: PathBuf,
        dir: String,
        declared: u16,
        seen: u16,
    },

    #[error("{}: directory {dir:?} declared {declared} entries, further entry at offset {offset}", file.display())]
    DirectoryOverflow {
        file: PathBuf,
        dir: String,
        declared: u16,
        offset: u64,
    },

    #[error(
        "chunk {offset}+{length} in {} extends beyond payload {} ({payload_size} bytes)",
        control.display(),
        payload.display()
    )]
    ChunkBeyondPayload {
        control: PathBuf,
        payload: PathBuf,
        offset: u32,
        length: u32,
        payload_size: u64,
    },

    #[error("{}: declared final size {expected} bytes, fragments total {actual}", destination.display())]
    SizeMismatch {
        destination: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error(
        "volume sequence broken: {} is volume {prev}, {} is volume {found}",
        prev_file.display(),
        file.display()
    )]
    VolumeSequence {
        prev_file: PathBuf,
        prev: u8,
        file: PathBuf,
        found: u8,
    },

    #[error("control file {} not found", path.display())]
    MissingControl { path: PathBuf },

    #[error("no control files (CONTROL.NNN) found under {}", dir.display())]
    NoControlFiles { dir: PathBuf },

    #[error("{}: paired payload {} not found", control.display(), payload.display())]
    MissingPayload { control: PathBuf, payload: PathBuf },

    #[error(
        "first chunk of {} (from {}) is fragment {fragment}, expected 1",
        destination.display(),
        control.display()
    )]
    OutOfOrderFirstFragment {
        destination: PathBuf,
        control: PathBuf,
        fragment: u16,
    },

    #[error("refusing to overwrite existing file {}", destination.display())]
    ClobberRefused { destination: PathBuf },

    #[error("fragment {fragment} of {} has no existing file to append to", destination.display())]
    MissingPriorFragment { destination: PathBuf, fragment: u16 },

    #[error("{}: chunk appended to {} after it was complete", control.display(), destination.display())]
    AppendToCompletedFile {
        control: PathBuf,
        destination: PathBuf,
    },

    #[error("fragment {prev} of {} was followed by fragment {found}", destination.display())]
    FragmentOutOfOrder {
        destination: PathBuf,
        prev: u16,
        found: u16,
    },

    #[error("unusable destination path {raw:?}: {detail}")]
    BadDestination { raw: String, detail: &'static str },

    #[error("{}: stored timestamp {stamp} is not a representable time", destination.display())]
    BadTimestamp { destination: PathBuf, stamp: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RestoreError {
    /// Tag a raw I/O error with the path it concerned.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RestoreError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RestoreError>;
