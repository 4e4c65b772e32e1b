//! Fixed-layout records of the control stream.
//!
//! Every block opens with a one-byte length that doubles as its kind tag:
//! 0x8B volume header, 0x46 directory marker, 0x22 file entry. All multi-byte
//! integers are little-endian; text fields are ASCII padded with trailing
//! spaces or NULs. Decoders are pure: they see exactly one block and report
//! [`RecordViolation`]s without any stream position (the walker attaches it).

use std::fmt;

use bitflags::bitflags;

use crate::error::RecordViolation;
use crate::timestamp::DosTimestamp;

/// Length tag of a volume header block.
pub const HEADER_LEN: u8 = 0x8B;
/// Length tag of a directory marker block.
pub const DIRECTORY_LEN: u8 = 0x46;
/// Length tag of a file entry block.
pub const FILE_ENTRY_LEN: u8 = 0x22;

/// Eight fixed bytes following the header's length byte.
pub const SIGNATURE: &[u8; 8] = b"BACKUP  ";

/// The closed set of block kinds, keyed by length tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Header,
    Directory,
    FileEntry,
}

impl RecordKind {
    pub fn from_tag(tag: u8) -> Option<RecordKind> {
        match tag {
            HEADER_LEN => Some(RecordKind::Header),
            DIRECTORY_LEN => Some(RecordKind::Directory),
            FILE_ENTRY_LEN => Some(RecordKind::FileEntry),
            _ => None,
        }
    }

    pub fn fixed_len(self) -> usize {
        match self {
            RecordKind::Header => HEADER_LEN as usize,
            RecordKind::Directory => DIRECTORY_LEN as usize,
            RecordKind::FileEntry => FILE_ENTRY_LEN as usize,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Header => "volume header",
            RecordKind::Directory => "directory marker",
            RecordKind::FileEntry => "file entry",
        })
    }
}

bitflags! {
    /// FAT-style attribute bits. Best-effort metadata only: the format does
    /// not document them, and observed backups carry just 0x00 or 0x20.
    /// Unknown bits are retained, never rejected.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileAttributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const ARCHIVE = 0x20;
    }
}

/// Header block: 0x00 len, 0x01:8 signature, 0x09 volume number,
/// 0x0A:128 zero pad, 0x8A sentinel (0xFF on the final volume, else 0x00).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeHeader {
    /// 1-based position of this volume in the backup set.
    pub sequence: u8,
    pub last_volume: bool,
}

impl VolumeHeader {
    pub fn decode(blk: &[u8]) -> Result<VolumeHeader, RecordViolation> {
        check_len(blk, HEADER_LEN)?;
        if &blk[0x01..0x09] != SIGNATURE {
            return Err(RecordViolation::BadSignature {
                expected: "BACKUP  ",
                found: String::from_utf8_lossy(&blk[0x01..0x09]).into_owned(),
            });
        }
        if let Some(i) = blk[0x0A..0x8A].iter().position(|&b| b != 0) {
            return Err(RecordViolation::NonZeroPad {
                at: 0x0A + i,
                value: blk[0x0A + i],
            });
        }
        let sentinel = blk[0x8A];
        if sentinel != 0x00 && sentinel != 0xFF {
            return Err(RecordViolation::BadSentinel { value: sentinel });
        }
        Ok(VolumeHeader {
            sequence: blk[0x09],
            last_volume: sentinel == 0xFF,
        })
    }
}

/// Directory block: 0x00 len, 0x01:63 path (root stored as all NULs),
/// 0x40:2 declared entry count, 0x42:4 unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMarker {
    /// DOS-style directory path; empty means the root of the backed-up tree.
    pub path: String,
    /// Number of file entries the stream promises before the next marker.
    pub entries: u16,
    /// Undocumented trailing field, exposed as-is and never validated.
    pub unknown: [u8; 4],
}

impl DirectoryMarker {
    pub fn decode(blk: &[u8]) -> Result<DirectoryMarker, RecordViolation> {
        check_len(blk, DIRECTORY_LEN)?;
        let path = text_field(blk, 0x01, 63)?;
        let mut unknown = [0u8; 4];
        unknown.copy_from_slice(&blk[0x42..0x46]);
        Ok(DirectoryMarker {
            path,
            entries: le16(blk, 0x40),
            unknown,
        })
    }
}

/// File entry block: 0x00 len, 0x01:12 name, 0x0D completeness flag,
/// 0x0E:4 final size, 0x12:2 fragment number, 0x14:4 payload offset,
/// 0x18:4 chunk length, 0x1C attributes, 0x1D unknown, 0x1E:4 timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    /// True (flag 0x03) when this chunk completes the file; false (0x02)
    /// when further fragments follow on later volumes.
    pub complete: bool,
    /// Total size of the reconstructed file, repeated on every fragment.
    pub final_size: u32,
    /// 1 for the first or only fragment, 2, 3, … for continuations.
    pub fragment: u16,
    pub offset: u32,
    pub length: u32,
    pub attributes: FileAttributes,
    /// Undocumented byte at 0x1D, exposed as-is.
    pub unknown: u8,
    pub stamp: DosTimestamp,
}

impl FileEntry {
    pub fn decode(blk: &[u8]) -> Result<FileEntry, RecordViolation> {
        check_len(blk, FILE_ENTRY_LEN)?;
        let name = text_field(blk, 0x01, 12)?;
        let complete = match blk[0x0D] {
            0x03 => true,
            0x02 => false,
            value => return Err(RecordViolation::BadCompletenessFlag { value }),
        };
        let mut stamp_raw = [0u8; 4];
        stamp_raw.copy_from_slice(&blk[0x1E..0x22]);
        Ok(FileEntry {
            name,
            complete,
            final_size: le32(blk, 0x0E),
            fragment: le16(blk, 0x12),
            offset: le32(blk, 0x14),
            length: le32(blk, 0x18),
            attributes: FileAttributes::from_bits_retain(blk[0x1C]),
            unknown: blk[0x1D],
            stamp: DosTimestamp::decode(stamp_raw),
        })
    }
}

/// One decoded block of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Header(VolumeHeader),
    Directory(DirectoryMarker),
    File(FileEntry),
}

impl Record {
    /// Decode a whole standalone block, picking the variant from its length
    /// tag. The walker does its own tag dispatch (it needs stream offsets and
    /// treats an out-of-place header tag differently); this is the one-shot
    /// form for callers holding a single extracted block.
    pub fn decode(blk: &[u8]) -> Result<Record, RecordViolation> {
        let Some(&tag) = blk.first() else {
            return Err(RecordViolation::Truncated { need: 1, have: 0 });
        };
        match RecordKind::from_tag(tag) {
            Some(RecordKind::Header) => VolumeHeader::decode(blk).map(Record::Header),
            Some(RecordKind::Directory) => DirectoryMarker::decode(blk).map(Record::Directory),
            Some(RecordKind::FileEntry) => FileEntry::decode(blk).map(Record::File),
            None => Err(RecordViolation::UnknownTag { tag }),
        }
    }
}

/// Declared length byte must match both the kind's fixed length and the
/// slice the caller produced.
fn check_len(blk: &[u8], expected: u8) -> Result<(), RecordViolation> {
    let Some(&declared) = blk.first() else {
        return Err(RecordViolation::Truncated {
            need: expected as usize,
            have: 0,
        });
    };
    if declared != expected {
        return Err(RecordViolation::WrongLength { declared, expected });
    }
    if blk.len() != expected as usize {
        return Err(RecordViolation::Truncated {
            need: expected as usize,
            have: blk.len(),
        });
    }
    Ok(())
}

/// ASCII text field trimmed of trailing space and NUL padding.
fn text_field(blk: &[u8], start: usize, len: usize) -> Result<String, RecordViolation> {
    let field = &blk[start..start + len];
    if let Some(i) = field.iter().position(|b| !b.is_ascii()) {
        return Err(RecordViolation::NonAscii {
            at: start + i,
            value: field[i],
        });
    }
    let end = field
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    Ok(String::from_utf8_lossy(&field[..end]).into_owned())
}

fn le16(blk: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([blk[at], blk[at + 1]])
}

fn le32(blk: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([blk[at], blk[at + 1], blk[at + 2], blk[at + 3]])
}
