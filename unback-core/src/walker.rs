//! Control-stream walker: one volume's metadata, block by block.
//!
//! The stream grammar is `header (marker entry*)*`. The walker moves
//! strictly forward, holds one block at a time, and keeps the active
//! directory and its running entry count as explicit state. Record decoding
//! errors get the control-file path and block offset attached here.

use std::path::{Path, PathBuf};

use crate::error::{RecordViolation, RestoreError, Result};
use crate::path_safety;
use crate::plan::PlannedAction;
use crate::record::{DirectoryMarker, FileEntry, RecordKind, VolumeHeader, HEADER_LEN};
use crate::volume::PayloadRef;

pub struct ControlWalker<'a> {
    data: &'a [u8],
    offset: usize,
    control: PathBuf,
    debug: bool,
    dir: Option<ActiveDirectory>,
}

struct ActiveDirectory {
    /// Stored path, kept verbatim for error reporting.
    raw: String,
    rel: PathBuf,
    declared: u16,
    seen: u16,
}

impl<'a> ControlWalker<'a> {
    pub fn new(data: &'a [u8], control: &Path, debug: bool) -> ControlWalker<'a> {
        ControlWalker {
            data,
            offset: 0,
            control: control.to_path_buf(),
            debug,
            dir: None,
        }
    }

    /// Decode the leading volume header. The first block must be one; any
    /// other opening is fatal for the whole run.
    pub fn read_header(&mut self) -> Result<VolumeHeader> {
        let end = self.data.len().min(HEADER_LEN as usize);
        let hdr = VolumeHeader::decode(&self.data[..end])
            .map_err(|v| self.malformed(RecordKind::Header, 0, v))?;
        self.offset = HEADER_LEN as usize;
        if self.debug {
            eprintln!(
                "{}: volume {}{}",
                self.control.display(),
                hdr.sequence,
                if hdr.last_volume { " (last)" } else { "" }
            );
        }
        Ok(hdr)
    }

    /// Walk every block after the header, appending one action per file
    /// entry. Consumes the rest of the stream; the declared-count check for
    /// the final directory fires at end of stream.
    pub fn walk_entries(
        &mut self,
        payload: &PayloadRef,
        actions: &mut Vec<PlannedAction>,
    ) -> Result<()> {
        while self.offset < self.data.len() {
            let at = self.offset as u64;
            let tag = self.data[self.offset];
            match RecordKind::from_tag(tag) {
                Some(RecordKind::Directory) => {
                    let blk = self.take(RecordKind::Directory, at)?;
                    let marker = DirectoryMarker::decode(blk)
                        .map_err(|v| self.malformed(RecordKind::Directory, at, v))?;
                    self.enter_directory(marker)?;
                }
                Some(RecordKind::FileEntry) => {
                    let blk = self.take(RecordKind::FileEntry, at)?;
                    let entry = FileEntry::decode(blk)
                        .map_err(|v| self.malformed(RecordKind::FileEntry, at, v))?;
                    self.plan_entry(entry, at, payload, actions)?;
                }
                // A header tag is only valid as the opening block.
                Some(RecordKind::Header) | None => {
                    return Err(RestoreError::UnknownBlockTag {
                        file: self.control.clone(),
                        tag,
                        offset: at,
                    });
                }
            }
        }
        self.close_directory()
    }

    /// Slice the next block of `kind`, or report how short the stream is.
    fn take(&mut self, kind: RecordKind, at: u64) -> Result<&'a [u8]> {
        let need = kind.fixed_len();
        let have = self.data.len() - self.offset;
        if have < need {
            return Err(self.malformed(kind, at, RecordViolation::Truncated { need, have }));
        }
        let blk = &self.data[self.offset..self.offset + need];
        self.offset += need;
        Ok(blk)
    }

    fn enter_directory(&mut self, marker: DirectoryMarker) -> Result<()> {
        self.close_directory()?;
        if self.debug {
            eprintln!(
                "{}: directory {:?}, {} entries",
                self.control.display(),
                marker.path,
                marker.entries
            );
        }
        let rel = path_safety::normalize_directory(&marker.path)?;
        self.dir = Some(ActiveDirectory {
            raw: marker.path,
            rel,
            declared: marker.entries,
            seen: 0,
        });
        Ok(())
    }

    /// Declared-count check for the directory being left.
    fn close_directory(&mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            if dir.seen < dir.declared {
                return Err(RestoreError::IncompleteDirectory {
                    file: self.control.clone(),
                    dir: dir.raw,
                    declared: dir.declared,
                    seen: dir.seen,
                });
            }
        }
        Ok(())
    }

    fn plan_entry(
        &mut self,
        entry: FileEntry,
        at: u64,
        payload: &PayloadRef,
        actions: &mut Vec<PlannedAction>,
    ) -> Result<()> {
        let Some(dir) = self.dir.as_mut() else {
            return Err(RestoreError::FileEntryBeforeDirectory {
                file: self.control.clone(),
                offset: at,
            });
        };
        if dir.seen == dir.declared {
            return Err(RestoreError::DirectoryOverflow {
                file: self.control.clone(),
                dir: dir.raw.clone(),
                declared: dir.declared,
                offset: at,
            });
        }
        let end = u64::from(entry.offset) + u64::from(entry.length);
        if end > payload.size {
            return Err(RestoreError::ChunkBeyondPayload {
                control: self.control.clone(),
                payload: payload.path.clone(),
                offset: entry.offset,
                length: entry.length,
                payload_size: payload.size,
            });
        }
        let name = path_safety::entry_name(&entry.name)?;
        let destination = dir.rel.join(name);
        // A file whose first fragment already completes it must fit exactly.
        if entry.fragment == 1 && entry.complete && entry.length != entry.final_size {
            return Err(RestoreError::SizeMismatch {
                destination,
                expected: u64::from(entry.final_size),
                actual: u64::from(entry.length),
            });
        }
        if self.debug {
            eprintln!(
                "{}: entry {:?} fragment {}{}, {} bytes at {}, {}",
                self.control.display(),
                entry.name,
                entry.fragment,
                if entry.complete { " (final)" } else { "" },
                entry.length,
                entry.offset,
                entry.stamp
            );
        }
        actions.push(PlannedAction {
            control: self.control.clone(),
            payload: payload.path.clone(),
            offset: entry.offset,
            length: entry.length,
            fragment: entry.fragment,
            complete: entry.complete,
            final_size: entry.final_size,
            destination,
            attributes: entry.attributes,
            stamp: entry.stamp,
        });
        dir.seen += 1;
        Ok(())
    }

    fn malformed(&self, kind: RecordKind, offset: u64, violation: RecordViolation) -> RestoreError {
        RestoreError::MalformedRecord {
            file: self.control.clone(),
            kind,
            offset,
            violation,
        }
    }
}
