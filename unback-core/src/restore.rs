//! Set scanning and chunk materialization.
//!
//! `scan_set` / `scan_file` drive the walker over each control file and
//! produce the flat action plan; `materialize` replays a validated plan
//! against the file system. Ordering is strict: volumes ascending, blocks
//! in stream order, actions in append order.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use filetime::FileTime;

use crate::error::{RestoreError, Result};
use crate::plan::PlannedAction;
use crate::volume::{self, PayloadRef};
use crate::walker::ControlWalker;

/// One volume of the set as scanned.
#[derive(Debug, Clone)]
pub struct VolumeInfo {
    pub control: PathBuf,
    pub payload: PathBuf,
    pub payload_size: u64,
    pub sequence: u8,
    pub last_volume: bool,
}

/// Scan result: the volumes in order plus the flat action plan.
#[derive(Debug)]
pub struct Scan {
    pub volumes: Vec<VolumeInfo>,
    pub actions: Vec<PlannedAction>,
}

/// Discover and scan a whole set directory in volume order.
pub fn scan_set(dir: &Path, debug: bool) -> Result<Scan> {
    let controls = volume::discover_control_files(dir)?;
    scan_controls(&controls, debug)
}

/// Scan one explicit control file (incremental mode).
pub fn scan_file(control: &Path, debug: bool) -> Result<Scan> {
    scan_controls(&[control.to_path_buf()], debug)
}

fn scan_controls(controls: &[PathBuf], debug: bool) -> Result<Scan> {
    let mut volumes = Vec::new();
    let mut actions = Vec::new();
    let mut prev: Option<(&Path, u8)> = None;
    for control in controls {
        let data = match fs::read(control) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RestoreError::MissingControl {
                    path: control.clone(),
                });
            }
            Err(e) => return Err(RestoreError::io(control, e)),
        };
        let mut walker = ControlWalker::new(&data, control, debug);
        let hdr = walker.read_header()?;
        // The first volume's number is the baseline; after that every
        // header must count up by exactly one.
        if let Some((prev_file, prev_seq)) = prev {
            if Some(hdr.sequence) != prev_seq.checked_add(1) {
                return Err(RestoreError::VolumeSequence {
                    prev_file: prev_file.to_path_buf(),
                    prev: prev_seq,
                    file: control.clone(),
                    found: hdr.sequence,
                });
            }
        }
        prev = Some((control, hdr.sequence));
        let payload = PayloadRef::locate(control, hdr.sequence)?;
        walker.walk_entries(&payload, &mut actions)?;
        volumes.push(VolumeInfo {
            control: control.clone(),
            payload: payload.path,
            payload_size: payload.size,
            sequence: hdr.sequence,
            last_volume: hdr.last_volume,
        });
    }
    Ok(Scan { volumes, actions })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MaterializeReport {
    pub files: usize,
    pub chunks: usize,
    pub bytes: u64,
}

/// Pass 2. Replays the validated plan in order: parent directories
/// created as needed, fragment 1 truncates, later fragments append. With
/// `timestamps` set, a completing chunk also restores the stored mtime.
/// The first I/O failure aborts the rest; partially written destinations
/// are left as-is.
pub fn materialize(
    actions: &[PlannedAction],
    dest_root: &Path,
    timestamps: bool,
    debug: bool,
) -> Result<MaterializeReport> {
    let mut report = MaterializeReport::default();
    let mut touched = BTreeSet::new();
    for action in actions {
        let dest = dest_root.join(&action.destination);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| RestoreError::io(parent, e))?;
        }
        let chunk = read_chunk(&action.payload, action.offset, action.length)?;
        let mut out = if action.fragment == 1 {
            File::create(&dest).map_err(|e| RestoreError::io(&dest, e))?
        } else {
            OpenOptions::new()
                .append(true)
                .open(&dest)
                .map_err(|e| RestoreError::io(&dest, e))?
        };
        out.write_all(&chunk).map_err(|e| RestoreError::io(&dest, e))?;
        drop(out);
        if action.complete && timestamps {
            restore_mtime(&dest, action)?;
        }
        if debug {
            eprintln!(
                "{}: {} bytes (fragment {})",
                dest.display(),
                action.length,
                action.fragment
            );
        }
        touched.insert(&action.destination);
        report.chunks += 1;
        report.bytes += u64::from(action.length);
    }
    report.files = touched.len();
    Ok(report)
}

/// Read exactly `length` bytes at `offset` from a payload file.
fn read_chunk(payload: &Path, offset: u32, length: u32) -> Result<Vec<u8>> {
    let mut fh = File::open(payload).map_err(|e| RestoreError::io(payload, e))?;
    fh.seek(SeekFrom::Start(u64::from(offset)))
        .map_err(|e| RestoreError::io(payload, e))?;
    let mut chunk = vec![0u8; length as usize];
    fh.read_exact(&mut chunk)
        .map_err(|e| RestoreError::io(payload, e))?;
    Ok(chunk)
}

fn restore_mtime(dest: &Path, action: &PlannedAction) -> Result<()> {
    let Some(when) = action.stamp.to_system_time() else {
        return Err(RestoreError::BadTimestamp {
            destination: action.destination.clone(),
            stamp: action.stamp.to_string(),
        });
    };
    filetime::set_file_mtime(dest, FileTime::from_system_time(when))
        .map_err(|e| RestoreError::io(dest, e))
}
