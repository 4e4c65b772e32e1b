//! Logical-file catalog for listing mode.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::plan::PlannedAction;
use crate::record::FileAttributes;

/// One logical file of the set, collapsed from its fragment actions.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub path: String,
    /// Declared final size, not the bytes present on this volume.
    pub size: u32,
    pub modified: String,
    pub read_only: bool,
    pub hidden: bool,
    pub system: bool,
    pub archive: bool,
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>12} {}",
            self.modified,
            group_thousands(u64::from(self.size)),
            self.path
        )
    }
}

/// Deduplicate the action list by destination, first occurrence winning,
/// stream order preserved.
pub fn catalog(actions: &[PlannedAction]) -> Vec<CatalogEntry> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for action in actions {
        if !seen.insert(&action.destination) {
            continue;
        }
        out.push(CatalogEntry {
            path: action.destination.display().to_string(),
            size: action.final_size,
            modified: action.stamp.to_string(),
            read_only: action.attributes.contains(FileAttributes::READ_ONLY),
            hidden: action.attributes.contains(FileAttributes::HIDDEN),
            system: action.attributes.contains(FileAttributes::SYSTEM),
            archive: action.attributes.contains(FileAttributes::ARCHIVE),
        });
    }
    out
}

/// `1234567` -> `"1,234,567"`, the DOS-era listing style.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let bytes = digits.as_bytes();
    let mut out = String::with_capacity(bytes.len() + bytes.len() / 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 && (bytes.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*b as char);
    }
    out
}
