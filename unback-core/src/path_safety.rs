//! Normalization of stored DOS paths into safe relative destinations.
//!
//! Marker paths come off 30-year-old media and are joined under the restore
//! root, so traversal components are refused outright rather than resolved.

use std::path::PathBuf;

use crate::error::{RestoreError, Result};

/// Turn a marker's stored directory path into a relative path. Splits on
/// both `\` and `/`, drops empty components, strips a leading drive
/// specifier (`C:` or `C:DOS`), and refuses `.`/`..`. The root marker (all
/// padding) yields an empty path.
pub fn normalize_directory(raw: &str) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    let mut first = true;
    for comp in raw.split(['\\', '/']) {
        let mut comp = comp;
        if first && !comp.is_empty() {
            first = false;
            let b = comp.as_bytes();
            if b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':' {
                comp = &comp[2..];
            }
        }
        if comp.is_empty() {
            continue;
        }
        if comp == "." || comp == ".." {
            return Err(bad(raw, "traversal component"));
        }
        out.push(comp);
    }
    Ok(out)
}

/// A file-entry name must be a single non-empty component.
pub fn entry_name(raw: &str) -> Result<&str> {
    if raw.is_empty() {
        return Err(bad(raw, "empty file name"));
    }
    if raw.contains(['\\', '/']) {
        return Err(bad(raw, "separator in file name"));
    }
    if raw == "." || raw == ".." {
        return Err(bad(raw, "traversal component"));
    }
    Ok(raw)
}

fn bad(raw: &str, detail: &'static str) -> RestoreError {
    RestoreError::BadDestination {
        raw: raw.to_owned(),
        detail,
    }
}
