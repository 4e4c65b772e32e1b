use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use globset::Glob;
use std::path::{Path, PathBuf};

use unback_core::error::RestoreError;
use unback_core::list;
use unback_core::plan::{self, PlannedAction};
use unback_core::restore::{self, Scan};
use unback_core::volume::RestoreMode;

#[derive(Parser)]
#[command(
    name = "unback",
    version,
    about = "Restore files from DOS 5 BACKUP volume sets"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List the files a backup set contains
    List {
        /// Directory holding the CONTROL.NNN / BACKUP.NNN pairs
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Shell-style filter (* and ?) on file names
        #[arg(long)]
        wildcard: Option<String>,
        /// Emit the catalog as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Trace each decoded record to stderr
        #[arg(long, default_value_t = false)]
        debug: bool,
        /// Single control file to list instead of the whole set
        control: Option<PathBuf>,
    },
    /// Restore files from a backup set
    Restore {
        /// Directory holding the CONTROL.NNN / BACKUP.NNN pairs
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Directory to restore into
        #[arg(long, default_value = ".")]
        dest: PathBuf,
        /// Shell-style filter (* and ?) on file names
        #[arg(long)]
        wildcard: Option<String>,
        /// Overwrite destination files that already exist
        #[arg(long, default_value_t = false)]
        clobber: bool,
        /// Restore each file's stored modification time
        #[arg(long, default_value_t = false)]
        timestamps: bool,
        /// Trace each decoded record to stderr
        #[arg(long, default_value_t = false)]
        debug: bool,
        /// Single control file to apply on top of an earlier restore
        control: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::List {
            dir,
            wildcard,
            json,
            debug,
            control,
        } => list_cmd(&dir, wildcard.as_deref(), json, debug, control.as_deref()),
        Cmd::Restore {
            dir,
            dest,
            wildcard,
            clobber,
            timestamps,
            debug,
            control,
        } => restore_cmd(
            &dir,
            &dest,
            wildcard.as_deref(),
            clobber,
            timestamps,
            debug,
            control.as_deref(),
        ),
    }
}

/// Whole-set scan unless an explicit control file was named.
fn scan(dir: &Path, control: Option<&Path>, debug: bool) -> Result<(Scan, RestoreMode)> {
    match control {
        Some(control) => Ok((restore::scan_file(control, debug)?, RestoreMode::Incremental)),
        None => Ok((restore::scan_set(dir, debug)?, RestoreMode::FullSet)),
    }
}

fn filter_actions(actions: Vec<PlannedAction>, pattern: Option<&str>) -> Result<Vec<PlannedAction>> {
    let Some(pattern) = pattern else {
        return Ok(actions);
    };
    let glob = Glob::new(pattern)
        .with_context(|| format!("bad wildcard {pattern:?}"))?
        .compile_matcher();
    Ok(actions
        .into_iter()
        .filter(|a| {
            a.destination
                .file_name()
                .is_some_and(|name| glob.is_match(name))
        })
        .collect())
}

fn list_cmd(
    dir: &Path,
    wildcard: Option<&str>,
    json: bool,
    debug: bool,
    control: Option<&Path>,
) -> Result<()> {
    let (scan, _mode) = scan(dir, control, debug)?;
    let actions = filter_actions(scan.actions, wildcard)?;
    let catalog = list::catalog(&actions);
    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        for entry in &catalog {
            println!("{entry}");
        }
    }
    Ok(())
}

fn restore_cmd(
    dir: &Path,
    dest: &Path,
    wildcard: Option<&str>,
    clobber: bool,
    timestamps: bool,
    debug: bool,
    control: Option<&Path>,
) -> Result<()> {
    let (scan, mode) = scan(dir, control, debug)?;
    let actions = filter_actions(scan.actions, wildcard)?;
    let checked = plan::validate(&actions, mode, clobber, dest).map_err(decorate_clobber)?;
    for warning in &checked.warnings {
        eprintln!("Warning: {warning}");
    }
    let report = restore::materialize(&actions, dest, timestamps, debug)?;
    println!(
        "Restored {} file(s), {} chunk(s), {} bytes",
        report.files, report.chunks, report.bytes
    );
    Ok(())
}

/// Refused overwrites get a flag hint on top of the core error.
fn decorate_clobber(err: RestoreError) -> anyhow::Error {
    if matches!(err, RestoreError::ClobberRefused { .. }) {
        anyhow::Error::new(err).context("an existing file blocked the restore (pass --clobber to overwrite)")
    } else {
        err.into()
    }
}
