//! File archiver

use crate::enrich::Clock;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Timestamp inserted into archived file names
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

fn split_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, ext)
}

/// Archived name for `path` at `at`, with collision suffix `n` (0 = none)
pub fn archive_file_name(path: &Path, at: DateTime<Utc>, n: usize) -> String {
    let (stem, ext) = split_name(path);
    let stamp = at.format(ARCHIVE_TIMESTAMP_FORMAT);

    if n == 0 {
        format!("{stem}_{stamp}{ext}")
    } else {
        format!("{stem}_{stamp}_{n}{ext}")
    }
}

/// `path`'s own file name, with collision suffix `n` (0 = none)
pub fn kept_file_name(path: &Path, n: usize) -> String {
    let (stem, ext) = split_name(path);
    if n == 0 {
        format!("{stem}{ext}")
    } else {
        format!("{stem}_{n}{ext}")
    }
}

/// Moves processed inputs and outputs into the archive directories
#[derive(Debug, Clone)]
pub struct Archiver {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl Archiver {
    pub fn new(
        raw_dir: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
            clock,
        }
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Move an input file into the raw archive, stamped with the archival
    /// time
    pub fn archive_input(&self, path: &Path) -> Result<PathBuf> {
        let at = self
            .clock
            .now()
            .map_err(|e| Error::archival(path.display().to_string(), e.to_string()))?;
        archive_into(&self.raw_dir, path, |n| archive_file_name(path, at, n))
    }

    /// Move an output artifact into the processed archive. Artifact names
    /// already carry their creation time, so the name is kept.
    pub fn archive_output(&self, path: &Path) -> Result<PathBuf> {
        archive_into(&self.processed_dir, path, |n| kept_file_name(path, n))
    }
}

fn archive_into(dir: &Path, path: &Path, name: impl Fn(usize) -> String) -> Result<PathBuf> {
    let fail = |message: String| Error::archival(path.display().to_string(), message);

    if !path.is_file() {
        return Err(fail("source file does not exist".to_string()));
    }

    fs::create_dir_all(dir).map_err(|e| fail(format!("cannot create {}: {e}", dir.display())))?;

    let mut n = 0;
    loop {
        let dest = dir.join(name(n));
        match claim(path, &dest) {
            Ok(()) => {
                info!(from = %path.display(), to = %dest.display(), "Archived file");
                return Ok(dest);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(dest = %dest.display(), "Archive name taken");
                n += 1;
            }
            Err(e) => return Err(fail(format!("cannot move to {}: {e}", dest.display()))),
        }
    }
}

/// Move `src` to `dest` without ever replacing an existing `dest`.
///
/// `AlreadyExists` means the name is taken and nothing changed.
fn claim(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::hard_link(src, dest) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(src) {
                let _ = fs::remove_file(dest);
                return Err(e);
            }
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(e),
        // Linking unsupported (e.g. another device): copy into a new file
        Err(_) => copy_then_remove(src, dest),
    }
}

fn copy_then_remove(src: &Path, dest: &Path) -> io::Result<()> {
    let mut out = OpenOptions::new().write(true).create_new(true).open(dest)?;

    let copied = File::open(src)
        .and_then(|mut input| io::copy(&mut input, &mut out))
        .and_then(|_| out.sync_all())
        .and_then(|()| fs::remove_file(src));

    if let Err(e) = copied {
        drop(out);
        let _ = fs::remove_file(dest);
        return Err(e);
    }
    Ok(())
}
