//! Output sinks: a stream, or the source file itself
//!
//! In-place writes go through a temporary file in the same directory
//! followed by a rename, so a file on disk is either fully original or
//! fully patched.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::InstrumentError;

/// Where patched output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Write to the caller's stream (stdout for the CLI)
    #[default]
    Stream,
    /// Overwrite each source file
    InPlace,
}

/// Result of an in-place write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    Unchanged,
}

/// Emit a patched buffer to a stream
pub fn write_stream<W: Write>(out: &mut W, contents: &[u8]) -> io::Result<()> {
    out.write_all(contents)
}

/// Overwrite `path` with `patched` unless it equals `original`
///
/// Read-only files are refused before anything is written.
pub fn write_in_place(
    path: &Path,
    original: &[u8],
    patched: &[u8],
) -> Result<WriteStatus, InstrumentError> {
    if original == patched {
        return Ok(WriteStatus::Unchanged);
    }

    // Write through symlinks to the file they point at
    let target =
        fs::canonicalize(path).map_err(|e| InstrumentError::io(path, "failed to resolve", e))?;
    let metadata =
        fs::metadata(&target).map_err(|e| InstrumentError::io(path, "failed to stat", e))?;
    if metadata.permissions().readonly() {
        return Err(InstrumentError::io(
            path,
            "refusing to overwrite",
            io::Error::new(io::ErrorKind::PermissionDenied, "file is read-only"),
        ));
    }

    atomic_write(&target, patched, &metadata)
        .map_err(|e| InstrumentError::io(path, "failed to write", e))?;
    Ok(WriteStatus::Written)
}

/// Temporary sibling used while replacing `path`
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.cp-inserter.tmp", name))
}

fn atomic_write(path: &Path, contents: &[u8], original: &fs::Metadata) -> io::Result<()> {
    let temp = temp_path(path);

    let result = (|| {
        let mut file = fs::File::create(&temp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);
        fs::set_permissions(&temp, original.permissions())?;
        fs::rename(&temp, path)
    })();

    if result.is_err() {
        // Best effort: never leave the temp file behind
        let _ = fs::remove_file(&temp);
    }
    result
}
