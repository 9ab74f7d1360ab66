//! # Atomic Placer
//!
//! Moves a finished download into the cache tree. A rename is tried first;
//! when the temporary directory lives on another filesystem the file is
//! copied into a sibling of the destination and renamed from there, so the
//! destination only ever appears complete.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::PlaceError;

/// Signature of the rename primitive used by [`Placer`]
pub type RenameFn = fn(&Path, &Path) -> io::Result<()>;

#[cfg(windows)]
const CROSS_DEVICE_OS_ERROR: i32 = 17; // ERROR_NOT_SAME_DEVICE
#[cfg(not(windows))]
const CROSS_DEVICE_OS_ERROR: i32 = 18; // EXDEV

fn std_rename(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

pub fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices || err.raw_os_error() == Some(CROSS_DEVICE_OS_ERROR)
}

#[derive(Debug, Clone, Copy)]
pub struct Placer {
    rename: RenameFn,
}

impl Default for Placer {
    fn default() -> Self {
        Self::new()
    }
}

impl Placer {
    pub fn new() -> Self {
        Self { rename: std_rename }
    }

    /// Use a different rename primitive, e.g. one that always reports a
    /// cross-device move.
    pub fn with_rename(rename: RenameFn) -> Self {
        Self { rename }
    }

    /// Move `src` to `dest`, creating the parent directories of `dest`.
    pub fn place(&self, src: &Path, dest: &Path) -> Result<(), PlaceError> {
        let parent = parent_dir(dest);
        fs::create_dir_all(parent).map_err(|e| PlaceError::create_dir(parent, e))?;

        debug!(from = ?src, to = ?dest, "Moving download into cache");
        match (self.rename)(src, dest) {
            Ok(()) => Ok(()),
            Err(e) if is_cross_device(&e) => {
                warn!(from = ?src, to = ?dest, "Rename crosses devices, copying instead");
                copy_then_remove(src, dest)
            }
            Err(e) => Err(PlaceError::rename(src, dest, e)),
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn copy_then_remove(src: &Path, dest: &Path) -> Result<(), PlaceError> {
    copy_into_place(src, dest).map_err(|e| PlaceError::copy(src, dest, e))?;

    fs::remove_file(src).map_err(|e| {
        warn!(path = ?src, error = %e, "Copied file but could not remove the source");
        PlaceError::RemoveSource {
            path: src.to_path_buf(),
            source: std::sync::Arc::new(e),
        }
    })
}

/// Copies `src` next to `dest`, carries over its permission bits, then
/// renames the copy onto `dest`. The staging file removes itself on any
/// error before the final rename.
fn copy_into_place(src: &Path, dest: &Path) -> io::Result<()> {
    let mut reader = File::open(src)?;
    let permissions = reader.metadata()?.permissions();

    let mut staged = tempfile::Builder::new()
        .prefix(".pullcache-")
        .suffix(".copy")
        .tempfile_in(parent_dir(dest))?;

    let copied = io::copy(&mut reader, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    drop(reader);

    fs::set_permissions(staged.path(), permissions)?;
    staged.persist(dest).map_err(|e| e.error)?;

    debug!(from = ?src, to = ?dest, bytes = copied, "Cross-device copy finished");
    Ok(())
}
