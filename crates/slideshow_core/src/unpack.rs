//! crates/slideshow_core/src/unpack.rs
//!
//! Resets the download directory, extracts the downloaded archive and flattens
//! the result into a single directory of files.

use crate::error::{SlideshowError, SlideshowResult};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Finder metadata that archives from macOS clients carry around.
pub const METADATA_ARTIFACT: &str = ".DS_Store";

/// Runs blocking file-system work off the async executor.
pub(crate) async fn run_blocking<T, F>(work: F) -> SlideshowResult<T>
where
    F: FnOnce() -> SlideshowResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SlideshowError::Io(io::Error::other(e)))?
}

pub(crate) fn ensure_active(cancel: &CancellationToken) -> SlideshowResult<()> {
    if cancel.is_cancelled() {
        Err(SlideshowError::Cancelled)
    } else {
        Ok(())
    }
}

//=========================================================================================
// Directory Reset
//=========================================================================================

/// Deletes every file and subdirectory under `path`, keeping `path` itself.
pub async fn clean_directory(path: &Path, cancel: &CancellationToken) -> SlideshowResult<()> {
    if !path.exists() {
        warn!(path = %path.display(), "Directory does not exist, nothing to clean");
        return Ok(());
    }

    info!(path = %path.display(), "Cleaning directory");
    let root = path.to_path_buf();
    let cancel = cancel.clone();
    run_blocking(move || {
        for entry in fs::read_dir(&root)? {
            ensure_active(&cancel)?;
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        info!(path = %root.display(), "Directory cleaned");
        Ok(())
    })
    .await
}

//=========================================================================================
// Unpacking
//=========================================================================================

/// Extracts `archive` into `target`, deletes the archive and flattens `target`.
///
/// A missing archive is a logged no-op. Files moved before a failure stay moved.
pub async fn unpack(archive: &Path, target: &Path, cancel: &CancellationToken) -> SlideshowResult<()> {
    if !archive.exists() {
        warn!(archive = %archive.display(), "Archive does not exist, nothing to unpack");
        return Ok(());
    }

    info!(archive = %archive.display(), "Processing archive");
    let archive = archive.to_path_buf();
    let target = target.to_path_buf();
    let cancel = cancel.clone();
    run_blocking(move || {
        extract_archive(&archive, &target, &cancel)?;
        fs::remove_file(&archive)?;
        let moved = flatten_directory(&target, &cancel)?;
        remove_subdirectories(&target)?;
        info!(moved, "Finished processing archive");
        Ok(())
    })
    .await
}

fn archive_error(err: zip::result::ZipError) -> SlideshowError {
    SlideshowError::Io(io::Error::new(io::ErrorKind::InvalidData, err))
}

fn extract_archive(archive: &Path, target: &Path, cancel: &CancellationToken) -> SlideshowResult<()> {
    let mut zip = ZipArchive::new(File::open(archive)?).map_err(archive_error)?;

    for index in 0..zip.len() {
        ensure_active(cancel)?;
        let mut entry = zip.by_index(index).map_err(archive_error)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(name = entry.name(), "Skipping archive entry with an unsafe path");
            continue;
        };
        let out_path = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
    }

    debug!(entries = zip.len(), "Extracted archive");
    Ok(())
}

//=========================================================================================
// Flattening
//=========================================================================================

fn is_metadata_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.eq_ignore_ascii_case(METADATA_ARTIFACT))
}

/// First free path for `file_name` in `root`: `name.ext`, then `name_1.ext`, `name_2.ext`, ...
fn unique_destination(root: &Path, file_name: &str) -> PathBuf {
    let candidate = root.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|counter| root.join(format!("{}_{}{}", stem, counter, extension)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(candidate)
}

/// Moves every nested file up into `root`, never overwriting. Returns the number moved.
pub fn flatten_directory(root: &Path, cancel: &CancellationToken) -> SlideshowResult<usize> {
    let nested = WalkDir::new(root)
        .min_depth(2)
        .sort_by_file_name()
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(io::Error::from)?;

    let mut moved = 0;
    for entry in nested.iter().filter(|e| e.file_type().is_file()) {
        ensure_active(cancel)?;
        if is_metadata_artifact(entry.path()) {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        let destination = unique_destination(root, &file_name);
        debug!(from = %entry.path().display(), to = %destination.display(), "Moving file");
        fs::rename(entry.path(), &destination)?;
        moved += 1;
    }
    Ok(moved)
}

fn remove_subdirectories(root: &Path) -> io::Result<()> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        }
    }
    Ok(())
}
