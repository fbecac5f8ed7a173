//! One-shot operations built on a transient [`ArchiveSession`].
//!
//! Each function opens a session, runs one batch and closes it again.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, ZipError};

use super::buffer::BufferList;
use super::session::{ArchiveSession, OpenHint};

/// Extension appended to default archive names
pub const ZIP_EXTENSION: &str = ".zip";

fn file_name(path: &Path) -> Result<String> {
    let resolved;
    let path = if path.file_name().is_some() {
        path
    } else {
        resolved = fs::canonicalize(path)?;
        resolved.as_path()
    };
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| ZipError::WrongPath(path.to_path_buf()))
}

fn parent_folder(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    absolute
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| ZipError::WrongPath(path.to_path_buf()))
}

/// `<parent>/<name>.zip` next to `path`
pub fn default_zip_path(path: &Path) -> Result<PathBuf> {
    let name = file_name(path)?;
    Ok(parent_folder(path)?.join(format!("{name}{ZIP_EXTENSION}")))
}

/// `<parent>/<parent name>.zip` for items sharing the parent of `paths[0]`
pub fn default_list_zip_path<P: AsRef<Path>>(paths: &[P]) -> Result<PathBuf> {
    let first = paths.first().ok_or(ZipError::NoInputData)?.as_ref();
    let root = parent_folder(first)?;
    let name = file_name(&root)?;
    Ok(root.join(format!("{name}{ZIP_EXTENSION}")))
}

/// Extract `zip_path` into the folder that contains it.
pub fn extract(zip_path: impl AsRef<Path>) -> Result<()> {
    let zip_path = zip_path.as_ref();
    extract_to(zip_path, parent_folder(zip_path)?)
}

/// Extract `zip_path` into `output_folder`, creating it if needed.
pub fn extract_to(zip_path: impl AsRef<Path>, output_folder: impl AsRef<Path>) -> Result<()> {
    let zip_path = zip_path.as_ref();
    let output_folder = output_folder.as_ref();
    info!(
        "Extract: {} -> {}",
        zip_path.display(),
        output_folder.display()
    );

    let mut session = ArchiveSession::new();
    session.set_archive(zip_path, OpenHint::Read)?;
    session.set_output_folder(Some(output_folder.to_path_buf()));
    session.extract_all()?;
    session.close()
}

/// Compress a file or folder into `<path>.zip` beside it.
pub fn compress(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    compress_to(path, default_zip_path(path)?)
}

/// Compress a file or folder into `zip_path`. The item keeps its own name
/// as the top-level entry.
pub fn compress_to(path: impl AsRef<Path>, zip_path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let zip_path = zip_path.as_ref();
    if fs::symlink_metadata(path).is_err() {
        warn!("Not found: {}", path.display());
        return Err(ZipError::WrongPath(path.to_path_buf()));
    }
    info!("Zipping: {} -> {}", path.display(), zip_path.display());

    let name = file_name(path)?;
    write_archive(zip_path, |session| session.add_path(path, &name))
}

/// Compress items that share one parent folder into
/// `<parent>/<parent name>.zip`.
pub fn compress_here<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    compress_list(paths, default_list_zip_path(paths)?)
}

/// Compress several files and folders into `zip_path`.
///
/// All items must live in the same folder. Missing items and symlinks are
/// skipped, as is anything that fails to add; the call fails only when
/// nothing at all made it into the archive.
pub fn compress_list<P: AsRef<Path>>(paths: &[P], zip_path: impl AsRef<Path>) -> Result<()> {
    let zip_path = zip_path.as_ref();
    let first = paths.first().ok_or(ZipError::NoInputData)?.as_ref();
    let root = parent_folder(first)?;

    for path in paths {
        let path = path.as_ref();
        if parent_folder(path)? != root {
            warn!("All items must be in the same folder: {}", path.display());
            return Err(ZipError::WrongPath(path.to_path_buf()));
        }
    }

    info!("Zipping {} items -> {}", paths.len(), zip_path.display());

    write_archive(zip_path, |session| {
        let mut added = 0usize;
        for path in paths {
            let path = path.as_ref();
            match fs::symlink_metadata(path) {
                Ok(meta) if !meta.file_type().is_symlink() => {}
                _ => {
                    warn!("Skipped: {}", path.display());
                    continue;
                }
            }
            let Ok(name) = file_name(path) else {
                warn!("Skipped: {}", path.display());
                continue;
            };
            if session.add_path(path, &name).is_ok() {
                added += 1;
            }
        }

        if added == 0 {
            return Err(ZipError::NoInputData);
        }
        Ok(())
    })
}

/// Create `zip_path` from `{ entry path : data }` pairs.
pub fn compress_buffers(list: &BufferList, zip_path: impl AsRef<Path>) -> Result<()> {
    if list.is_empty() {
        return Err(ZipError::NoInputData);
    }
    let zip_path = zip_path.as_ref();
    info!("Zipping {} buffers -> {}", list.len(), zip_path.display());
    write_archive(zip_path, |session| session.add_buffers(list))
}

/// Create `zip_path` holding a single file entry.
pub fn compress_buffer(
    data: impl Into<Vec<u8>>,
    entry_name: &str,
    zip_path: impl AsRef<Path>,
) -> Result<()> {
    let list = BufferList::from([(entry_name.to_string(), data.into())]);
    compress_buffers(&list, zip_path)
}

/// Run `fill` against a fresh writing session for `zip_path` and close it.
/// A failed batch removes the half-written archive.
fn write_archive<F>(zip_path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut ArchiveSession) -> Result<()>,
{
    let mut session = ArchiveSession::new();
    session.set_archive(zip_path, OpenHint::Write)?;

    let filled = fill(&mut session);
    let closed = session.close();

    if let Err(e) = filled.and(closed) {
        if let Err(remove_err) = fs::remove_file(zip_path) {
            warn!(
                "Failed to remove incomplete archive {}: {remove_err}",
                zip_path.display()
            );
        }
        return Err(e);
    }

    info!("Done: {}", zip_path.display());
    Ok(())
}
