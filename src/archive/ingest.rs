//! Turning filesystem items into archive entries.
//!
//! [`Inserter`] borrows the session's codec and entry index for the duration
//! of one insertion call, so the duplicate check, the codec add and the index
//! update always happen together and in that order.

use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::codec::{local_naive, Codec};
use crate::error::{Result, ZipError};
use crate::paths::{join_path, to_entry_path, to_folder_path};

use super::index::EntryIndex;

fn modified_time(path: &Path) -> Option<NaiveDateTime> {
    fs::symlink_metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(local_naive)
}

pub(crate) struct Inserter<'a> {
    codec: &'a mut Codec,
    entries: &'a mut EntryIndex,
    /// Canonical path of the archive being written, never stored in itself
    own_archive: Option<PathBuf>,
    verbose: bool,
}

impl<'a> Inserter<'a> {
    pub(crate) fn new(
        codec: &'a mut Codec,
        entries: &'a mut EntryIndex,
        archive_path: Option<&Path>,
        verbose: bool,
    ) -> Self {
        Self {
            codec,
            entries,
            own_archive: archive_path.and_then(|path| fs::canonicalize(path).ok()),
            verbose,
        }
    }

    /// Is `path` the archive this inserter is writing into?
    pub(crate) fn is_own_archive(&self, path: &Path) -> bool {
        let Some(own) = &self.own_archive else {
            return false;
        };
        own.file_name() == path.file_name()
            && fs::canonicalize(path).is_ok_and(|path| &path == own)
    }

    fn reserve(&self, entry_path: &str) -> Result<()> {
        if self.entries.contains(entry_path) {
            return Err(ZipError::Duplicate(entry_path.to_string()));
        }
        narrate!(self.verbose, "Adding: {entry_path}");
        Ok(())
    }

    fn commit(&mut self, entry_path: &str) {
        let inserted = self.entries.insert(entry_path);
        debug_assert!(inserted, "entry index out of sync with codec");
    }

    /// Add the file at `fs_path` as `entry_path`.
    pub(crate) fn add_file(&mut self, fs_path: &Path, entry_path: &str) -> Result<()> {
        self.reserve(entry_path)?;
        self.codec.add_file(entry_path, fs_path)?;
        self.commit(entry_path);
        Ok(())
    }

    /// Add a zero-length folder entry at `to_folder_path(entry_path)`.
    pub(crate) fn add_folder(
        &mut self,
        entry_path: &str,
        modified: Option<NaiveDateTime>,
    ) -> Result<()> {
        let folder = to_folder_path(entry_path);
        self.reserve(&folder)?;
        self.codec.add_bytes(&folder, &[], modified)?;
        self.commit(&folder);
        Ok(())
    }

    /// Add an in-memory payload as file entry `entry_path`.
    pub(crate) fn add_bytes(
        &mut self,
        entry_path: &str,
        data: &[u8],
        modified: Option<NaiveDateTime>,
    ) -> Result<()> {
        self.reserve(entry_path)?;
        self.codec.add_bytes(entry_path, data, modified)?;
        self.commit(entry_path);
        Ok(())
    }

    /// Add the directory `fs_root` and everything below it under `entry_root`.
    ///
    /// Best effort: duplicates and per-item failures are logged and skipped.
    /// Symlinks are never followed or stored, nor is the archive itself when
    /// it lives inside `fs_root`. Returns how many entries were
    /// newly added, the root folder entry included.
    pub(crate) fn add_tree(&mut self, fs_root: &Path, entry_root: &str) -> usize {
        let mut added = 0;
        let modified = modified_time(fs_root);
        tally(self.add_folder(entry_root, modified), &mut added);

        for item in WalkDir::new(fs_root).min_depth(1).follow_links(false) {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    warn!("Skipped unreadable item: {e}");
                    continue;
                }
            };

            let file_type = item.file_type();
            if file_type.is_symlink() {
                debug!(path = %item.path().display(), "skipping symlink");
                continue;
            }

            let Some(rel) = item
                .path()
                .strip_prefix(fs_root)
                .ok()
                .and_then(to_entry_path)
            else {
                warn!("Skipped: {} (not representable as an entry name)", item.path().display());
                continue;
            };
            let target = join_path(entry_root, &rel);

            let result = if file_type.is_dir() {
                self.add_folder(&target, modified_time(item.path()))
            } else if file_type.is_file() {
                if self.is_own_archive(item.path()) {
                    debug!(path = %item.path().display(), "skipping the archive being written");
                    continue;
                }
                self.add_file(item.path(), &target)
            } else {
                debug!(path = %item.path().display(), "skipping special file");
                continue;
            };
            tally(result, &mut added);
        }

        added
    }
}

fn tally(result: Result<()>, added: &mut usize) {
    match result {
        Ok(()) => *added += 1,
        Err(ZipError::Duplicate(path)) => debug!("Skipped existing entry: {path}"),
        Err(e) => warn!("Failed to add item: {e}"),
    }
}
