use chrono::NaiveDateTime;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::codec::{is_zip_file, Codec, EntryStat, OpenMode};
use crate::error::{Result, ZipError};
use crate::paths::{base_name, is_file_path, is_folder_path, is_safe_entry_path, to_folder_path};

use super::buffer::{BufferList, BufferedFile};
use super::index::EntryIndex;
use super::ingest::Inserter;

/// What the session's open archive is being used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// No archive open
    #[default]
    Unset,
    Reading,
    Writing,
}

impl Mode {
    fn name(self) -> &'static str {
        match self {
            Mode::Unset => "unset",
            Mode::Reading => "reading",
            Mode::Writing => "writing",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How [`ArchiveSession::set_archive`] picks the mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenHint {
    /// Create when missing, read when it is a ZIP, fail otherwise
    #[default]
    Auto,
    /// Only open an existing ZIP
    Read,
    /// Always create, truncating whatever is there
    Write,
}

/// A single open ZIP archive plus everything needed to work with it.
///
/// The session is either unset, reading or writing. Reading sessions list
/// and extract entries; writing sessions add files, folders and buffers.
/// Switching archives (or modes) closes the current one first, and closing
/// a writing session commits the Central Directory.
///
/// ```no_run
/// use zipkit::{ArchiveSession, BufferedFile, OpenHint};
///
/// # fn main() -> zipkit::Result<()> {
/// let mut zip = ArchiveSession::new();
/// zip.set_archive("notes.zip", OpenHint::Write)?;
/// zip.add_buffer(&BufferedFile::file("hello.txt", "hi"))?;
/// zip.add_path("docs", "docs")?;
/// zip.close()?;
///
/// let zip = ArchiveSession::open("notes.zip")?;
/// if let Some(index) = zip.find_index("hello.txt") {
///     let file = zip.extract_to_buffer(index)?;
///     assert_eq!(file.data.as_deref(), Some(&b"hi"[..]));
/// }
/// # Ok(())
/// # }
/// ```
pub struct ArchiveSession {
    codec: Option<Codec>,
    mode: Mode,
    archive_path: Option<PathBuf>,
    /// Explicit extraction target; falls back to the archive's folder
    output_folder: Option<PathBuf>,
    entries: EntryIndex,
    verbose: bool,
}

impl Default for ArchiveSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveSession {
    pub fn new() -> Self {
        Self {
            codec: None,
            mode: Mode::Unset,
            archive_path: None,
            output_folder: None,
            entries: EntryIndex::new(),
            verbose: false,
        }
    }

    /// Open `path` with [`OpenHint::Auto`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut session = Self::new();
        session.set_archive(path, OpenHint::Auto)?;
        Ok(session)
    }

    /// Open an archive held in memory for reading.
    pub fn from_buffer(bytes: Vec<u8>) -> Result<Self> {
        let mut session = Self::new();
        session.set_buffer(bytes)?;
        Ok(session)
    }

    /// Close the current archive (if any) and open `path`.
    ///
    /// On failure the session is left unset.
    pub fn set_archive(&mut self, path: impl AsRef<Path>, hint: OpenHint) -> Result<()> {
        let path = path.as_ref();
        self.close()?;

        let mode = match hint {
            OpenHint::Auto if !path.exists() => OpenMode::Write,
            OpenHint::Auto | OpenHint::Read => OpenMode::Read,
            OpenHint::Write => OpenMode::Write,
        };
        if mode == OpenMode::Read && !is_zip_file(path) {
            warn!("Not a ZIP archive: {}", path.display());
            return Err(ZipError::WrongPath(path.to_path_buf()));
        }

        let codec = Codec::open(path, mode).inspect_err(|e| {
            warn!("Failed to open {}: {e}", path.display());
        })?;

        match mode {
            OpenMode::Read => {
                self.entries.rebuild(&codec);
                self.mode = Mode::Reading;
            }
            OpenMode::Write => self.mode = Mode::Writing,
        }
        self.codec = Some(codec);
        self.archive_path = Some(path.to_path_buf());

        narrate!(
            self.verbose,
            "Opened {} ({}, {} items)",
            path.display(),
            self.mode,
            self.entries.len()
        );
        Ok(())
    }

    /// Close the current archive (if any) and read `bytes` as a ZIP.
    pub fn set_buffer(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.close()?;

        let codec = Codec::open_memory(bytes).inspect_err(|e| {
            warn!("Failed to open buffered archive: {e}");
        })?;
        self.entries.rebuild(&codec);
        self.codec = Some(codec);
        self.mode = Mode::Reading;

        narrate!(self.verbose, "Opened buffered archive ({} items)", self.entries.len());
        Ok(())
    }

    /// Where disk extraction goes. `None` restores the default: the folder
    /// containing the archive.
    pub fn set_output_folder(&mut self, folder: Option<PathBuf>) {
        self.output_folder = folder;
    }

    pub fn set_verbose(&mut self, enable: bool) {
        self.verbose = enable;
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Close the archive. A writing session commits its Central Directory
    /// first; the handle is released even if that fails.
    ///
    /// The output folder and verbosity are session settings and survive.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut codec) = self.codec.take() else {
            self.reset();
            return Ok(());
        };

        let result = if self.mode == Mode::Writing {
            codec.finalize()
        } else {
            Ok(())
        };
        codec.close();

        match &result {
            Ok(()) => narrate!(self.verbose, "Closed archive ({} items)", self.entries.len()),
            Err(e) => warn!("Failed to finalize archive: {e}"),
        }
        self.reset();
        result
    }

    fn reset(&mut self) {
        self.mode = Mode::Unset;
        self.archive_path = None;
        self.entries.clear();
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.mode != Mode::Unset
    }

    /// Path of the archive on disk; `None` for buffered archives
    pub fn archive_path(&self) -> Option<&Path> {
        self.archive_path.as_deref()
    }

    /// Extraction target: the explicit folder, else the archive's folder.
    pub fn output_folder(&self) -> Option<PathBuf> {
        if let Some(folder) = &self.output_folder {
            return Some(folder.clone());
        }
        let parent = self.archive_path.as_deref()?.parent()?;
        if parent.as_os_str().is_empty() {
            Some(PathBuf::from("."))
        } else {
            Some(parent.to_path_buf())
        }
    }

    fn require(&self, expected: Mode) -> Result<()> {
        if self.mode == expected {
            return Ok(());
        }
        let err = ZipError::WrongMode {
            expected: expected.name(),
            actual: self.mode.name(),
        };
        warn!("{err}");
        Err(err)
    }

    fn codec(&self) -> Result<&Codec> {
        self.codec.as_ref().ok_or(ZipError::WrongMode {
            expected: "open",
            actual: self.mode.name(),
        })
    }

    // ---- Entry queries ----

    /// Entry paths in index order
    pub fn contents(&self) -> &EntryIndex {
        &self.entries
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Index of `name`, or `None` if nothing matches.
    ///
    /// Exact paths win; a bare file name (no `/`) falls back to the first
    /// file entry with that name, in index order.
    pub fn find_index(&self, name: &str) -> Option<usize> {
        let found = self.entries.find(name);
        if found.is_none() {
            warn!("Entry not found: {name}");
        }
        found
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.entries.name(index)
    }

    pub fn is_folder(&self, index: usize) -> bool {
        self.name(index).is_some_and(is_folder_path)
    }

    pub fn is_file(&self, index: usize) -> bool {
        self.name(index).is_some_and(is_file_path)
    }

    pub fn stat(&self, index: usize) -> Option<EntryStat> {
        self.codec.as_ref()?.stat(index)
    }

    pub fn size_compressed(&self, index: usize) -> Option<u64> {
        self.stat(index).map(|s| s.compressed_size)
    }

    pub fn size_uncompressed(&self, index: usize) -> Option<u64> {
        self.stat(index).map(|s| s.uncompressed_size)
    }

    /// Space needed to extract everything
    pub fn total_size_uncompressed(&self) -> u64 {
        (0..self.count())
            .filter_map(|index| self.size_uncompressed(index))
            .sum()
    }

    pub fn last_modified(&self, index: usize) -> Option<NaiveDateTime> {
        self.stat(index)?.modified
    }

    // ---- Insertion (writing mode) ----

    fn inserter(&mut self) -> Result<Inserter<'_>> {
        self.require(Mode::Writing)?;
        let codec = self.codec.as_mut().ok_or(ZipError::WrongMode {
            expected: "writing",
            actual: "closed",
        })?;
        Ok(Inserter::new(
            codec,
            &mut self.entries,
            self.archive_path.as_deref(),
            self.verbose,
        ))
    }

    /// Add a file or a whole folder from disk as `entry_path`.
    ///
    /// An empty `entry_path` uses the item's own name. A file that is
    /// already in the archive is rejected. A folder is added recursively on
    /// a best-effort basis and succeeds if anything new was added.
    pub fn add_path(&mut self, fs_path: impl AsRef<Path>, entry_path: &str) -> Result<()> {
        self.require(Mode::Writing)?;
        let fs_path = fs_path.as_ref();
        let metadata = match fs::symlink_metadata(fs_path) {
            Ok(metadata) if !metadata.file_type().is_symlink() => metadata,
            _ => {
                warn!("Wrong path: {}", fs_path.display());
                return Err(ZipError::WrongPath(fs_path.to_path_buf()));
            }
        };

        let entry_path = if entry_path.is_empty() {
            fs_path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| ZipError::WrongPath(fs_path.to_path_buf()))?
                .to_string()
        } else {
            entry_path.to_string()
        };

        let mut inserter = self.inserter()?;

        if metadata.is_file() {
            if inserter.is_own_archive(fs_path) {
                warn!("Cannot add an archive to itself: {}", fs_path.display());
                return Err(ZipError::WrongPath(fs_path.to_path_buf()));
            }
            return inserter.add_file(fs_path, &entry_path).inspect_err(|e| {
                warn!("Failed to add {}: {e}", fs_path.display());
            });
        }
        if !metadata.is_dir() {
            warn!("Unsupported file type: {}", fs_path.display());
            return Err(ZipError::WrongPath(fs_path.to_path_buf()));
        }

        let added = inserter.add_tree(fs_path, &entry_path);
        narrate!(self.verbose, "Added {added} items from {}", fs_path.display());
        if added == 0 {
            return Err(ZipError::Duplicate(to_folder_path(&entry_path)));
        }
        Ok(())
    }

    fn add_buffer_parts(
        &mut self,
        name: &str,
        data: Option<&[u8]>,
        modified: Option<NaiveDateTime>,
    ) -> Result<()> {
        self.require(Mode::Writing)?;
        if name.is_empty() {
            return Err(ZipError::NoInputData);
        }
        let mut inserter = self.inserter()?;
        let result = if is_folder_path(name) {
            inserter.add_folder(name, modified)
        } else {
            inserter.add_bytes(name, data.unwrap_or_default(), modified)
        };
        result.inspect_err(|e| warn!("Failed to add {name}: {e}"))
    }

    /// Add an in-memory file, or a folder when the name ends with `/`.
    pub fn add_buffer(&mut self, file: &BufferedFile) -> Result<()> {
        self.add_buffer_parts(&file.name, file.data.as_deref(), file.modified)
    }

    /// Add every `{ path : data }` pair, stopping at the first failure.
    pub fn add_buffers(&mut self, list: &BufferList) -> Result<()> {
        self.require(Mode::Writing)?;
        if list.is_empty() {
            warn!("No input data");
            return Err(ZipError::NoInputData);
        }
        for (name, data) in list {
            self.add_buffer_parts(name, Some(data), None)?;
        }
        Ok(())
    }

    // ---- Extraction (reading mode) ----

    fn require_output_folder(&self) -> Result<PathBuf> {
        self.output_folder().ok_or_else(|| {
            warn!("No output folder provided");
            ZipError::WrongPath(PathBuf::new())
        })
    }

    fn entry_name(&self, index: usize) -> Result<&str> {
        self.entries.name(index).ok_or_else(|| {
            warn!("Invalid index: {index}");
            ZipError::InvalidIndex(index)
        })
    }

    /// Write entry `index` (named `name`) to exactly `output_path`.
    fn write_entry(&self, index: usize, name: &str, output_path: &Path) -> Result<()> {
        let result = if is_folder_path(name) {
            create_folder(output_path)
        } else {
            match output_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => create_folder(parent)?,
                _ => {}
            }
            self.codec()?.extract_to_file(index, output_path)
        };
        result.inspect_err(|e| warn!("Failed to extract {name}: {e}"))
    }

    /// Extract every entry into the output folder, keeping full paths.
    ///
    /// Stops at the first failure; whatever was written up to that point
    /// stays on disk.
    pub fn extract_all(&self) -> Result<()> {
        self.require(Mode::Reading)?;
        if self.entries.is_empty() {
            warn!("No files to extract");
            return Err(ZipError::NoInputData);
        }
        let output_folder = self.require_output_folder()?;
        create_folder(&output_folder)?;

        let total = self.entries.len();
        narrate!(
            self.verbose,
            "Extracting {total} items to: {}",
            output_folder.display()
        );

        for (index, name) in self.entries.iter() {
            narrate!(self.verbose, "Extracting: {}/{total} {name}", index + 1);
            let target = entry_target(&output_folder, name)?;
            if let Err(e) = self.write_entry(index, name, &target) {
                narrate!(self.verbose, "Unzip failed.");
                return Err(e);
            }
        }

        narrate!(self.verbose, "Unzip complete.");
        Ok(())
    }

    /// Extract entry `index` to exactly `output_path`.
    ///
    /// A folder entry just makes sure the directory exists.
    pub fn extract_index(&self, index: usize, output_path: impl AsRef<Path>) -> Result<()> {
        self.require(Mode::Reading)?;
        let name = self.entry_name(index)?;
        narrate!(self.verbose, "Extracting: {name}");
        self.write_entry(index, name, output_path.as_ref())
    }

    /// Extract entry `index` into the output folder, under its full path
    /// (`recreate_path`) or just its own name.
    pub fn extract_index_here(&self, index: usize, recreate_path: bool) -> Result<()> {
        self.require(Mode::Reading)?;
        let name = self.entry_name(index)?;
        let output_folder = self.require_output_folder()?;

        let target = if recreate_path {
            entry_target(&output_folder, name)?
        } else {
            entry_target(&output_folder, base_name(name))?
        };
        narrate!(self.verbose, "Extracting: {name}");
        self.write_entry(index, name, &target)
    }

    /// [`find_index`](Self::find_index) then
    /// [`extract_index_here`](Self::extract_index_here).
    pub fn extract_file(&self, name: &str, recreate_path: bool) -> Result<()> {
        let index = self
            .find_index(name)
            .ok_or_else(|| ZipError::NotFound(name.to_string()))?;
        self.extract_index_here(index, recreate_path)
    }

    /// Extract the contents of folder entry `index` into `output_path`,
    /// dropping the folder's own prefix (`a/sub/x.txt` lands at
    /// `output_path/x.txt`).
    pub fn extract_folder(&self, index: usize, output_path: impl AsRef<Path>) -> Result<()> {
        self.require(Mode::Reading)?;
        let output_path = output_path.as_ref();
        let folder = self.entry_name(index)?;
        if !is_folder_path(folder) {
            warn!("Not a folder: {folder}");
            return Err(ZipError::WrongPath(PathBuf::from(folder)));
        }

        create_folder(output_path)?;
        narrate!(
            self.verbose,
            "Extracting folder {folder} to: {}",
            output_path.display()
        );

        for (member, name) in self.entries.iter() {
            let Some(rel) = name.strip_prefix(folder) else {
                continue;
            };
            if rel.is_empty() {
                continue;
            }
            narrate!(self.verbose, "Extracting: {name}");
            let target = entry_target(output_path, rel)?;
            self.write_entry(member, name, &target)?;
        }
        Ok(())
    }

    /// Entry `index` as a [`BufferedFile`]; folders come back with `data: None`.
    pub fn extract_to_buffer(&self, index: usize) -> Result<BufferedFile> {
        self.require(Mode::Reading)?;
        let name = self.entry_name(index)?;
        let modified = self.last_modified(index);

        let data = if is_folder_path(name) {
            None
        } else {
            let bytes = self
                .codec()?
                .extract_to_bytes(index)
                .inspect_err(|e| warn!("Failed to extract {name}: {e}"))?;
            Some(bytes)
        };

        Ok(BufferedFile {
            name: name.to_string(),
            data,
            modified,
        })
    }

    /// Every entry as a [`BufferedFile`], in index order. Stops at the first failure.
    pub fn extract_all_to_buffer(&self) -> Result<Vec<BufferedFile>> {
        self.require(Mode::Reading)?;
        if self.entries.is_empty() {
            warn!("No files to extract");
            return Err(ZipError::NoInputData);
        }

        let total = self.entries.len();
        let mut files = Vec::with_capacity(total);
        for index in 0..total {
            narrate!(self.verbose, "Extracting: {}/{total}", index + 1);
            files.push(self.extract_to_buffer(index)?);
        }
        Ok(files)
    }

    /// [`find_index`](Self::find_index) then
    /// [`extract_to_buffer`](Self::extract_to_buffer).
    pub fn extract_file_to_buffer(&self, name: &str) -> Result<BufferedFile> {
        let index = self
            .find_index(name)
            .ok_or_else(|| ZipError::NotFound(name.to_string()))?;
        self.extract_to_buffer(index)
    }

    /// Uncompressed bytes of entry `index` (empty for folders).
    pub fn extract_data(&self, index: usize) -> Result<Vec<u8>> {
        self.require(Mode::Reading)?;
        self.entry_name(index)?;
        self.codec()?.extract_to_bytes(index)
    }
}

impl Drop for ArchiveSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error while closing archive: {e}");
        }
    }
}

/// `base` joined with an entry name, refusing names that would escape `base`.
fn entry_target(base: &Path, name: &str) -> Result<PathBuf> {
    if !is_safe_entry_path(name) {
        warn!("Refusing unsafe entry path: {name}");
        return Err(ZipError::UnsafePath(name.to_string()));
    }
    Ok(base.join(name.trim_end_matches('/')))
}

fn create_folder(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| {
        warn!("Failed to create directory {}: {e}", path.display());
        ZipError::Io(e)
    })
}
