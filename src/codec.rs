//! Handle-based adapter over the ZIP codec.
//!
//! A [`Codec`] owns exactly one open archive, either for reading (a parsed
//! Central Directory over a file or memory buffer) or for writing (a
//! [`ZipWriter`] over a new file). The archive session drives it through a
//! small set of operations and never touches the binary format directly.

use chrono::{DateTime, Local, NaiveDateTime};
use std::fs::{self, File};
use std::io::{BufWriter, Read};
use std::mem;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

use crate::error::{Result, ZipError};
use crate::io::{LocalFileReader, MemoryReader, ReadAt};
use crate::zip::{ZipExtractor, ZipFileEntry, ZipWriter};

/// Leading bytes of every ZIP archive (local header, or EOCD when empty)
pub const ZIP_SIGNATURE: &[u8] = b"PK";

/// How [`Codec::open`] should open a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

/// Per-entry metadata reported by [`Codec::stat`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStat {
    pub path: String,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// `None` when the archive does not record a usable timestamp
    pub modified: Option<NaiveDateTime>,
}

impl From<&ZipFileEntry> for EntryStat {
    fn from(entry: &ZipFileEntry) -> Self {
        Self {
            path: entry.file_name.clone(),
            compressed_size: entry.compressed_size,
            uncompressed_size: entry.uncompressed_size,
            modified: entry.modified(),
        }
    }
}

enum Handle {
    Reading(ZipExtractor<dyn ReadAt>),
    Writing(ZipWriter<BufWriter<File>>),
    /// Central Directory written; entries kept for queries until close
    Finalized(Vec<ZipFileEntry>),
    Closed,
}

impl Handle {
    fn name(&self) -> &'static str {
        match self {
            Handle::Reading(_) => "reading",
            Handle::Writing(_) => "writing",
            Handle::Finalized(_) => "finalized",
            Handle::Closed => "closed",
        }
    }
}

pub struct Codec {
    handle: Handle,
}

impl Codec {
    /// Open `path` for reading or (truncating) writing.
    ///
    /// Reading requires an existing file that starts with the ZIP signature;
    /// anything else is [`ZipError::WrongPath`].
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let handle = match mode {
            OpenMode::Read => {
                if !is_zip_file(path) {
                    return Err(ZipError::WrongPath(path.to_path_buf()));
                }
                let reader: Arc<dyn ReadAt> = Arc::new(LocalFileReader::new(path)?);
                Handle::Reading(ZipExtractor::open(reader)?)
            }
            OpenMode::Write => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                Handle::Writing(ZipWriter::new(BufWriter::new(File::create(path)?)))
            }
        };

        debug!(path = %path.display(), ?mode, "opened archive");
        Ok(Self { handle })
    }

    /// Open an archive held in memory (read-only).
    pub fn open_memory(bytes: Vec<u8>) -> Result<Self> {
        if !is_archive(&bytes) {
            return Err(ZipError::NotAnArchive);
        }
        let size = bytes.len();
        let reader: Arc<dyn ReadAt> = Arc::new(MemoryReader::new(bytes));
        let handle = Handle::Reading(ZipExtractor::open(reader)?);

        debug!(size, "opened in-memory archive");
        Ok(Self { handle })
    }

    pub fn is_reading(&self) -> bool {
        matches!(self.handle, Handle::Reading(_))
    }

    pub fn is_writing(&self) -> bool {
        matches!(self.handle, Handle::Writing(_))
    }

    fn entries(&self) -> &[ZipFileEntry] {
        match &self.handle {
            Handle::Reading(extractor) => extractor.entries(),
            Handle::Writing(writer) => writer.entries(),
            Handle::Finalized(entries) => entries,
            Handle::Closed => &[],
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries().len()
    }

    /// Metadata of entry `index`; `None` for an out-of-range index.
    pub fn stat(&self, index: usize) -> Option<EntryStat> {
        self.entries().get(index).map(EntryStat::from)
    }

    fn wrong_mode(&self, expected: &'static str) -> ZipError {
        ZipError::WrongMode {
            expected,
            actual: self.handle.name(),
        }
    }

    fn writer(&mut self) -> Result<&mut ZipWriter<BufWriter<File>>> {
        let actual = self.handle.name();
        match &mut self.handle {
            Handle::Writing(writer) => Ok(writer),
            _ => Err(ZipError::WrongMode {
                expected: "writing",
                actual,
            }),
        }
    }

    fn extractor(&self) -> Result<&ZipExtractor<dyn ReadAt>> {
        match &self.handle {
            Handle::Reading(extractor) => Ok(extractor),
            _ => Err(self.wrong_mode("reading")),
        }
    }

    /// Add the file at `source` as entry `entry_path`, keeping its mtime.
    pub fn add_file(&mut self, entry_path: &str, source: &Path) -> Result<()> {
        let writer = self.writer()?;

        let mut file = File::open(source)?;
        let metadata = file.metadata()?;
        let modified = metadata.modified().ok().map(local_naive);

        let mut data = Vec::with_capacity(metadata.len() as usize);
        file.read_to_end(&mut data)?;

        writer.add_entry(entry_path, &data, modified)
    }

    /// Add `data` as entry `entry_path`; `modified == None` means "now".
    pub fn add_bytes(
        &mut self,
        entry_path: &str,
        data: &[u8],
        modified: Option<NaiveDateTime>,
    ) -> Result<()> {
        self.writer()?.add_entry(entry_path, data, modified)
    }

    fn entry(&self, index: usize) -> Result<(&ZipExtractor<dyn ReadAt>, &ZipFileEntry)> {
        let extractor = self.extractor()?;
        let entry = extractor
            .entry(index)
            .ok_or(ZipError::InvalidIndex(index))?;
        Ok((extractor, entry))
    }

    pub fn extract_to_file(&self, index: usize, output_path: &Path) -> Result<()> {
        let (extractor, entry) = self.entry(index)?;
        extractor.extract_to_file(entry, output_path)
    }

    pub fn extract_to_bytes(&self, index: usize) -> Result<Vec<u8>> {
        let (extractor, entry) = self.entry(index)?;
        extractor.extract_to_memory(entry)
    }

    /// Write the Central Directory. Only meaningful in writing mode; a
    /// writer that is closed without this produces an unreadable file.
    pub fn finalize(&mut self) -> Result<()> {
        match mem::replace(&mut self.handle, Handle::Closed) {
            Handle::Writing(writer) => {
                let entries = writer.entries().to_vec();
                writer.finish()?;
                debug!(entries = entries.len(), "finalized archive");
                self.handle = Handle::Finalized(entries);
                Ok(())
            }
            other => {
                self.handle = other;
                Err(self.wrong_mode("writing"))
            }
        }
    }

    /// Release the handle. Closing twice is a no-op.
    pub fn close(&mut self) {
        if !matches!(self.handle, Handle::Closed) {
            debug!(state = self.handle.name(), "closing archive");
        }
        self.handle = Handle::Closed;
    }
}

/// Filesystem timestamp as the local wall-clock time ZIP stores
pub(crate) fn local_naive(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

/// Cheap signature check: does `data` start with `"PK"`?
///
/// A corrupt archive with an intact header still passes.
pub fn is_archive(data: &[u8]) -> bool {
    data.starts_with(ZIP_SIGNATURE)
}

/// Does `path` name an existing file that starts with the ZIP signature?
pub fn is_zip_file(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut signature = [0u8; 2];
    file.read_exact(&mut signature).is_ok() && is_archive(&signature)
}
