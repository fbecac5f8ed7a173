use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::paths::{is_folder_path, to_folder_path};

/// `{ entry path : data }`, iterated in path order
pub type BufferList = BTreeMap<String, Vec<u8>>;

/// One archive entry held in memory.
///
/// A file entry carries `Some(data)` (possibly empty). A folder entry has a
/// name ending in `/` and `data == None`, which keeps it distinguishable
/// from an empty file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedFile {
    /// Path inside the archive
    pub name: String,
    /// Uncompressed contents; `None` for folders
    pub data: Option<Vec<u8>>,
    /// Last modification time; `None` means "now" when writing and
    /// "unknown" when reading
    pub modified: Option<NaiveDateTime>,
}

impl BufferedFile {
    pub fn file(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: Some(data.into()),
            modified: None,
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: to_folder_path(&name.into()),
            data: None,
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: NaiveDateTime) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn is_folder(&self) -> bool {
        is_folder_path(&self.name)
    }

    /// Payload length; folders count as zero
    pub fn size(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folders_and_empty_files_differ() {
        let folder = BufferedFile::folder("sub");
        let empty = BufferedFile::file("empty.txt", Vec::new());

        assert_eq!(folder.name, "sub/");
        assert!(folder.is_folder());
        assert_eq!(folder.data, None);

        assert!(!empty.is_folder());
        assert_eq!(empty.data, Some(Vec::new()));
        assert_eq!(folder.size(), empty.size());
    }

    #[test]
    fn default_is_invalid() {
        assert!(!BufferedFile::default().is_valid());
        assert!(BufferedFile::file("a", "b").is_valid());
    }
}
