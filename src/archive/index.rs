use std::collections::HashMap;

use crate::codec::Codec;
use crate::paths::{base_name, is_file_path};

/// Insertion-ordered mapping from entry path to codec index.
///
/// The position of a path in `order` is its index in the archive, so the
/// two must only ever grow together, and only right after the codec has
/// accepted the entry.
#[derive(Debug, Default, Clone)]
pub struct EntryIndex {
    order: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl EntryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repopulate from the codec's entry table.
    ///
    /// Stops at the first entry with an empty name rather than trusting the
    /// declared count. Should an archive contain the same path twice, lookups
    /// resolve to the first occurrence.
    pub fn rebuild(&mut self, codec: &Codec) {
        self.clear();
        for index in 0..codec.entry_count() {
            let Some(stat) = codec.stat(index) else { break };
            if stat.path.is_empty() {
                break;
            }
            self.lookup.entry(stat.path.clone()).or_insert(index);
            self.order.push(stat.path);
        }
    }

    /// Append `path` at the next index. Returns `false` (and changes
    /// nothing) if the path is already present.
    pub fn insert(&mut self, path: &str) -> bool {
        if self.lookup.contains_key(path) {
            return false;
        }
        self.lookup.insert(path.to_string(), self.order.len());
        self.order.push(path.to_string());
        true
    }

    /// Index of `name`.
    ///
    /// An exact match wins. A bare name (no `/`) without an exact match
    /// falls back to the first *file* entry, in index order, whose last path
    /// segment equals it; ambiguity is not reported.
    pub fn find(&self, name: &str) -> Option<usize> {
        if let Some(&index) = self.lookup.get(name) {
            return Some(index);
        }
        if name.is_empty() || name.contains('/') {
            return None;
        }
        self.order
            .iter()
            .position(|path| is_file_path(path) && base_name(path) == name)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup.contains_key(path)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.order.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.lookup.clear();
    }

    /// `(index, path)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.order.iter().map(String::as_str).enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::ZipWriter;

    fn index_of(paths: &[&str]) -> EntryIndex {
        let mut index = EntryIndex::new();
        for path in paths {
            assert!(index.insert(path));
        }
        index
    }

    #[test]
    fn insert_assigns_dense_indices_and_rejects_duplicates() {
        let mut index = index_of(&["a/", "a/x.txt"]);
        assert!(!index.insert("a/x.txt"));
        assert!(index.insert("b.txt"));

        assert_eq!(index.len(), 3);
        assert_eq!(index.find("a/"), Some(0));
        assert_eq!(index.find("a/x.txt"), Some(1));
        assert_eq!(index.find("b.txt"), Some(2));
        assert_eq!(index.name(2), Some("b.txt"));
    }

    #[test]
    fn bare_name_falls_back_to_first_file_match() {
        let index = index_of(&["docs/", "one/readme.md", "two/readme.md", "readme/"]);

        assert_eq!(index.find("readme.md"), Some(1));
        // folders never satisfy the fallback
        assert_eq!(index.find("docs"), None);
        assert_eq!(index.find("readme"), None);
        // a query with a separator is exact-only
        assert_eq!(index.find("x/readme.md"), None);
        assert_eq!(index.find(""), None);
    }

    #[test]
    fn exact_match_beats_fallback() {
        let index = index_of(&["sub/a.txt", "a.txt"]);
        assert_eq!(index.find("a.txt"), Some(1));
    }

    #[test]
    fn rebuild_mirrors_codec_order() {
        let mut writer = ZipWriter::new(Vec::new());
        for name in ["root/", "root/b.txt", "root/a.txt"] {
            writer.add_entry(name, b"", None).unwrap();
        }
        let codec = Codec::open_memory(writer.finish().unwrap()).unwrap();

        let mut index = index_of(&["stale.txt"]);
        index.rebuild(&codec);

        let listed: Vec<_> = index.iter().collect();
        assert_eq!(
            listed,
            vec![(0, "root/"), (1, "root/b.txt"), (2, "root/a.txt")]
        );
        assert!(!index.contains("stale.txt"));
    }
}
