//! Path helpers for archive entry names.
//!
//! Entry names inside a ZIP archive always use `/` as the separator, and a
//! trailing `/` is the only thing that marks an entry as a folder. These
//! helpers are pure functions over strings; nothing here touches the disk.

use std::path::{Component, Path};

/// Separator used inside archive entry names.
pub const SEPARATOR: char = '/';

fn is_separator(ch: char) -> bool {
    ch == '/' || ch == '\\'
}

/// Returns `true` if `path` names a folder entry (non-empty, ends with `/`).
pub fn is_folder_path(path: &str) -> bool {
    !path.is_empty() && path.ends_with(SEPARATOR)
}

/// Returns `true` if `path` names a file entry (non-empty, no trailing `/`).
pub fn is_file_path(path: &str) -> bool {
    !path.is_empty() && !path.ends_with(SEPARATOR)
}

/// Appends a trailing `/` unless `path` already is in folder form.
pub fn to_folder_path(path: &str) -> String {
    if path.ends_with(SEPARATOR) {
        path.to_string()
    } else {
        format!("{path}{SEPARATOR}")
    }
}

/// Joins two path fragments with exactly one separator between them.
///
/// Either side may already carry a separator (`/` or `\`) at the seam; a
/// doubled separator collapses to one and a single one is kept as-is. No
/// `.`/`..` normalization is performed.
///
/// ```
/// use zipkit::paths::join_path;
///
/// assert_eq!(join_path("out", "a.txt"), "out/a.txt");
/// assert_eq!(join_path("out/", "/a.txt"), "out/a.txt");
/// assert_eq!(join_path("out/", "a.txt"), "out/a.txt");
/// ```
pub fn join_path(base: &str, rel: &str) -> String {
    let base_ends = base.chars().next_back().is_some_and(is_separator);
    let rel_starts = rel.chars().next().is_some_and(is_separator);

    match (base_ends, rel_starts) {
        (true, true) => format!("{}{}", &base[..base.len() - 1], rel),
        (true, false) | (false, true) => format!("{base}{rel}"),
        (false, false) => format!("{base}{SEPARATOR}{rel}"),
    }
}

/// Last segment of an entry name, ignoring a trailing `/` on folders.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.strip_suffix(SEPARATOR).unwrap_or(path);
    match trimmed.rfind(SEPARATOR) {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// Converts a relative filesystem path into entry-name form (`/` separated).
///
/// Returns `None` if the path is not valid UTF-8 or contains components that
/// cannot appear in an entry name (root, prefix, `..`).
pub fn to_entry_path(rel: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Checks that an entry name stays inside whatever folder it is extracted to.
///
/// Absolute names, drive prefixes and `..` segments are rejected.
pub fn is_safe_entry_path(path: &str) -> bool {
    if path.starts_with(is_separator) {
        return false;
    }
    path.split(is_separator).all(|segment| segment != "..")
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn classifies_folders_and_files() {
        for path in ["a/", "a/b/", "/"] {
            assert!(is_folder_path(path));
            assert!(!is_file_path(path));
        }
        for path in ["a", "a/b.txt", "dir/file"] {
            assert!(is_file_path(path));
            assert!(!is_folder_path(path));
        }
        assert!(!is_folder_path(""));
        assert!(!is_file_path(""));
    }

    #[test]
    fn folder_form_is_idempotent() {
        assert_eq!(to_folder_path("sub"), "sub/");
        assert_eq!(to_folder_path("sub/"), "sub/");
        assert_eq!(to_folder_path(&to_folder_path("x")), "x/");
    }

    #[test]
    fn join_inserts_exactly_one_separator() {
        assert_eq!(join_path("root", "a.txt"), "root/a.txt");
        assert_eq!(join_path("root/", "a.txt"), "root/a.txt");
        assert_eq!(join_path("root", "/a.txt"), "root/a.txt");
        assert_eq!(join_path("root/", "/a.txt"), "root/a.txt");
        assert_eq!(join_path("C:\\out\\", "a.txt"), "C:\\out\\a.txt");
        assert_eq!(join_path("root", "sub/"), "root/sub/");
    }

    #[test]
    fn base_name_handles_folders() {
        assert_eq!(base_name("a/b/c.txt"), "c.txt");
        assert_eq!(base_name("c.txt"), "c.txt");
        assert_eq!(base_name("a/sub/"), "sub");
    }

    #[test]
    fn entry_path_from_relative_fs_path() {
        let rel: PathBuf = ["sub", "b.txt"].iter().collect();
        assert_eq!(to_entry_path(&rel).as_deref(), Some("sub/b.txt"));
        assert_eq!(to_entry_path(Path::new("../x")), None);
    }

    #[test]
    fn unsafe_entry_paths_are_rejected() {
        assert!(is_safe_entry_path("root/a.txt"));
        assert!(is_safe_entry_path("root/sub/"));
        assert!(!is_safe_entry_path("../evil.txt"));
        assert!(!is_safe_entry_path("root/../../evil.txt"));
        assert!(!is_safe_entry_path("/etc/passwd"));
        assert!(!is_safe_entry_path("\\windows\\evil"));
    }
}
