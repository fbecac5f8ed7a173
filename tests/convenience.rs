use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zipkit::{ArchiveSession, BufferList, ErrorKind, is_archive, is_zip_file};

/// Relative paths and contents of every file and folder below `root`
fn snapshot(root: &Path) -> BTreeSet<(PathBuf, Option<Vec<u8>>)> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|item| {
            let item = item.unwrap();
            let rel = item.path().strip_prefix(root).unwrap().to_path_buf();
            let data = item
                .file_type()
                .is_file()
                .then(|| fs::read(item.path()).unwrap());
            (rel, data)
        })
        .collect()
}

#[test]
fn compress_then_extract_reproduces_the_tree() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let project = src.join("project");
    fs::create_dir_all(project.join("empty")).unwrap();
    fs::create_dir_all(project.join("nested/deeper")).unwrap();
    fs::write(project.join("empty.txt"), b"").unwrap();
    fs::write(project.join(".hidden"), b"dotfile").unwrap();
    fs::write(project.join("nested/deeper/binary.bin"), [0u8, 255, 1, 254, 0, 0]).unwrap();
    fs::write(project.join("nested/long.txt"), "line\n".repeat(500)).unwrap();

    zipkit::compress(&project).unwrap();
    let zip_path = src.join("project.zip");
    assert!(is_zip_file(&zip_path));

    let out = dir.path().join("out");
    zipkit::extract_to(&zip_path, &out).unwrap();

    assert_eq!(snapshot(&out.join("project")), snapshot(&project));
}

#[test]
fn extract_defaults_to_the_archive_folder() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("note.txt");
    fs::write(&file, "remember").unwrap();

    let zip_path = dir.path().join("archive").join("note.zip");
    zipkit::compress_to(&file, &zip_path).unwrap();
    zipkit::extract(&zip_path).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("archive").join("note.txt")).unwrap(),
        "remember"
    );
}

#[test]
fn compress_reports_missing_source() {
    let dir = TempDir::new().unwrap();
    let err = zipkit::compress(dir.path().join("ghost")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WrongPath);
    assert!(!dir.path().join("ghost.zip").exists());
}

#[test]
fn compress_buffers_writes_entries_in_name_order() {
    let dir = TempDir::new().unwrap();
    let zip_path = dir.path().join("buffers.zip");
    let list = BufferList::from([
        ("file4.txt".to_string(), b"four".to_vec()),
        ("file1.txt".to_string(), b"one".to_vec()),
        ("file7.txt".to_string(), b"seven".to_vec()),
    ]);
    zipkit::compress_buffers(&list, &zip_path).unwrap();

    let session = ArchiveSession::open(&zip_path).unwrap();
    assert_eq!(session.count(), 3);
    assert_eq!(session.name(0), Some("file1.txt"));
    assert_eq!(session.name(1), Some("file4.txt"));
    assert_eq!(session.name(2), Some("file7.txt"));
    assert_eq!(session.extract_data(1).unwrap(), b"four");
}

#[test]
fn compress_buffers_needs_input() {
    let dir = TempDir::new().unwrap();
    let zip_path = dir.path().join("nothing.zip");
    let err = zipkit::compress_buffers(&BufferList::new(), &zip_path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoInputData);
    assert!(!zip_path.exists());
}

#[test]
fn compress_buffer_holds_one_file() {
    let dir = TempDir::new().unwrap();
    let zip_path = dir.path().join("single.zip");
    zipkit::compress_buffer("payload", "inner/data.txt", &zip_path).unwrap();

    let bytes = fs::read(&zip_path).unwrap();
    assert!(is_archive(&bytes));

    let session = ArchiveSession::from_buffer(bytes).unwrap();
    assert_eq!(session.count(), 1);
    let file = session.extract_file_to_buffer("data.txt").unwrap();
    assert_eq!(file.name, "inner/data.txt");
    assert_eq!(file.data.as_deref(), Some(&b"payload"[..]));
}

#[test]
fn compress_list_requires_a_shared_parent() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("a")).unwrap();
    fs::create_dir_all(dir.path().join("b")).unwrap();
    let first = dir.path().join("a").join("one.txt");
    let second = dir.path().join("b").join("two.txt");
    fs::write(&first, "1").unwrap();
    fs::write(&second, "2").unwrap();

    let zip_path = dir.path().join("mixed.zip");
    let err = zipkit::compress_list(&[&first, &second], &zip_path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WrongPath);
    assert!(!zip_path.exists());
}

#[test]
fn compress_list_skips_missing_items() {
    let dir = TempDir::new().unwrap();
    let present = dir.path().join("present.txt");
    let folder = dir.path().join("folder");
    fs::write(&present, "here").unwrap();
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join("inside.txt"), "inside").unwrap();
    let missing = dir.path().join("missing.txt");

    let zip_path = dir.path().join("out").join("list.zip");
    zipkit::compress_list(&[&present, &missing, &folder], &zip_path).unwrap();

    let session = ArchiveSession::open(&zip_path).unwrap();
    let names: BTreeSet<&str> = session.contents().iter().map(|(_, name)| name).collect();
    assert_eq!(
        names,
        BTreeSet::from(["present.txt", "folder/", "folder/inside.txt"])
    );
}

#[test]
fn compress_list_fails_when_nothing_was_added() {
    let dir = TempDir::new().unwrap();
    let zip_path = dir.path().join("empty.zip");
    let ghosts = [dir.path().join("x"), dir.path().join("y")];

    let err = zipkit::compress_list(&ghosts, &zip_path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoInputData);
    assert!(!zip_path.exists());

    let none: [PathBuf; 0] = [];
    let err = zipkit::compress_list(&none, &zip_path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoInputData);
}

#[test]
fn compress_here_names_the_archive_after_the_parent() {
    let dir = TempDir::new().unwrap();
    let parent = dir.path().join("bundle");
    fs::create_dir_all(&parent).unwrap();
    let a = parent.join("a.txt");
    let b = parent.join("b.txt");
    fs::write(&a, "a").unwrap();
    fs::write(&b, "b").unwrap();

    zipkit::compress_here(&[&a, &b]).unwrap();

    let session = ArchiveSession::open(parent.join("bundle.zip")).unwrap();
    assert_eq!(session.count(), 2);
    assert!(session.find_index("a.txt").is_some());
    assert!(session.find_index("b.txt").is_some());
}

#[test]
fn zip_detection_checks_the_signature() {
    let dir = TempDir::new().unwrap();
    let text = dir.path().join("plain.txt");
    fs::write(&text, "hello").unwrap();
    let zip_path = dir.path().join("real.zip");
    zipkit::compress_buffer("x", "x.txt", &zip_path).unwrap();

    assert!(is_zip_file(&zip_path));
    assert!(!is_zip_file(&text));
    assert!(!is_zip_file(&dir.path().join("absent.zip")));
    assert!(!is_zip_file(dir.path()));
}

#[test]
fn list_archives_are_named_after_the_shared_parent() {
    let dir = TempDir::new().unwrap();
    let parent = dir.path().join("photos");
    let expected = parent.join("photos.zip");

    let paths = [parent.join("a.jpg"), parent.join("b.jpg")];
    assert_eq!(
        zipkit::convenience::default_list_zip_path(&paths).unwrap(),
        expected
    );
    assert_eq!(
        zipkit::convenience::default_zip_path(&parent.join("a.jpg")).unwrap(),
        parent.join("a.jpg.zip")
    );

    let none: [PathBuf; 0] = [];
    assert_eq!(
        zipkit::convenience::default_list_zip_path(&none)
            .unwrap_err()
            .kind(),
        ErrorKind::NoInputData
    );
}
