use chaindupe::duplicates::{DuplicateFinder, FinderError};
use chaindupe::scanner::{WalkError, Walker, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    tempfile::Builder::new().prefix("manifest").tempdir().unwrap()
}

fn write(root: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = root.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn manifest(root: &Path, lines: &[String]) -> PathBuf {
    let path = root.join("list.txt");
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn line(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn test_manifest_order_decides_representative() {
    let dir = temp_dir();
    let a = write(dir.path(), "a.bin", b"payload");
    let b = write(dir.path(), "b.bin", b"payload");
    let c = write(dir.path(), "c.bin", b"payload");
    let list = manifest(dir.path(), &[line(&c), line(&a), line(&b)]);

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&[list])
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].representative(), &c);
    assert_eq!(groups[0].members(), &[c, a, b]);
    assert_eq!(summary.candidates, 3);
}

#[test]
fn test_missing_first_line_is_fatal() {
    let dir = temp_dir();
    let present = write(dir.path(), "present", b"x");
    let list = manifest(dir.path(), &["./missing.txt".to_string(), line(&present)]);

    let result = DuplicateFinder::with_defaults().find_duplicates(&[list.clone()]);
    match result {
        Err(FinderError::Walk(WalkError::InvalidFirstLine { manifest, line })) => {
            assert_eq!(manifest, list);
            assert_eq!(line, "./missing.txt");
        }
        other => panic!("expected InvalidFirstLine, got {other:?}"),
    }
}

#[test]
fn test_empty_manifest_is_fatal() {
    let dir = temp_dir();
    let list = dir.path().join("empty.txt");
    fs::write(&list, b"").unwrap();

    assert!(matches!(
        Walker::new(&list, WalkerConfig::default()).walk(),
        Err(WalkError::EmptyManifest(_))
    ));
}

#[test]
fn test_missing_later_line_is_skipped() {
    let dir = temp_dir();
    let a = write(dir.path(), "a", b"twin");
    let b = write(dir.path(), "b", b"twin");
    let gone = dir.path().join("gone");
    let list = manifest(dir.path(), &[line(&a), line(&gone), line(&b)]);

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&[list])
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members(), &[a, b]);
    assert_eq!(summary.scan_errors, 1);
    assert!(summary.has_errors());
}

#[test]
fn test_blank_lines_and_trailing_whitespace() {
    let dir = temp_dir();
    let a = write(dir.path(), "a", b"same");
    let b = write(dir.path(), "b", b"same");
    let list = dir.path().join("list.txt");
    fs::write(&list, format!("{}  \r\n\n\n{}\t\n\n", line(&a), line(&b))).unwrap();

    let candidates: Vec<PathBuf> = Walker::new(&list, WalkerConfig::default())
        .walk()
        .unwrap()
        .map(Result::unwrap)
        .collect();

    assert_eq!(candidates, vec![a, b]);
}

#[test]
fn test_manifest_entries_ignore_directory_filters() {
    let dir = temp_dir();
    let a = write(dir.path(), "a.tmp", b"same");
    let b = write(dir.path(), "b.tmp", b"same");
    let list = manifest(dir.path(), &[line(&a), line(&b)]);

    let config = WalkerConfig::default().with_file_exclude(vec!["*.tmp".to_string()]);
    let candidates: Vec<_> = Walker::new(&list, config).walk().unwrap().collect();
    assert_eq!(candidates.len(), 2);
}

#[test]
fn test_manifest_and_directory_roots_combined() {
    let dir = temp_dir();
    let tree = dir.path().join("tree");
    fs::create_dir(&tree).unwrap();
    let in_tree = write(&tree, "inside", b"shared bytes");
    let outside = write(dir.path(), "outside", b"shared bytes");
    let list = manifest(dir.path(), &[line(&outside)]);

    let (groups, _) = DuplicateFinder::with_defaults()
        .find_duplicates(&[tree, list])
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members(), &[in_tree, outside]);
}

#[test]
fn test_manifest_listing_a_directory_gates_it_out() {
    let dir = temp_dir();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    let file = write(dir.path(), "file", b"data");
    let list = manifest(dir.path(), &[line(&sub), line(&file)]);

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&[list])
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.rejected, 1);
}
