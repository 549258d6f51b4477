use chaindupe::duplicates::{
    from_fn, DuplicateFinder, FinderConfig, FinderError, Signature, SignatureKind,
};
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    tempfile::Builder::new().prefix("scan").tempdir().unwrap()
}

fn write(root: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn finder(signatures: &[SignatureKind]) -> DuplicateFinder {
    DuplicateFinder::new(FinderConfig::default().with_signatures(signatures.to_vec()))
}

#[test]
fn test_scan_empty_directory() {
    let dir = temp_dir();
    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.candidates, 0);
    assert_eq!(summary.duplicate_groups, 0);
    assert!(!summary.has_errors());
}

#[test]
fn test_scan_unique_files() {
    let dir = temp_dir();
    write(dir.path(), "a.txt", b"content a");
    write(dir.path(), "b.txt", b"content bb");
    write(dir.path(), "c.txt", b"content ccc");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.admitted, 3);
    assert_eq!(summary.duplicate_groups, 0);
}

#[test]
fn test_size_then_hash_provenance() {
    let dir = temp_dir();
    let a = write(dir.path(), "a", b"0123456789");
    let b = write(dir.path(), "b", b"0123456789");
    write(dir.path(), "c", b"01234567890123456789");

    let (groups, _) = finder(&[SignatureKind::Size, SignatureKind::Blake3])
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members(), &[a, b]);
    assert_eq!(
        groups[0].provenance().signatures(),
        &[
            Signature::Size(10),
            Signature::Digest(*blake3::hash(b"0123456789").as_bytes()),
        ]
    );
}

#[test]
fn test_same_size_different_content_is_not_reported() {
    let dir = temp_dir();
    write(dir.path(), "x", b"aaaa");
    write(dir.path(), "y", b"bbbb");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.admitted, 2);
}

#[test]
fn test_every_content_signature_agrees() {
    let dir = temp_dir();
    write(dir.path(), "one.bin", b"identical bytes");
    write(dir.path(), "two.bin", b"identical bytes");
    write(dir.path(), "three.bin", b"different bytes");

    for kind in [
        SignatureKind::Partial,
        SignatureKind::Blake3,
        SignatureKind::Sha256,
        SignatureKind::Bytes,
    ] {
        let (groups, _) = finder(&[SignatureKind::Size, kind])
            .find_duplicates(&[dir.path().to_path_buf()])
            .unwrap();
        assert_eq!(groups.len(), 1, "signature {kind}");
        assert_eq!(groups[0].len(), 2, "signature {kind}");
    }
}

#[test]
fn test_partial_only_sees_leading_chunks() {
    let dir = temp_dir();
    let mut first = vec![7u8; 70_000];
    let mut second = first.clone();
    first[69_999] = 1;
    second[69_999] = 2;
    write(dir.path(), "first.bin", &first);
    write(dir.path(), "second.bin", &second);
    let roots = [dir.path().to_path_buf()];

    let partial_only = DuplicateFinder::new(
        FinderConfig::default()
            .with_signatures(vec![SignatureKind::Size, SignatureKind::Partial])
            .with_partial_chunks(1),
    );
    let (groups, _) = partial_only.find_duplicates(&roots).unwrap();
    assert_eq!(groups.len(), 1);

    let full_chain = DuplicateFinder::new(
        FinderConfig::default()
            .with_signatures(vec![
                SignatureKind::Size,
                SignatureKind::Partial,
                SignatureKind::Blake3,
            ])
            .with_partial_chunks(1),
    );
    let (groups, _) = full_chain.find_duplicates(&roots).unwrap();
    assert!(groups.is_empty());
}

#[test]
fn test_mtime_splits_identical_content() {
    let dir = temp_dir();
    let a = write(dir.path(), "a", b"same");
    let b = write(dir.path(), "b", b"same");
    let c = write(dir.path(), "c", b"same");

    filetime::set_file_mtime(&a, FileTime::from_unix_time(1_000_000, 0)).unwrap();
    filetime::set_file_mtime(&b, FileTime::from_unix_time(2_000_000, 0)).unwrap();
    filetime::set_file_mtime(&c, FileTime::from_unix_time(1_000_000, 0)).unwrap();

    let (groups, _) = finder(&[SignatureKind::Size, SignatureKind::Mtime])
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members(), &[a, c]);
    assert_eq!(
        groups[0].provenance().signatures()[1],
        Signature::Timestamp(1_000_000_000_000_000)
    );
}

#[test]
fn test_name_signature_across_directories() {
    let dir = temp_dir();
    let first = write(dir.path(), "left/report.pdf", b"v1");
    let second = write(dir.path(), "right/report.pdf", b"version 2");
    write(dir.path(), "right/other.pdf", b"v1");

    let (groups, _) = finder(&[SignatureKind::Name])
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members(), &[first, second]);
    assert_eq!(groups[0].provenance().to_string(), "f1=report.pdf");
}

#[test]
fn test_multiple_roots_are_merged() {
    let left = temp_dir();
    let right = temp_dir();
    let a = write(left.path(), "photo.jpg", b"pixels");
    let b = write(right.path(), "copy.jpg", b"pixels");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&[left.path().to_path_buf(), right.path().to_path_buf()])
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members(), &[a, b]);
    assert_eq!(summary.candidates, 2);
}

#[test]
fn test_repeated_root_is_walked_once() {
    let dir = temp_dir();
    write(dir.path(), "a", b"only one");

    let root = dir.path().to_path_buf();
    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&[root.clone(), root])
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.candidates, 1);
}

#[test]
fn test_mismatched_members_form_their_own_group() {
    let dir = temp_dir();
    let a = write(dir.path(), "a", b"AAAA");
    let b = write(dir.path(), "b", b"BBBB");
    let c = write(dir.path(), "c", b"AAAA");
    let d = write(dir.path(), "d", b"BBBB");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].members(), &[a, c]);
    assert_eq!(groups[1].members(), &[b, d]);
    assert_eq!(summary.duplicate_files, 2);
    assert_eq!(summary.reclaimable_space, 8);
}

#[test]
fn test_custom_signature_chain() {
    let dir = temp_dir();
    write(dir.path(), "notes.md", b"# one");
    write(dir.path(), "readme.md", b"# two!");
    write(dir.path(), "main.rs", b"fn main() {}");

    let first_byte = from_fn("first-byte", |path| {
        let content = fs::read(path).map_err(|e| chaindupe::scanner::HashError::from_io(path, e))?;
        Ok(Signature::Bytes(content.into_iter().take(1).collect()))
    });

    let finder = DuplicateFinder::with_defaults();
    let mut stream = finder
        .stream_with(&[dir.path().to_path_buf()], vec![first_byte])
        .unwrap();
    let groups: Vec<_> = stream.by_ref().collect();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(groups[0].provenance().to_string(), "f1=23");
    assert_eq!(stream.summary().duplicate_groups, 1);
}

#[test]
fn test_interrupted_before_start() {
    let dir = temp_dir();
    write(dir.path(), "a", b"x");

    let flag = Arc::new(AtomicBool::new(true));
    let finder = DuplicateFinder::new(FinderConfig::default().with_shutdown_flag(flag));

    assert!(matches!(
        finder.find_duplicates(&[dir.path().to_path_buf()]),
        Err(FinderError::Interrupted)
    ));
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_gated() {
    let dir = temp_dir();
    let target = write(dir.path(), "target.txt", b"linked content");
    let link = dir.path().join("zlink.txt");
    std::os::unix::fs::symlink(&target, &link).unwrap();
    let roots = [dir.path().to_path_buf()];

    let (groups, summary) = DuplicateFinder::with_defaults().find_duplicates(&roots).unwrap();
    assert!(groups.is_empty());
    assert_eq!(summary.rejected, 1);

    let following = DuplicateFinder::new(FinderConfig::default().with_follow_symlinks(true));
    let (groups, _) = following.find_duplicates(&roots).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members(), &[target, link]);
}
