use chaindupe::cli::Cli;
use chaindupe::duplicates::{FinderError, SignatureKind};
use chaindupe::error::ExitCode;
use chaindupe::run_app_with;
use chaindupe::scanner::WalkError;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    tempfile::Builder::new().prefix("cli").tempdir().unwrap()
}

fn write(root: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = root.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Run the app with an isolated (absent) config file and capture stdout.
fn run(dir: &TempDir, args: &[&str]) -> anyhow::Result<(ExitCode, String)> {
    let config = dir.path().join("no-config.toml");
    let mut argv = vec!["chaindupe", "-q", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(args);

    let cli = Cli::try_parse_from(argv).unwrap();
    let mut out = Vec::new();
    let code = run_app_with(cli, &mut out, false)?;
    Ok((code, String::from_utf8(out).unwrap()))
}

fn fixture() -> (TempDir, PathBuf, PathBuf) {
    let dir = temp_dir();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    let a = write(&data, "a.txt", b"twin");
    let b = write(&data, "b.txt", b"twin");
    write(&data, "c.txt", b"solo!");
    (dir, a, b)
}

#[test]
fn test_scan_text_output() {
    let (dir, a, b) = fixture();
    let root = dir.path().join("data");

    let (code, out) = run(&dir, &["scan", root.to_str().unwrap()]).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(out, format!("{}\n{}\n\n", a.display(), b.display()));
}

#[test]
fn test_scan_text_output_with_labels() {
    let (dir, a, _) = fixture();
    let root = dir.path().join("data");

    let (_, out) = run(&dir, &["scan", root.to_str().unwrap(), "--labels"]).unwrap();

    let mut lines = out.lines();
    let header = lines.next().unwrap();
    assert_eq!(
        header,
        format!("f1=4 f2={}", blake3::hash(b"twin").to_hex())
    );
    assert_eq!(lines.next().unwrap(), a.display().to_string());
}

#[test]
fn test_scan_json_output() {
    let (dir, a, b) = fixture();
    let root = dir.path().join("data");

    let (code, out) = run(&dir, &["scan", root.to_str().unwrap(), "-o", "json"]).unwrap();
    assert_eq!(code, ExitCode::Success);

    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 1);

    let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(
        value["files"],
        serde_json::json!([a.to_str().unwrap(), b.to_str().unwrap()])
    );
    assert_eq!(value["provenance"]["f1"], 4);
    assert_eq!(
        value["provenance"]["f2"],
        blake3::hash(b"twin").to_hex().as_str()
    );
}

#[test]
fn test_scan_without_duplicates_prints_nothing() {
    let dir = temp_dir();
    write(dir.path(), "x", b"1");
    write(dir.path(), "y", b"22");

    let (code, out) = run(&dir, &["scan", dir.path().to_str().unwrap()]).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(out.is_empty());
}

#[test]
fn test_scan_filter_chain_and_group_size() {
    let dir = temp_dir();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    for name in ["one", "two", "three"] {
        write(&data, name, b"same");
    }
    write(&data, "four", b"same-ish");
    let root = data.to_str().unwrap();

    let (_, out) = run(&dir, &["scan", root, "-f", "size", "-f", "sha256", "-g", "3"]).unwrap();
    assert_eq!(out.lines().filter(|l| !l.is_empty()).count(), 3);

    let (_, out) = run(&dir, &["scan", root, "-g", "4"]).unwrap();
    assert!(out.is_empty());
}

#[test]
fn test_scan_group_size_one_lists_split_off_files() {
    let dir = temp_dir();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    let first = write(&data, "first", b"abcd");
    write(&data, "second", b"wxyz");
    let root = data.to_str().unwrap();

    let (_, out) = run(&dir, &["scan", root]).unwrap();
    assert!(out.is_empty());

    // Same size, different hash: the representative is kept on its own
    let (code, out) = run(&dir, &["scan", root, "-g", "1"]).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert_eq!(out, format!("{}\n\n", first.display()));
}

#[test]
fn test_scan_pretty_json_output() {
    let (dir, a, b) = fixture();
    let root = dir.path().join("data");

    let (_, out) = run(&dir, &["scan", root.to_str().unwrap(), "-o", "json", "--pretty"]).unwrap();
    assert!(out.lines().count() > 1);

    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(
        value["files"],
        serde_json::json!([a.to_str().unwrap(), b.to_str().unwrap()])
    );
}

#[test]
fn test_scan_manifest_with_missing_line_is_partial_success() {
    let (dir, a, b) = fixture();
    let list = dir.path().join("list.txt");
    fs::write(
        &list,
        format!(
            "{}\n{}\n{}\n",
            a.display(),
            dir.path().join("vanished").display(),
            b.display()
        ),
    )
    .unwrap();

    let (code, out) = run(&dir, &["scan", list.to_str().unwrap()]).unwrap();
    assert_eq!(code, ExitCode::PartialSuccess);
    assert_eq!(out, format!("{}\n{}\n\n", a.display(), b.display()));
}

#[test]
fn test_scan_invalid_manifest_is_fatal() {
    let dir = temp_dir();
    let list = dir.path().join("list.txt");
    fs::write(&list, "./missing.txt\n").unwrap();

    let err = run(&dir, &["scan", list.to_str().unwrap()]).unwrap_err();
    assert!(format!("{err:#}").contains("is not a valid input"));
    assert!(matches!(
        err.downcast_ref::<FinderError>(),
        Some(FinderError::Walk(WalkError::InvalidFirstLine { .. }))
    ));
}

#[cfg(unix)]
#[test]
fn test_scan_unreadable_manifest_exits_with_general_error() {
    use std::os::unix::fs::PermissionsExt;

    let (dir, a, _) = fixture();
    let list = write(dir.path(), "list.txt", format!("{}\n", a.display()).as_bytes());
    fs::set_permissions(&list, fs::Permissions::from_mode(0o000)).unwrap();
    let readable_anyway = fs::File::open(&list).is_ok();

    let result = run(&dir, &["scan", list.to_str().unwrap()]);
    fs::set_permissions(&list, fs::Permissions::from_mode(0o644)).unwrap();

    if readable_anyway {
        return;
    }
    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FinderError>(),
        Some(FinderError::Walk(WalkError::Unreadable { .. }))
    ));
    let code = ExitCode::from_error(&err);
    assert_eq!(code, ExitCode::GeneralError);
    assert_eq!(code.as_i32(), 1);
}

#[test]
fn test_scan_missing_root_is_fatal() {
    let dir = temp_dir();
    let missing = dir.path().join("nowhere");
    let err = run(&dir, &["scan", missing.to_str().unwrap()]).unwrap_err();
    assert!(format!("{err:#}").contains("Path not found"));
}

#[test]
fn test_scan_uses_config_profile() {
    let (dir, a, _) = fixture();
    let config = dir.path().join("chaindupe.toml");
    fs::write(&config, "[profile.machine]\noutput = \"json\"\n").unwrap();
    let root = dir.path().join("data");

    let cli = Cli::try_parse_from([
        "chaindupe",
        "-q",
        "--config",
        config.to_str().unwrap(),
        "--profile",
        "machine",
        "scan",
        root.to_str().unwrap(),
    ])
    .unwrap();
    let mut out = Vec::new();
    run_app_with(cli, &mut out, false).unwrap();

    let out = String::from_utf8(out).unwrap();
    let value: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
    assert_eq!(value["files"][0], a.to_str().unwrap());
}

#[test]
fn test_signatures_command() {
    let dir = temp_dir();
    let (code, out) = run(&dir, &["signatures"]).unwrap();

    assert_eq!(code, ExitCode::Success);
    let names: Vec<&str> = out
        .lines()
        .map(|line| line.split_whitespace().next().unwrap())
        .collect();
    let expected: Vec<&str> = SignatureKind::all().iter().map(|k| k.name()).collect();
    assert_eq!(names, expected);
}
