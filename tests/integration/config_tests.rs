use chaindupe::cli::{Cli, Commands, OutputFormat};
use chaindupe::config::Config;
use chaindupe::duplicates::SignatureKind;
use clap::Parser;
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    tempfile::Builder::new().prefix("config").tempdir().unwrap()
}

fn config_file(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_config_load_from_toml() {
    let dir = temp_dir();
    let path = config_file(
        &dir,
        r#"
recursive = false
max_depth = 4
file_exclude = ["*.tmp", "*.part"]
dir_exclude = ["node_modules"]
signatures = ["size", "partial", "sha256"]
min_group_size = 3
io_threads = 8
output = "json"
labels = true
"#,
    );

    let config = Config::load_from_path(path, None);
    assert!(!config.recursive);
    assert_eq!(config.max_depth, 4);
    assert_eq!(config.file_exclude, vec!["*.tmp", "*.part"]);
    assert_eq!(config.dir_exclude, vec!["node_modules"]);
    assert_eq!(
        config.signatures,
        vec![
            SignatureKind::Size,
            SignatureKind::Partial,
            SignatureKind::Sha256
        ]
    );
    assert_eq!(config.min_group_size, 3);
    assert_eq!(config.io_threads, 8);
    assert_eq!(config.output, OutputFormat::Json);
    assert!(config.labels);
    assert!(!config.include_hidden);
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let dir = temp_dir();
    let config = Config::load_from_path(dir.path().join("absent.toml"), None);
    assert_eq!(config.signatures, SignatureKind::default_chain());
    assert_eq!(config.io_threads, 4);
    assert!(config.recursive);
}

#[test]
fn test_config_invalid_toml_falls_back() {
    let dir = temp_dir();
    let path = config_file(&dir, "io_threads = [unterminated");

    let config = Config::load_from_path(path, None);
    assert_eq!(config.io_threads, 4);
}

#[test]
fn test_config_wrong_type_falls_back() {
    let dir = temp_dir();
    let path = config_file(&dir, "io_threads = 2\nsignatures = [\"md5\"]\n");

    let config = Config::load_from_path(path, None);
    assert_eq!(config.io_threads, 4);
    assert_eq!(config.signatures, SignatureKind::default_chain());
}

#[test]
fn test_config_unknown_keys_are_ignored() {
    let dir = temp_dir();
    let path = config_file(&dir, "io_thread = 9\nlabels = true\n");

    let config = Config::load_from_path(path, None);
    assert_eq!(config.io_threads, 4);
    assert!(config.labels);
}

#[test]
fn test_config_profile_overrides_base() {
    let dir = temp_dir();
    let path = config_file(
        &dir,
        r#"
io_threads = 2
file_include = ["*.txt"]

[profile.photos]
file_include = ["*.jpg", "*.png"]
min_group_size = 3

[profile.slow]
io_threads = 1
signatures = ["size", "bytes"]
"#,
    );

    let photos = Config::load_from_path(path.clone(), Some("photos"));
    assert_eq!(photos.file_include, vec!["*.jpg", "*.png"]);
    assert_eq!(photos.min_group_size, 3);
    assert_eq!(photos.io_threads, 2);

    let slow = Config::load_from_path(path.clone(), Some("slow"));
    assert_eq!(slow.file_include, vec!["*.txt"]);
    assert_eq!(slow.io_threads, 1);
    assert_eq!(
        slow.signatures,
        vec![SignatureKind::Size, SignatureKind::Bytes]
    );

    let base = Config::load_from_path(path, None);
    assert_eq!(base.min_group_size, 2);
    assert_eq!(base.profile.len(), 2);
    assert!(base.profile.contains_key("photos"));
}

#[test]
fn test_config_unknown_profile_uses_base() {
    let dir = temp_dir();
    let path = config_file(&dir, "io_threads = 6\n[profile.photos]\nio_threads = 1\n");

    let config = Config::load_from_path(path, Some("music"));
    assert_eq!(config.io_threads, 6);
}

#[test]
fn test_config_serializes_back_to_toml() {
    let config = Config {
        file_exclude: vec!["*.bak".to_string()],
        output: OutputFormat::Json,
        ..Config::default()
    };

    let content = toml::to_string_pretty(&config).unwrap();
    assert!(content.contains("output = \"json\""));
    assert!(content.contains("signatures = ["));

    let parsed: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::string(&content))
        .extract()
        .unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_hierarchy_defaults_file_profile_env_cli() {
    let dir = temp_dir();
    let path = config_file(
        &dir,
        r#"
partial_chunks = 10
io_threads = 3

[profile.fast]
partial_chunks = 20
"#,
    );

    let config = Config::load_from_path(path.clone(), None);
    assert_eq!(config.partial_chunks, 10);

    let config = Config::load_from_path(path.clone(), Some("fast"));
    assert_eq!(config.partial_chunks, 20);

    std::env::set_var("CHAINDUPE_PARTIAL_CHUNKS", "30");
    let mut config = Config::load_from_path(path, Some("fast"));
    std::env::remove_var("CHAINDUPE_PARTIAL_CHUNKS");
    assert_eq!(config.partial_chunks, 30);
    assert_eq!(config.io_threads, 3);

    let cli = Cli::try_parse_from(["chaindupe", "scan", ".", "--partial-chunks", "40"]).unwrap();
    if let Commands::Scan(args) = &cli.command {
        config.merge_scan_args(args);
    }
    assert_eq!(config.partial_chunks, 40);
    assert_eq!(config.io_threads, 3);

    let finder = config.finder_config();
    assert_eq!(finder.partial_chunks, 40);
    assert_eq!(finder.io_threads, 3);
}
