//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. built-in defaults
//! 2. the TOML config file (platform config dir, or `--config PATH`)
//! 3. the `[profile.NAME]` table selected with `--profile NAME`
//! 4. `CHAINDUPE_*` environment variables
//! 5. CLI flags, applied with [`Config::merge_scan_args`]
//!
//! ```toml
//! signatures = ["size", "partial", "blake3"]
//! io_threads = 2
//! file_exclude = ["*.tmp"]
//!
//! [profile.photos]
//! file_include = ["*.jpg", "*.png"]
//! min_group_size = 3
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::{OutputFormat, ScanArgs};
use crate::duplicates::{FinderConfig, SignatureKind, DEFAULT_MIN_GROUP_SIZE};
use crate::scanner::{WalkerConfig, DEFAULT_PARTIAL_CHUNKS};

/// Prefix of the environment variables read as configuration.
pub const ENV_PREFIX: &str = "CHAINDUPE_";

/// Keys accepted at the top level of the config file (and inside profiles).
const KNOWN_KEYS: &[&str] = &[
    "recursive",
    "max_depth",
    "include_hidden",
    "file_include",
    "file_exclude",
    "dir_include",
    "dir_exclude",
    "follow_symlinks",
    "include_empty_files",
    "signatures",
    "min_group_size",
    "io_threads",
    "partial_chunks",
    "output",
    "labels",
    "progress",
    "profile",
];

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Directory levels to yield files from, 0 for unlimited.
    pub max_depth: usize,
    /// Walk into hidden directories.
    pub include_hidden: bool,
    /// Basename include globs.
    pub file_include: Vec<String>,
    /// Basename exclude globs.
    pub file_exclude: Vec<String>,
    /// Directory include substrings.
    pub dir_include: Vec<String>,
    /// Directory exclude substrings.
    pub dir_exclude: Vec<String>,
    /// Admit symbolic links.
    pub follow_symlinks: bool,
    /// Admit empty files.
    pub include_empty_files: bool,
    /// Signature chain, cheapest first.
    pub signatures: Vec<SignatureKind>,
    /// Smallest reported group.
    pub min_group_size: usize,
    /// Number of I/O threads for hashing.
    pub io_threads: usize,
    /// Chunks read by the `partial` signature.
    pub partial_chunks: usize,
    /// Output format.
    pub output: OutputFormat,
    /// Print provenance headers in text output.
    pub labels: bool,
    /// Show the progress spinner.
    pub progress: bool,
    /// Named override tables.
    pub profile: HashMap<String, toml::Table>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recursive: true,
            max_depth: 0,
            include_hidden: false,
            file_include: Vec::new(),
            file_exclude: Vec::new(),
            dir_include: Vec::new(),
            dir_exclude: Vec::new(),
            follow_symlinks: false,
            include_empty_files: false,
            signatures: SignatureKind::default_chain(),
            min_group_size: DEFAULT_MIN_GROUP_SIZE,
            io_threads: 4,
            partial_chunks: DEFAULT_PARTIAL_CHUNKS,
            output: OutputFormat::Text,
            labels: false,
            progress: false,
            profile: HashMap::new(),
        }
    }
}

impl Config {
    /// Load the configuration from `path`, or from the platform default
    /// location when `path` is `None`.
    pub fn load(path: Option<&Path>, profile: Option<&str>) -> Self {
        match path.map(Path::to_path_buf).or_else(Self::config_path) {
            Some(path) => Self::load_from_path(path, profile),
            None => {
                log::debug!("No config directory available, using defaults");
                Self::load_layers(None, profile)
            }
        }
    }

    /// Load the configuration from a specific file.
    ///
    /// A missing file is not an error. A file that cannot be parsed or does
    /// not match the expected types is reported and the defaults are used.
    pub fn load_from_path(path: PathBuf, profile: Option<&str>) -> Self {
        if path.exists() {
            warn_unknown_keys(&path);
            Self::load_layers(Some(&path), profile)
        } else {
            log::debug!("Config file '{}' not found, using defaults", path.display());
            Self::load_layers(None, profile)
        }
    }

    fn load_layers(path: Option<&Path>, profile: Option<&str>) -> Self {
        match Self::figment(path, profile).extract::<Self>() {
            Ok(config) => config,
            Err(e) => {
                let source = path.map_or_else(
                    || "environment".to_string(),
                    |p| format!("'{}'", p.display()),
                );
                log::warn!("Invalid configuration in {}, using defaults: {}", source, e);
                Self::default()
            }
        }
    }

    /// Build the layered figment without extracting it.
    pub fn figment(path: Option<&Path>, profile: Option<&str>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(name) = profile {
            match figment.find_value(&format!("profile.{name}")) {
                Ok(table) => {
                    log::debug!("Applying config profile '{}'", name);
                    figment = figment.merge(Serialized::defaults(table));
                }
                Err(_) => {
                    log::warn!("Config profile '{}' not found, using base settings", name);
                }
            }
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Default platform-specific configuration path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "chaindupe").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Override settings with the values given on the command line.
    ///
    /// Switches only ever turn a setting on (or, for `--no-recursive`, off);
    /// repeatable options replace the configured list when given at least once.
    pub fn merge_scan_args(&mut self, args: &ScanArgs) {
        if args.no_recursive {
            self.recursive = false;
        }
        if let Some(depth) = args.max_depth {
            self.max_depth = depth;
        }
        if args.hidden {
            self.include_hidden = true;
        }
        replace_if_given(&mut self.file_include, &args.include);
        replace_if_given(&mut self.file_exclude, &args.exclude);
        replace_if_given(&mut self.dir_include, &args.dir_include);
        replace_if_given(&mut self.dir_exclude, &args.dir_exclude);
        if args.follow_symlinks {
            self.follow_symlinks = true;
        }
        if args.empty_files {
            self.include_empty_files = true;
        }
        replace_if_given(&mut self.signatures, &args.filters);
        if let Some(size) = args.group_size {
            self.min_group_size = size;
        }
        if let Some(threads) = args.io_threads {
            self.io_threads = threads;
        }
        if let Some(chunks) = args.partial_chunks {
            self.partial_chunks = chunks;
        }
        if let Some(output) = args.output {
            self.output = output;
        }
        if args.labels {
            self.labels = true;
        }
        if args.progress {
            self.progress = true;
        }
    }

    /// Discovery rules described by this configuration.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::default()
            .with_recursive(self.recursive)
            .with_max_depth(Some(self.max_depth).filter(|&depth| depth > 0))
            .with_include_hidden(self.include_hidden)
            .with_file_include(self.file_include.clone())
            .with_file_exclude(self.file_exclude.clone())
            .with_dir_include(self.dir_include.clone())
            .with_dir_exclude(self.dir_exclude.clone())
    }

    /// Pipeline settings described by this configuration.
    ///
    /// The shutdown flag and progress callback are left for the caller.
    #[must_use]
    pub fn finder_config(&self) -> FinderConfig {
        FinderConfig::default()
            .with_walker_config(self.walker_config())
            .with_follow_symlinks(self.follow_symlinks)
            .with_include_empty_files(self.include_empty_files)
            .with_signatures(self.signatures.clone())
            .with_min_group_size(self.min_group_size)
            .with_io_threads(self.io_threads)
            .with_partial_chunks(self.partial_chunks)
    }
}

fn replace_if_given<T: Clone>(target: &mut Vec<T>, given: &[T]) {
    if !given.is_empty() {
        *target = given.to_vec();
    }
}

/// Log a warning for every key in the config file that is not a setting.
fn warn_unknown_keys(path: &Path) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let Ok(table) = toml::from_str::<toml::Table>(&content) else {
        return;
    };

    for (key, suggestion) in unknown_keys(&table) {
        match suggestion {
            Some(known) => log::warn!(
                "Unknown config key '{}' in '{}', did you mean '{}'?",
                key,
                path.display(),
                known
            ),
            None => log::warn!("Unknown config key '{}' in '{}'", key, path.display()),
        }
    }
}

/// Unknown keys of a parsed config file, each with the closest known key if
/// one is similar enough. Keys inside profile tables are reported as
/// `profile.NAME.KEY`.
pub fn unknown_keys(table: &toml::Table) -> Vec<(String, Option<&'static str>)> {
    let mut unknown = Vec::new();

    for (key, value) in table {
        if key == "profile" {
            if let Some(profiles) = value.as_table() {
                for (name, profile) in profiles {
                    let Some(profile) = profile.as_table() else {
                        continue;
                    };
                    for inner in profile.keys().filter(|k| !is_setting(k)) {
                        unknown.push((format!("profile.{name}.{inner}"), suggest(inner)));
                    }
                }
            }
        } else if !KNOWN_KEYS.contains(&key.as_str()) {
            unknown.push((key.clone(), suggest(key)));
        }
    }

    unknown
}

fn is_setting(key: &str) -> bool {
    key != "profile" && KNOWN_KEYS.contains(&key)
}

fn suggest(key: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .map(|&known| (known, strsim::jaro_winkler(key, known)))
        .filter(|&(_, score)| score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(known, _)| known)
}
