//! Candidate walker over directory trees and manifest files.
//!
//! # Overview
//!
//! A root is either a directory, traversed depth-first with entries sorted by
//! file name, or any other existing path, which is read as a manifest listing
//! one candidate path per line. Either way the [`Walker`] yields a lazy
//! [`Candidates`] iterator of paths.
//!
//! Directory traversal uses [`walkdir`] so hidden subtrees can be pruned with
//! `skip_current_dir` before they are read. Basename include/exclude rules are
//! compiled once into [`globset::GlobSet`]s.
//!
//! # Example
//!
//! ```no_run
//! use chaindupe::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! let files: Vec<_> = walker.walk().unwrap().filter_map(Result::ok).collect();
//! println!("Found {} candidates", files.len());
//! ```

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Lines};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use super::{ScanError, WalkError, WalkerConfig};

/// Walker over a single root.
#[derive(Debug)]
pub struct Walker {
    /// Root path as given (before `~` expansion)
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given root.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use chaindupe::scanner::{Walker, WalkerConfig};
    /// use std::path::Path;
    ///
    /// let walker = Walker::new(Path::new("~/Downloads"), WalkerConfig::default());
    /// ```
    #[must_use]
    pub fn new(root: &Path, config: WalkerConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true` the candidate iterator ends at the next
    /// entry.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Start walking.
    ///
    /// Manifest roots are opened and their first line validated here, so a bad
    /// manifest fails before any candidate is produced.
    ///
    /// # Errors
    ///
    /// Returns [`WalkError`] if the root does not exist, a manifest is
    /// unreadable or invalid, or a glob pattern does not compile.
    pub fn walk(&self) -> Result<Candidates, WalkError> {
        let root = expand_tilde(&self.root);

        if !root.exists() {
            return Err(WalkError::NotFound(root));
        }

        let source = if root.is_dir() {
            log::debug!("Walking directory {}", root.display());
            Source::Directory(DirectoryWalk::new(&root, &self.config)?)
        } else {
            Source::Manifest(ManifestReader::open(&root)?)
        };

        Ok(Candidates {
            source,
            shutdown_flag: self.shutdown_flag.clone(),
            finished: false,
        })
    }
}

/// Walk several roots in order, skipping repeated roots.
///
/// Every root is validated before the first candidate is yielded.
///
/// # Errors
///
/// Returns the first [`WalkError`] met while opening a root.
pub fn walk_roots(
    roots: &[PathBuf],
    config: &WalkerConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
) -> Result<impl Iterator<Item = Result<PathBuf, ScanError>>, WalkError> {
    let mut seen = HashSet::new();
    let mut walks = Vec::with_capacity(roots.len());

    for root in roots {
        if !seen.insert(root.clone()) {
            log::debug!("Skipping repeated root {}", root.display());
            continue;
        }
        let mut walker = Walker::new(root, config.clone());
        if let Some(flag) = &shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        walks.push(walker.walk()?);
    }

    Ok(walks.into_iter().flatten())
}

/// Lazy stream of candidate paths from one root.
///
/// Recoverable problems (unreadable directories, missing manifest lines) are
/// yielded as [`ScanError`] values and iteration continues.
#[derive(Debug)]
pub struct Candidates {
    source: Source,
    shutdown_flag: Option<Arc<AtomicBool>>,
    finished: bool,
}

#[derive(Debug)]
enum Source {
    Directory(DirectoryWalk),
    Manifest(ManifestReader),
}

impl Candidates {
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

impl Iterator for Candidates {
    type Item = Result<PathBuf, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.is_shutdown_requested() {
            log::debug!("Walker: Shutdown requested, stopping iteration");
            self.finished = true;
            return None;
        }

        let item = match &mut self.source {
            Source::Directory(walk) => walk.next(),
            Source::Manifest(reader) => reader.next(),
        };
        if item.is_none() {
            self.finished = true;
        }
        item
    }
}

/// Replace a leading `~` component with the home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => {
            log::warn!("Cannot determine home directory, using {} as is", path.display());
            path.to_path_buf()
        }
    }
}

fn is_hidden_name(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|s| s.starts_with('.') && s != "." && s != "..")
}

fn has_hidden_segment(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => is_hidden_name(name),
        _ => false,
    })
}

fn compile_globs(patterns: &[String]) -> Result<Option<GlobSet>, WalkError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| WalkError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|source| WalkError::InvalidPattern {
            pattern: patterns.join(", "),
            source,
        })
}

/// Basename include/exclude rules.
#[derive(Debug, Default)]
struct FileFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl FileFilter {
    fn new(config: &WalkerConfig) -> Result<Self, WalkError> {
        Ok(Self {
            include: compile_globs(&config.file_include)?,
            exclude: compile_globs(&config.file_exclude)?,
        })
    }

    /// Include wins; otherwise an exclude list admits everything it does not match.
    fn accepts(&self, name: &OsStr) -> bool {
        if self.include.is_none() && self.exclude.is_none() {
            return true;
        }
        if self.include.as_ref().is_some_and(|g| g.is_match(name)) {
            return true;
        }
        self.exclude.as_ref().is_some_and(|g| !g.is_match(name))
    }
}

/// Substring rules on a directory's full path.
#[derive(Debug, Default)]
struct DirFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl DirFilter {
    fn new(config: &WalkerConfig) -> Self {
        Self {
            include: config.dir_include.clone(),
            exclude: config.dir_exclude.clone(),
        }
    }

    fn accepts(&self, dir: &Path) -> bool {
        let text = dir.to_string_lossy();
        if !self.include.is_empty() {
            return self.include.iter().all(|s| text.contains(s.as_str()));
        }
        if !self.exclude.is_empty() {
            // Rejected only when every substring is present.
            return !self.exclude.iter().all(|s| text.contains(s.as_str()));
        }
        true
    }
}

struct DirectoryWalk {
    root: PathBuf,
    entries: walkdir::IntoIter,
    files: FileFilter,
    dirs: DirFilter,
    prune_hidden: bool,
    /// Filter decision for the directory open at each depth.
    accepted: Vec<bool>,
}

impl std::fmt::Debug for DirectoryWalk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWalk")
            .field("root", &self.root)
            .field("prune_hidden", &self.prune_hidden)
            .finish_non_exhaustive()
    }
}

impl DirectoryWalk {
    fn new(root: &Path, config: &WalkerConfig) -> Result<Self, WalkError> {
        let mut walk = walkdir::WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name();
        if let Some(depth) = config.effective_max_depth() {
            walk = walk.max_depth(depth);
        }

        let prune_hidden = !config.include_hidden && !has_hidden_segment(root);
        if !config.include_hidden && !prune_hidden {
            log::debug!(
                "Root {} is hidden, walking hidden directories below it",
                root.display()
            );
        }

        Ok(Self {
            root: root.to_path_buf(),
            entries: walk.into_iter(),
            files: FileFilter::new(config)?,
            dirs: DirFilter::new(config),
            prune_hidden,
            accepted: Vec::new(),
        })
    }

    fn scan_error(&self, error: walkdir::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        if error
            .io_error()
            .is_some_and(|e| e.kind() == ErrorKind::PermissionDenied)
        {
            log::warn!("Permission denied: {}", path.display());
            return ScanError::PermissionDenied(path);
        }

        log::warn!("Walker error for {}: {}", path.display(), error);
        let message = error.to_string();
        ScanError::Io {
            path,
            source: error
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other(message)),
        }
    }
}

impl Iterator for DirectoryWalk {
    type Item = Result<PathBuf, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(self.scan_error(e))),
            };
            let depth = entry.depth();

            if entry.file_type().is_dir() {
                if depth > 0 && self.prune_hidden && is_hidden_name(entry.file_name()) {
                    log::trace!("Skipping hidden directory: {}", entry.path().display());
                    self.entries.skip_current_dir();
                    continue;
                }
                let accepted = self.dirs.accepts(entry.path());
                if !accepted {
                    log::trace!("Directory filter rejected {}", entry.path().display());
                }
                self.accepted.truncate(depth);
                self.accepted.push(accepted);
                continue;
            }

            let parent_accepted = depth
                .checked_sub(1)
                .and_then(|d| self.accepted.get(d))
                .copied()
                .unwrap_or(true);
            if !parent_accepted {
                continue;
            }
            if !self.files.accepts(entry.file_name()) {
                log::trace!("File filter rejected {}", entry.path().display());
                continue;
            }

            return Some(Ok(entry.into_path()));
        }
    }
}

/// Reader for a manifest file listing one path per line.
#[derive(Debug)]
struct ManifestReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    first: Option<PathBuf>,
    failed: bool,
}

impl ManifestReader {
    /// Open the manifest and validate its first line.
    fn open(path: &Path) -> Result<Self, WalkError> {
        let file = File::open(path).map_err(|source| WalkError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let mut lines = BufReader::new(file).lines();

        let first = match lines.next() {
            None => return Err(WalkError::EmptyManifest(path.to_path_buf())),
            Some(Err(e)) if e.kind() == ErrorKind::InvalidData => {
                return Err(WalkError::Undecodable(path.to_path_buf()));
            }
            Some(Err(source)) => {
                return Err(WalkError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                });
            }
            Some(Ok(line)) => line.trim_end().to_string(),
        };

        if first.is_empty() || !Path::new(&first).exists() {
            return Err(WalkError::InvalidFirstLine {
                manifest: path.to_path_buf(),
                line: first,
            });
        }

        log::info!("Reading candidates from '{}'", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            lines,
            first: Some(PathBuf::from(first)),
            failed: false,
        })
    }
}

impl Iterator for ManifestReader {
    type Item = Result<PathBuf, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(first) = self.first.take() {
            return Some(Ok(first));
        }
        if self.failed {
            return None;
        }

        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    log::warn!("Skipping undecodable line in {}", self.path.display());
                    return Some(Err(ScanError::Io {
                        path: self.path.clone(),
                        source: e,
                    }));
                }
                Err(e) => {
                    log::warn!("Stopped reading {}: {}", self.path.display(), e);
                    self.failed = true;
                    return Some(Err(ScanError::Io {
                        path: self.path.clone(),
                        source: e,
                    }));
                }
            };

            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }

            let candidate = PathBuf::from(line);
            if candidate.exists() {
                return Some(Ok(candidate));
            }
            let error = ScanError::NotFound(candidate);
            log::warn!("{}", error);
            return Some(Err(error));
        }
    }
}
