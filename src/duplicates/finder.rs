//! Duplicate finder: walker, predicate gate and refinement wired together.
//!
//! # Overview
//!
//! [`DuplicateFinder`] runs the whole pipeline:
//!
//! 1. **Discovery**: every root is walked (or read as a manifest) by
//!    [`crate::scanner::walk_roots`].
//! 2. **Gate**: candidates go through the [`PredicateGate`] built from the
//!    configuration.
//! 3. **Refinement**: admitted candidates flow lazily into the [`Refiner`]
//!    with the configured signature chain.
//! 4. **Report filter**: finished groups smaller than the minimum group size
//!    are dropped.
//!
//! [`DuplicateFinder::stream`] returns the groups as an iterator, so callers
//! can print each group as soon as it is final. [`DuplicateFinder::find_duplicates`]
//! collects them.
//!
//! # Example
//!
//! ```no_run
//! use chaindupe::duplicates::{DuplicateFinder, FinderConfig, SignatureKind};
//! use std::path::PathBuf;
//!
//! let config = FinderConfig::default()
//!     .with_signatures(vec![SignatureKind::Size, SignatureKind::Partial, SignatureKind::Blake3]);
//! let finder = DuplicateFinder::new(config);
//!
//! let (groups, summary) = finder.find_duplicates(&[PathBuf::from(".")]).unwrap();
//! println!("{} groups, {} duplicate files", groups.len(), summary.duplicate_files);
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;

use super::refine::{RefineConfig, RefineStats, Refinement, Refiner};
use super::signature::{builtin_chain, SignatureFunction, SignatureKind};
use super::Group;
use crate::progress::ProgressCallback;
use crate::scanner::{walk_roots, Hasher, PredicateGate, WalkError, WalkerConfig, DEFAULT_PARTIAL_CHUNKS};

/// Default smallest group size that is reported.
pub const DEFAULT_MIN_GROUP_SIZE: usize = 2;

/// Configuration for the full pipeline.
#[derive(Clone)]
pub struct FinderConfig {
    /// Discovery rules.
    pub walker_config: WalkerConfig,
    /// Admit symbolic links (drops the `not_symlink` predicate).
    pub follow_symlinks: bool,
    /// Admit empty files (drops the `not_empty` predicate).
    pub include_empty_files: bool,
    /// Signature chain, cheapest first.
    pub signatures: Vec<SignatureKind>,
    /// Chunks covered by the `partial` signature.
    pub partial_chunks: usize,
    /// Groups smaller than this are not reported (at least 1).
    pub min_group_size: usize,
    /// Number of I/O threads for parallel hashing.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinderConfig")
            .field("walker_config", &self.walker_config)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("include_empty_files", &self.include_empty_files)
            .field("signatures", &self.signatures)
            .field("partial_chunks", &self.partial_chunks)
            .field("min_group_size", &self.min_group_size)
            .field("io_threads", &self.io_threads)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            walker_config: WalkerConfig::default(),
            follow_symlinks: false,
            include_empty_files: false,
            signatures: SignatureKind::default_chain(),
            partial_chunks: DEFAULT_PARTIAL_CHUNKS,
            min_group_size: DEFAULT_MIN_GROUP_SIZE,
            io_threads: 4,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the discovery rules.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Admit symbolic links.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Admit empty files.
    #[must_use]
    pub fn with_include_empty_files(mut self, include: bool) -> Self {
        self.include_empty_files = include;
        self
    }

    /// Set the signature chain.
    #[must_use]
    pub fn with_signatures(mut self, signatures: Vec<SignatureKind>) -> Self {
        self.signatures = signatures;
        self
    }

    /// Set the chunks covered by the `partial` signature.
    #[must_use]
    pub fn with_partial_chunks(mut self, chunks: usize) -> Self {
        self.partial_chunks = chunks.max(1);
        self
    }

    /// Set the minimum reported group size (clamped to 1).
    ///
    /// With 1, files split off from their group at a later stage are
    /// reported on their own.
    #[must_use]
    pub fn with_min_group_size(mut self, size: usize) -> Self {
        self.min_group_size = size.max(1);
        self
    }

    /// Set the number of I/O threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// The predicate gate these settings describe.
    #[must_use]
    pub fn gate(&self) -> PredicateGate {
        PredicateGate::from_flags(self.follow_symlinks, self.include_empty_files)
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Statistics for one run.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Paths produced by the walkers
    pub candidates: usize,
    /// Candidates admitted by the predicate gate
    pub admitted: usize,
    /// Candidates rejected by the predicate gate
    pub rejected: usize,
    /// Recoverable discovery errors (unreadable directories, missing manifest lines)
    pub scan_errors: usize,
    /// Files dropped because a signature was blank
    pub unsigned: usize,
    /// Files dropped because a signature function failed
    pub failed: usize,
    /// Signatures computed across all stages
    pub signatures_computed: usize,
    /// Number of reported duplicate groups
    pub duplicate_groups: usize,
    /// Reported files beyond each group's representative
    pub duplicate_files: usize,
    /// Bytes held by those extra files
    pub reclaimable_space: u64,
    /// Duration of the entire scan
    pub scan_duration: Duration,
    /// Whether the scan was interrupted
    pub interrupted: bool,
}

impl ScanSummary {
    /// True when any file was skipped because of an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.scan_errors > 0 || self.failed > 0
    }

    /// Format reclaimable space as human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize::b(self.reclaimable_space).to_string()
    }
}

/// Errors that end a run.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// A root could not be walked.
    #[error(transparent)]
    Walk(#[from] WalkError),

    /// The signature chain is empty.
    #[error("At least one signature function is required")]
    NoSignatureFunctions,
}

/// Discovery counters shared with the gated candidate iterator.
#[derive(Debug, Default)]
struct DiscoveryCounters {
    candidates: AtomicUsize,
    admitted: AtomicUsize,
    rejected: AtomicUsize,
    scan_errors: AtomicUsize,
}

/// Main duplicate finder.
#[derive(Debug)]
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Arc<Hasher>,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let mut hasher = Hasher::new().with_partial_chunks(config.partial_chunks);
        if let Some(ref flag) = config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(flag.clone());
        }
        Self {
            config,
            hasher: Arc::new(hasher),
        }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// The configured signature chain bound to this finder's hasher.
    #[must_use]
    pub fn signature_functions(&self) -> Vec<Arc<dyn SignatureFunction>> {
        builtin_chain(&self.config.signatures, &self.hasher)
    }

    /// Start a lazy scan with the configured signature chain.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] if a root cannot be opened, a manifest is
    /// invalid, the chain is empty, or shutdown was already requested.
    pub fn stream(&self, roots: &[PathBuf]) -> Result<DuplicateStream, FinderError> {
        if let Some(first) = self.config.signatures.first() {
            if first.reads_content() {
                log::warn!(
                    "First signature '{}' reads every candidate in full; put 'size' first to skip most reads",
                    first
                );
            }
        }
        self.stream_with(roots, self.signature_functions())
    }

    /// Start a lazy scan with a caller-supplied signature chain.
    ///
    /// # Errors
    ///
    /// Same as [`DuplicateFinder::stream`].
    pub fn stream_with(
        &self,
        roots: &[PathBuf],
        functions: Vec<Arc<dyn SignatureFunction>>,
    ) -> Result<DuplicateStream, FinderError> {
        let start = Instant::now();

        if self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        let mut refine_config = RefineConfig::default().with_io_threads(self.config.io_threads);
        if let Some(ref flag) = self.config.shutdown_flag {
            refine_config = refine_config.with_shutdown_flag(flag.clone());
        }
        if let Some(ref callback) = self.config.progress_callback {
            refine_config = refine_config.with_progress_callback(callback.clone());
        }
        let refiner = Refiner::new(functions, refine_config)?;

        log::info!(
            "Scanning {} root(s) with signatures [{}]",
            roots.len(),
            refiner.labels().join(", ")
        );

        let walk = walk_roots(
            roots,
            &self.config.walker_config,
            self.config.shutdown_flag.clone(),
        )?;

        let gate = self.config.gate();
        log::debug!("Predicate gate: [{}]", gate.names().join(", "));

        let counters = Arc::new(DiscoveryCounters::default());
        let discovery = Arc::clone(&counters);
        let admitted = walk.filter_map(move |candidate| match candidate {
            Ok(path) => {
                discovery.candidates.fetch_add(1, Ordering::Relaxed);
                if gate.admits(&path) {
                    discovery.admitted.fetch_add(1, Ordering::Relaxed);
                    Some(path)
                } else {
                    discovery.rejected.fetch_add(1, Ordering::Relaxed);
                    None
                }
            }
            Err(_) => {
                discovery.scan_errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        });
        let admitted: Box<dyn Iterator<Item = PathBuf>> = Box::new(admitted);

        Ok(DuplicateStream {
            stats: refiner.stats(),
            groups: refiner.refine(admitted),
            counters,
            min_group_size: self.config.min_group_size.max(1),
            shutdown_flag: self.config.shutdown_flag.clone(),
            start,
            duplicate_groups: 0,
            duplicate_files: 0,
            reclaimable_space: 0,
        })
    }

    /// Run the whole pipeline and collect every reported group.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] if the scan cannot start or was interrupted.
    pub fn find_duplicates(
        &self,
        roots: &[PathBuf],
    ) -> Result<(Vec<Group>, ScanSummary), FinderError> {
        let mut stream = self.stream(roots)?;
        let groups: Vec<Group> = stream.by_ref().collect();
        let summary = stream.summary();

        if summary.interrupted {
            return Err(FinderError::Interrupted);
        }

        log::info!(
            "Found {} duplicate groups ({} duplicate files) in {:.2?}",
            summary.duplicate_groups,
            summary.duplicate_files,
            summary.scan_duration
        );
        Ok((groups, summary))
    }
}

/// Lazy stream of reportable groups.
pub struct DuplicateStream {
    groups: Refinement<Box<dyn Iterator<Item = PathBuf>>>,
    stats: Arc<RefineStats>,
    counters: Arc<DiscoveryCounters>,
    min_group_size: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
    start: Instant,
    duplicate_groups: usize,
    duplicate_files: usize,
    reclaimable_space: u64,
}

impl fmt::Debug for DuplicateStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplicateStream")
            .field("min_group_size", &self.min_group_size)
            .field("duplicate_groups", &self.duplicate_groups)
            .finish_non_exhaustive()
    }
}

impl DuplicateStream {
    /// Statistics so far. Final once the stream is exhausted.
    #[must_use]
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            candidates: self.counters.candidates.load(Ordering::Relaxed),
            admitted: self.counters.admitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            scan_errors: self.counters.scan_errors.load(Ordering::Relaxed),
            unsigned: self.stats.unsigned(),
            failed: self.stats.failed(),
            signatures_computed: self.stats.computed(),
            duplicate_groups: self.duplicate_groups,
            duplicate_files: self.duplicate_files,
            reclaimable_space: self.reclaimable_space,
            scan_duration: self.start.elapsed(),
            interrupted: self
                .shutdown_flag
                .as_ref()
                .is_some_and(|f| f.load(Ordering::SeqCst)),
        }
    }
}

impl Iterator for DuplicateStream {
    type Item = Group;

    fn next(&mut self) -> Option<Group> {
        loop {
            let group = self.groups.next()?;
            if group.len() < self.min_group_size {
                log::trace!(
                    "Dropping group of {} below minimum size {}",
                    group.len(),
                    self.min_group_size
                );
                continue;
            }

            let extra = group.len() - 1;
            if extra > 0 {
                self.duplicate_groups += 1;
            }
            self.duplicate_files += extra;
            if let Ok(metadata) = std::fs::metadata(group.representative()) {
                self.reclaimable_space += metadata.len() * extra as u64;
            }
            return Some(group);
        }
    }
}
