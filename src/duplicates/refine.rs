//! Progressive multi-stage refinement.
//!
//! # Overview
//!
//! The [`Refiner`] holds an ordered chain of [`SignatureFunction`]s, cheapest
//! first. Refining a stream of candidates works in two steps:
//!
//! 1. **Partition**: every candidate is signed with the first function and
//!    bucketed by value, in first-seen order. Singleton buckets are dropped.
//! 2. **Split**: each surviving group is re-signed with the next function. The
//!    members equal to the representative's value stay together and the
//!    provenance grows by that value. Every other value becomes its own
//!    provisional group that keeps the parent provenance plus its own value.
//!    The matched group continues even when only the representative is left;
//!    unmatched buckets of one file are dropped.
//!
//! Groups that have passed every stage are yielded lazily, depth-first, so the
//! first finished group is available before the rest of the tree is split.
//!
//! Files whose signature is blank (see [`Signature::is_blank`]) or whose
//! signature function fails are excluded from the group they were in.
//!
//! Signatures are computed on a bounded rayon pool. Results are collected in
//! input order, so parallelism never changes membership order or which file is
//! the representative.
//!
//! # Example
//!
//! ```no_run
//! use chaindupe::duplicates::{builtin_chain, RefineConfig, Refiner, SignatureKind};
//! use chaindupe::scanner::Hasher;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let stages = builtin_chain(
//!     &[SignatureKind::Size, SignatureKind::Blake3],
//!     &Arc::new(Hasher::new()),
//! );
//! let refiner = Refiner::new(stages, RefineConfig::default()).unwrap();
//!
//! let candidates = vec![PathBuf::from("a.bin"), PathBuf::from("b.bin")];
//! for group in refiner.refine(candidates) {
//!     println!("{:?} {}", group.members(), group.provenance());
//! }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use super::groups::Buckets;
use super::{FinderError, Group, Provenance, Signature, SignatureFunction};
use crate::progress::ProgressCallback;
use crate::scanner::HashError;

/// Candidates signed together at stage one.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Configuration for the refinement engine.
#[derive(Clone)]
pub struct RefineConfig {
    /// Threads used to compute signatures.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Candidates pulled from the input per parallel batch at stage one.
    pub batch_size: usize,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl fmt::Debug for RefineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefineConfig")
            .field("io_threads", &self.io_threads)
            .field("batch_size", &self.batch_size)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            batch_size: DEFAULT_BATCH_SIZE,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl RefineConfig {
    /// Set the number of signature threads (at least one).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the stage-one batch size (at least one).
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
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
}

/// Counters updated while refining.
#[derive(Debug, Default)]
pub struct RefineStats {
    partitioned: AtomicUsize,
    computed: AtomicUsize,
    unsigned: AtomicUsize,
    failed: AtomicUsize,
    singletons: AtomicUsize,
}

impl RefineStats {
    /// Candidates consumed by the first stage.
    #[must_use]
    pub fn partitioned(&self) -> usize {
        self.partitioned.load(Ordering::Relaxed)
    }

    /// Signatures computed across all stages.
    #[must_use]
    pub fn computed(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    /// Files excluded because their signature was blank.
    #[must_use]
    pub fn unsigned(&self) -> usize {
        self.unsigned.load(Ordering::Relaxed)
    }

    /// Files excluded because a signature function failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Singleton partitions and unmatched buckets dropped.
    #[must_use]
    pub fn singletons(&self) -> usize {
        self.singletons.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicUsize, by: usize) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// The refinement engine.
///
/// Cloning is cheap; clones share the thread pool and statistics.
#[derive(Clone)]
pub struct Refiner {
    stages: Arc<[Arc<dyn SignatureFunction>]>,
    config: RefineConfig,
    pool: Option<Arc<rayon::ThreadPool>>,
    stats: Arc<RefineStats>,
}

impl fmt::Debug for Refiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refiner")
            .field("stages", &self.labels())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Refiner {
    /// Create an engine over `stages`, applied in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::NoSignatureFunctions`] if `stages` is empty.
    pub fn new(
        stages: Vec<Arc<dyn SignatureFunction>>,
        config: RefineConfig,
    ) -> Result<Self, FinderError> {
        if stages.is_empty() {
            return Err(FinderError::NoSignatureFunctions);
        }

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(config.io_threads.max(1))
            .thread_name(|i| format!("chaindupe-io-{i}"))
            .build()
        {
            Ok(pool) => Some(Arc::new(pool)),
            Err(e) => {
                log::warn!(
                    "Failed to create I/O thread pool ({}), using global pool with {} threads",
                    e,
                    rayon::current_num_threads()
                );
                None
            }
        };

        Ok(Self {
            stages: stages.into(),
            config,
            pool,
            stats: Arc::new(RefineStats::default()),
        })
    }

    /// Number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage labels in order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.label()).collect()
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> Arc<RefineStats> {
        Arc::clone(&self.stats)
    }

    /// Refine `candidates` into groups that matched under every stage.
    ///
    /// Nothing is read until the returned iterator is first polled.
    pub fn refine<I>(&self, candidates: I) -> Refinement<I::IntoIter>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Refinement {
            refiner: self.clone(),
            candidates: Some(candidates.into_iter()),
            pending: VecDeque::new(),
            entered: 0,
            finished: false,
        }
    }

    fn is_shutdown_requested(&self) -> bool {
        self.config
            .shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Compute one signature, mapping blank values and failures to `None`.
    fn sign(&self, function: &dyn SignatureFunction, path: &Path) -> Option<Signature> {
        RefineStats::bump(&self.stats.computed, 1);
        match function.signature(path) {
            Ok(sig) if sig.is_blank() => {
                log::trace!("No {} signature for {}", function.label(), path.display());
                RefineStats::bump(&self.stats.unsigned, 1);
                None
            }
            Ok(sig) => Some(sig),
            Err(HashError::Interrupted(_)) => None,
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                RefineStats::bump(&self.stats.failed, 1);
                None
            }
        }
    }

    /// Sign every path in parallel, results in input order.
    fn sign_all(&self, function: &dyn SignatureFunction, paths: &[PathBuf]) -> Vec<Option<Signature>> {
        let compute = || {
            paths
                .par_iter()
                .map(|path| self.sign(function, path))
                .collect::<Vec<_>>()
        };
        match &self.pool {
            Some(pool) => pool.install(compute),
            None => compute(),
        }
    }

    /// Stage one: bucket every candidate by the first signature.
    fn partition(&self, candidates: impl Iterator<Item = PathBuf>) -> Vec<Group> {
        let function = self.stages[0].as_ref();
        let mut candidates = candidates;
        let mut buckets = Buckets::new();
        let mut seen = 0usize;

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("partition", 0);
        }

        loop {
            if self.is_shutdown_requested() {
                log::debug!("Partition: Shutdown requested, stopping");
                break;
            }
            let batch: Vec<PathBuf> = candidates
                .by_ref()
                .take(self.config.batch_size)
                .collect();
            if batch.is_empty() {
                break;
            }

            let signatures = self.sign_all(function, &batch);
            for (path, signature) in batch.into_iter().zip(signatures) {
                seen += 1;
                if let Some(ref callback) = self.config.progress_callback {
                    callback.on_progress(seen, path.to_string_lossy().as_ref());
                }
                if let Some(signature) = signature {
                    buckets.insert(signature, path);
                }
            }
        }

        RefineStats::bump(&self.stats.partitioned, seen);
        let distinct = buckets.len();
        let (groups, dropped) = buckets.into_groups(&Provenance::new());
        RefineStats::bump(&self.stats.singletons, dropped);

        log::debug!(
            "Stage 1 ({}): {} candidates, {} distinct values, {} groups",
            function.label(),
            seen,
            distinct,
            groups.len()
        );
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("partition");
        }

        groups
    }

    /// Stage `stage` (>= 1): split one group by the next signature.
    fn split(&self, group: Group, stage: usize) -> Vec<Group> {
        let function = self.stages[stage].as_ref();
        let (members, provenance) = group.into_parts();
        let signatures = self.sign_all(function, &members);

        let mut members = members.into_iter().zip(signatures);
        let Some((representative, source)) = members.next() else {
            return Vec::new();
        };

        let mut buckets = Buckets::new();
        let mut children = Vec::new();

        match source {
            Some(source) => {
                let mut matched = vec![representative];
                for (path, signature) in members {
                    match signature {
                        Some(sig) if sig == source => matched.push(path),
                        Some(sig) => buckets.insert(sig, path),
                        None => {}
                    }
                }
                // The matched group survives even alone; size filtering happens downstream.
                children.push(Group::new(matched, provenance.extended(source)));
            }
            None => {
                log::trace!(
                    "Representative {} has no {} signature",
                    representative.display(),
                    function.label()
                );
                for (path, signature) in members {
                    if let Some(sig) = signature {
                        buckets.insert(sig, path);
                    }
                }
            }
        }

        let (unmatched, dropped) = buckets.into_groups(&provenance);
        RefineStats::bump(&self.stats.singletons, dropped);
        if !unmatched.is_empty() {
            log::trace!(
                "Stage {} ({}): {} unmatched groups split off",
                stage + 1,
                function.label(),
                unmatched.len()
            );
        }
        children.extend(unmatched);
        children
    }
}

/// Lazy sequence of finished groups.
///
/// See [`Refiner::refine`].
pub struct Refinement<I> {
    refiner: Refiner,
    candidates: Option<I>,
    /// Groups waiting for a stage, with the index of that stage.
    pending: VecDeque<(Group, usize)>,
    /// Partition groups that have entered stage two.
    entered: usize,
    finished: bool,
}

impl<I> fmt::Debug for Refinement<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refinement")
            .field("started", &self.candidates.is_none())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<I> Refinement<I> {
    /// Shared counters of the underlying engine.
    #[must_use]
    pub fn stats(&self) -> Arc<RefineStats> {
        self.refiner.stats()
    }
}

impl<I> Iterator for Refinement<I>
where
    I: Iterator<Item = PathBuf>,
{
    type Item = Group;

    fn next(&mut self) -> Option<Group> {
        if let Some(candidates) = self.candidates.take() {
            let groups = self.refiner.partition(candidates);
            self.pending.extend(groups.into_iter().map(|g| (g, 1)));
            if self.refiner.stage_count() > 1 {
                if let Some(ref callback) = self.refiner.config.progress_callback {
                    callback.on_phase_start("refine", self.pending.len());
                }
            }
        }

        while let Some((group, stage)) = self.pending.pop_front() {
            if self.refiner.is_shutdown_requested() {
                log::debug!("Refine: Shutdown requested, dropping {} groups", self.pending.len() + 1);
                self.pending.clear();
                return None;
            }
            if stage >= self.refiner.stage_count() {
                if self.pending.is_empty() {
                    self.finish();
                }
                return Some(group);
            }

            if stage == 1 {
                self.entered += 1;
                if let Some(ref callback) = self.refiner.config.progress_callback {
                    callback.on_progress(
                        self.entered,
                        group.representative().to_string_lossy().as_ref(),
                    );
                }
            }
            // Depth-first: children go ahead of the remaining groups.
            for child in self.refiner.split(group, stage).into_iter().rev() {
                self.pending.push_front((child, stage + 1));
            }
        }

        self.finish();
        None
    }
}

impl<I> Refinement<I> {
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if self.refiner.stage_count() > 1 {
            if let Some(ref callback) = self.refiner.config.progress_callback {
                callback.on_phase_end("refine");
            }
        }
    }
}
