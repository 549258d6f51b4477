//! Predicate gate applied to every candidate before grouping.
//!
//! The gate is an ordered list of named predicates built once from the
//! configuration. A candidate must satisfy all of them; the first failure
//! drops it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

type Check = dyn Fn(&Path) -> bool + Send + Sync;

/// A single named condition over a path.
#[derive(Clone)]
pub struct Predicate {
    name: &'static str,
    check: Arc<Check>,
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.name).finish()
    }
}

impl Predicate {
    /// Create a predicate from any function value.
    pub fn new(name: &'static str, check: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name,
            check: Arc::new(check),
        }
    }

    /// The path is a regular file (following symlinks).
    #[must_use]
    pub fn is_file() -> Self {
        Self::new("is_file", Path::is_file)
    }

    /// The path itself is not a symbolic link.
    #[must_use]
    pub fn not_symlink() -> Self {
        Self::new("not_symlink", |path| !path.is_symlink())
    }

    /// The file has a non-zero size.
    #[must_use]
    pub fn not_empty() -> Self {
        Self::new("not_empty", |path| {
            std::fs::metadata(path).is_ok_and(|m| m.len() > 0)
        })
    }

    /// Predicate name, used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Evaluate the predicate.
    #[must_use]
    pub fn test(&self, path: &Path) -> bool {
        (self.check)(path)
    }
}

/// Ordered conjunction of predicates.
#[derive(Debug, Clone)]
pub struct PredicateGate {
    predicates: Vec<Predicate>,
}

impl Default for PredicateGate {
    fn default() -> Self {
        Self::from_flags(false, false)
    }
}

impl PredicateGate {
    /// Create a gate from an explicit list.
    #[must_use]
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    /// Build the standard gate: `is_file`, then `not_symlink` unless symlinks
    /// are followed, then `not_empty` unless empty files are wanted.
    ///
    /// ```
    /// use chaindupe::scanner::PredicateGate;
    ///
    /// let gate = PredicateGate::from_flags(true, false);
    /// assert_eq!(gate.names(), vec!["is_file", "not_empty"]);
    /// ```
    #[must_use]
    pub fn from_flags(follow_symlinks: bool, include_empty_files: bool) -> Self {
        let mut predicates = vec![Predicate::is_file()];
        if !follow_symlinks {
            predicates.push(Predicate::not_symlink());
        }
        if !include_empty_files {
            predicates.push(Predicate::not_empty());
        }
        Self { predicates }
    }

    /// Append a predicate at the end of the chain.
    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    /// Names of the active predicates, in evaluation order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.predicates.iter().map(Predicate::name).collect()
    }

    /// True when every predicate holds for `path`.
    #[must_use]
    pub fn admits(&self, path: &Path) -> bool {
        match self.predicates.iter().find(|p| !p.test(path)) {
            Some(failed) => {
                log::trace!("Gate rejected {} ({})", path.display(), failed.name());
                false
            }
            None => true,
        }
    }
}
