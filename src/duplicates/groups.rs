//! Groups of provisionally equal files and their provenance.
//!
//! # Overview
//!
//! A [`Group`] is an ordered, non-empty list of paths that produced equal
//! signatures under every function applied so far. Its first member is the
//! representative. The [`Provenance`] records the signature value the group
//! matched at each stage, so a reported group always carries exactly one value
//! per function in the chain.
//!
//! # Example
//!
//! ```
//! use chaindupe::duplicates::{Group, Provenance, Signature};
//! use std::path::PathBuf;
//!
//! let provenance = Provenance::from(vec![Signature::Size(10)]);
//! let group = Group::new(vec![PathBuf::from("a"), PathBuf::from("b")], provenance);
//!
//! assert_eq!(group.representative(), &PathBuf::from("a"));
//! assert_eq!(group.provenance().to_string(), "f1=10");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::Signature;

/// Signature values a group matched, one per stage applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance(Vec<Signature>);

impl Provenance {
    /// Empty provenance, before any stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stages recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True before any stage.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values in stage order.
    #[must_use]
    pub fn signatures(&self) -> &[Signature] {
        &self.0
    }

    /// Values labeled `f1`, `f2`, ... in stage order.
    pub fn labeled(&self) -> impl Iterator<Item = (String, &Signature)> + '_ {
        self.0
            .iter()
            .enumerate()
            .map(|(i, sig)| (format!("f{}", i + 1), sig))
    }

    /// A copy extended by one stage.
    #[must_use]
    pub(crate) fn extended(&self, signature: Signature) -> Self {
        let mut values = Vec::with_capacity(self.0.len() + 1);
        values.extend_from_slice(&self.0);
        values.push(signature);
        Self(values)
    }
}

impl From<Vec<Signature>> for Provenance {
    fn from(values: Vec<Signature>) -> Self {
        Self(values)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (label, sig)) in self.labeled().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{label}={sig}")?;
        }
        Ok(())
    }
}

impl Serialize for Provenance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, sig) in self.labeled() {
            map.serialize_entry(&label, sig)?;
        }
        map.end()
    }
}

/// Files that matched each other under every stage so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    #[serde(rename = "files")]
    members: Vec<PathBuf>,
    provenance: Provenance,
}

impl Group {
    /// Create a group.
    ///
    /// # Panics
    ///
    /// Debug assertion fails if `members` is empty.
    #[must_use]
    pub fn new(members: Vec<PathBuf>, provenance: Provenance) -> Self {
        debug_assert!(!members.is_empty(), "a group needs a representative");
        Self {
            members,
            provenance,
        }
    }

    /// The first-discovered member.
    #[must_use]
    pub fn representative(&self) -> &PathBuf {
        &self.members[0]
    }

    /// Members in discovery order, representative first.
    #[must_use]
    pub fn members(&self) -> &[PathBuf] {
        &self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false for a constructed group.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Signature values matched so far.
    #[must_use]
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Split into members and provenance.
    #[must_use]
    pub fn into_parts(self) -> (Vec<PathBuf>, Provenance) {
        (self.members, self.provenance)
    }
}

/// Paths bucketed by signature, buckets kept in first-seen order.
#[derive(Debug, Default)]
pub(crate) struct Buckets {
    index: HashMap<Signature, usize>,
    buckets: Vec<(Signature, Vec<PathBuf>)>,
}

impl Buckets {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, signature: Signature, path: PathBuf) {
        match self.index.get(&signature) {
            Some(&slot) => self.buckets[slot].1.push(path),
            None => {
                self.index.insert(signature.clone(), self.buckets.len());
                self.buckets.push((signature, vec![path]));
            }
        }
    }

    /// Number of distinct signatures seen.
    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Turn every bucket with two or more paths into a group whose provenance
    /// is `prefix` plus the bucket's value. Returns the groups and the number
    /// of singleton buckets dropped.
    pub(crate) fn into_groups(self, prefix: &Provenance) -> (Vec<Group>, usize) {
        let mut dropped = 0;
        let mut groups = Vec::new();

        for (signature, members) in self.buckets {
            if members.len() < 2 {
                dropped += 1;
                continue;
            }
            groups.push(Group::new(members, prefix.extended(signature)));
        }

        (groups, dropped)
    }
}
