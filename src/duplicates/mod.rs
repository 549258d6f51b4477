//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Signatures and signature functions ([`signature`])
//! - Groups and their provenance ([`groups`])
//! - The progressive refinement engine ([`refine`])
//! - The end-to-end pipeline ([`finder`])

pub mod finder;
pub mod groups;
pub mod refine;
pub mod signature;

pub use finder::{
    DuplicateFinder, DuplicateStream, FinderConfig, FinderError, ScanSummary, DEFAULT_MIN_GROUP_SIZE,
};
pub use groups::{Group, Provenance};
pub use refine::{RefineConfig, RefineStats, Refinement, Refiner};
pub use signature::{
    builtin_chain, from_fn, BuiltinSignature, FnSignature, Signature, SignatureFunction,
    SignatureKind,
};
