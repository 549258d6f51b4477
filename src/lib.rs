//! chaindupe - duplicate file finder
//!
//! Candidates come from directory walks or manifest files and pass through a
//! chain of signature functions, cheapest first. Each stage splits a group into
//! the members that still match its representative and new groups for the
//! rest, so nothing is discarded until the chain ends. Every reported group
//! carries the signature values it matched at each stage.

pub mod app;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

pub use app::{run_app, run_app_with};
