//! Streaming file hasher.
//!
//! # Overview
//! This module provides the [`Hasher`] struct for computing BLAKE3 and SHA-256
//! digests of file contents, plus a bounded "partial" BLAKE3 over the first
//! chunks of a file. All reads are streamed in [`CHUNK_SIZE`] pieces and the
//! file handle is released as soon as the read completes.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::HashError;

/// Size of a single read.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Number of chunks read by [`Hasher::partial_hash`] unless configured otherwise.
pub const DEFAULT_PARTIAL_CHUNKS: usize = 200;

/// A 32-byte digest (BLAKE3 or SHA-256).
pub type Hash = [u8; 32];

/// Render a digest as lowercase hexadecimal.
///
/// ```
/// use chaindupe::scanner::hash_to_hex;
///
/// assert_eq!(hash_to_hex(&[0u8; 32]).len(), 64);
/// ```
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Streaming content hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    partial_chunks: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher reading [`DEFAULT_PARTIAL_CHUNKS`] chunks for partial hashes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            partial_chunks: DEFAULT_PARTIAL_CHUNKS,
            shutdown_flag: None,
        }
    }

    /// Set how many chunks the partial hash covers (at least one).
    #[must_use]
    pub fn with_partial_chunks(mut self, chunks: usize) -> Self {
        self.partial_chunks = chunks.max(1);
        self
    }

    /// Abort reads when the flag is raised.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Number of bytes covered by [`Hasher::partial_hash`].
    #[must_use]
    pub fn partial_len(&self) -> u64 {
        (self.partial_chunks as u64) * CHUNK_SIZE as u64
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// BLAKE3 of the first [`Hasher::partial_len`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be read or shutdown was requested.
    pub fn partial_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let mut hasher = blake3::Hasher::new();
        self.stream(path, Some(self.partial_len()), |chunk| {
            hasher.update(chunk);
        })?;
        Ok(*hasher.finalize().as_bytes())
    }

    /// BLAKE3 of the whole file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be read or shutdown was requested.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let mut hasher = blake3::Hasher::new();
        self.stream(path, None, |chunk| {
            hasher.update(chunk);
        })?;
        Ok(*hasher.finalize().as_bytes())
    }

    /// SHA-256 of the whole file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be read or shutdown was requested.
    pub fn sha256(&self, path: &Path) -> Result<Hash, HashError> {
        let mut hasher = Sha256::new();
        self.stream(path, None, |chunk| hasher.update(chunk))?;
        Ok(hasher.finalize().into())
    }

    /// The whole file content.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be read or shutdown was requested.
    pub fn contents(&self, path: &Path) -> Result<Vec<u8>, HashError> {
        let mut data = Vec::new();
        self.stream(path, None, |chunk| data.extend_from_slice(chunk))?;
        Ok(data)
    }

    fn stream(
        &self,
        path: &Path,
        limit: Option<u64>,
        mut sink: impl FnMut(&[u8]),
    ) -> Result<(), HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut reader: Box<dyn Read> = match limit {
            Some(limit) => Box::new(file.take(limit)),
            None => Box::new(file),
        };
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(PathBuf::from(path)));
            }
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            sink(&buffer[..read]);
        }

        Ok(())
    }
}
