//! Signatures and the functions that compute them.
//!
//! # Overview
//!
//! A [`Signature`] is an opaque comparable value derived from a file: its size,
//! its name, a digest of its content, and so on. A [`SignatureFunction`] maps a
//! path to a signature. The refinement engine only ever compares signatures for
//! equality and hashes them as map keys.
//!
//! The built-in functions are named by [`SignatureKind`] and are listed by the
//! `signatures` subcommand. Library users can plug in any closure with
//! [`from_fn`].
//!
//! # Example
//!
//! ```no_run
//! use chaindupe::duplicates::{BuiltinSignature, SignatureFunction, SignatureKind};
//! use chaindupe::scanner::Hasher;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let size = BuiltinSignature::new(SignatureKind::Size, Arc::new(Hasher::new()));
//! let value = size.signature(Path::new("Cargo.toml")).unwrap();
//! println!("{} = {}", size.label(), value);
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize, Serializer};

use crate::scanner::{hash_to_hex, Hash, HashError, Hasher};

/// Signatures whose text is at least this long are never blank.
const BLANK_LIMIT: usize = 10;

/// Bytes shown before a long byte signature is shortened.
const BYTES_PREVIEW: usize = 16;

/// A comparable value computed from a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Signature {
    /// A byte count.
    Size(u64),
    /// Nanoseconds since the Unix epoch (negative before it).
    Timestamp(i128),
    /// Free text, such as a file name.
    Text(String),
    /// A 32-byte content digest.
    Digest(Hash),
    /// Raw bytes, compared directly.
    Bytes(Vec<u8>),
}

impl Signature {
    /// True when the value carries no meaningful information: its text form is
    /// shorter than ten characters and contains nothing but whitespace.
    ///
    /// ```
    /// use chaindupe::duplicates::Signature;
    ///
    /// assert!(Signature::Text("  ".to_string()).is_blank());
    /// assert!(!Signature::Text("a.txt".to_string()).is_blank());
    /// assert!(!Signature::Size(0).is_blank());
    /// ```
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Size(_) | Self::Timestamp(_) | Self::Digest(_) => false,
            Self::Text(text) => text.chars().count() < BLANK_LIMIT && text.trim().is_empty(),
            Self::Bytes(bytes) => bytes.is_empty(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size(size) => write!(f, "{size}"),
            Self::Timestamp(nanos) => write!(f, "{nanos}"),
            Self::Text(text) => f.write_str(text),
            Self::Digest(hash) => f.write_str(&hash_to_hex(hash)),
            Self::Bytes(bytes) if bytes.len() > BYTES_PREVIEW => {
                for b in &bytes[..BYTES_PREVIEW] {
                    write!(f, "{b:02x}")?;
                }
                write!(f, "...({} bytes)", bytes.len())
            }
            Self::Bytes(bytes) => {
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Size(size) => serializer.serialize_u64(*size),
            other => serializer.collect_str(other),
        }
    }
}

/// Built-in signature functions, selectable by name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SignatureKind {
    /// Byte length from metadata
    Size,
    /// Modification time
    Mtime,
    /// File basename
    Name,
    /// BLAKE3 of the leading chunks
    Partial,
    /// BLAKE3 of the full content
    Blake3,
    /// SHA-256 of the full content
    Sha256,
    /// Full content, compared directly
    Bytes,
}

impl SignatureKind {
    /// Every built-in kind, cheapest first.
    #[must_use]
    pub fn all() -> &'static [SignatureKind] {
        &[
            Self::Size,
            Self::Mtime,
            Self::Name,
            Self::Partial,
            Self::Blake3,
            Self::Sha256,
            Self::Bytes,
        ]
    }

    /// The chain used when nothing is configured.
    #[must_use]
    pub fn default_chain() -> Vec<SignatureKind> {
        vec![Self::Size, Self::Blake3]
    }

    /// Name as accepted on the command line and in config files.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Mtime => "mtime",
            Self::Name => "name",
            Self::Partial => "partial",
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
            Self::Bytes => "bytes",
        }
    }

    /// One-line description for `chaindupe signatures`.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Size => "file size in bytes",
            Self::Mtime => "modification time (nanoseconds since the Unix epoch)",
            Self::Name => "file name without directory",
            Self::Partial => "BLAKE3 of the first partial-chunks x 64 KiB",
            Self::Blake3 => "BLAKE3 of the whole file",
            Self::Sha256 => "SHA-256 of the whole file",
            Self::Bytes => "the whole file content, compared byte for byte",
        }
    }

    /// Whether computing this signature reads file content.
    #[must_use]
    pub fn reads_content(self) -> bool {
        matches!(
            self,
            Self::Partial | Self::Blake3 | Self::Sha256 | Self::Bytes
        )
    }

    /// Compute this signature for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if metadata or content cannot be read.
    pub fn compute(self, hasher: &Hasher, path: &Path) -> Result<Signature, HashError> {
        match self {
            Self::Size => std::fs::metadata(path)
                .map(|m| Signature::Size(m.len()))
                .map_err(|e| HashError::from_io(path, e)),
            Self::Mtime => {
                let modified = std::fs::metadata(path)
                    .and_then(|m| m.modified())
                    .map_err(|e| HashError::from_io(path, e))?;
                let nanos = match modified.duration_since(UNIX_EPOCH) {
                    Ok(after) => after.as_nanos() as i128,
                    Err(before) => -(before.duration().as_nanos() as i128),
                };
                Ok(Signature::Timestamp(nanos))
            }
            Self::Name => Ok(Signature::Text(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )),
            Self::Partial => hasher.partial_hash(path).map(Signature::Digest),
            Self::Blake3 => hasher.full_hash(path).map(Signature::Digest),
            Self::Sha256 => hasher.sha256(path).map(Signature::Digest),
            Self::Bytes => hasher.contents(path).map(Signature::Bytes),
        }
    }
}

impl fmt::Display for SignatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A function from a path to a [`Signature`].
///
/// Implementations must be deterministic for an unchanged file; the engine
/// computes each signature at most once per file and stage.
pub trait SignatureFunction: Send + Sync {
    /// Short name used in logs.
    fn label(&self) -> &str;

    /// Compute the signature of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the file cannot be inspected. The engine
    /// excludes the file and carries on.
    fn signature(&self, path: &Path) -> Result<Signature, HashError>;
}

/// A [`SignatureKind`] bound to a shared [`Hasher`].
#[derive(Debug, Clone)]
pub struct BuiltinSignature {
    kind: SignatureKind,
    hasher: Arc<Hasher>,
}

impl BuiltinSignature {
    /// Bind `kind` to `hasher`.
    #[must_use]
    pub fn new(kind: SignatureKind, hasher: Arc<Hasher>) -> Self {
        Self { kind, hasher }
    }

    /// The bound kind.
    #[must_use]
    pub fn kind(&self) -> SignatureKind {
        self.kind
    }
}

impl SignatureFunction for BuiltinSignature {
    fn label(&self) -> &str {
        self.kind.name()
    }

    fn signature(&self, path: &Path) -> Result<Signature, HashError> {
        self.kind.compute(&self.hasher, path)
    }
}

/// A closure wrapped as a [`SignatureFunction`].
pub struct FnSignature<F> {
    label: String,
    function: F,
}

impl<F> fmt::Debug for FnSignature<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSignature")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl<F> SignatureFunction for FnSignature<F>
where
    F: Fn(&Path) -> Result<Signature, HashError> + Send + Sync,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn signature(&self, path: &Path) -> Result<Signature, HashError> {
        (self.function)(path)
    }
}

/// Wrap a closure as a shareable signature function.
///
/// ```
/// use chaindupe::duplicates::{from_fn, Signature, SignatureFunction};
///
/// let ext = from_fn("extension", |path| {
///     Ok(Signature::Text(
///         path.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default(),
///     ))
/// });
/// assert_eq!(ext.label(), "extension");
/// ```
pub fn from_fn<F>(label: impl Into<String>, function: F) -> Arc<dyn SignatureFunction>
where
    F: Fn(&Path) -> Result<Signature, HashError> + Send + Sync + 'static,
{
    Arc::new(FnSignature {
        label: label.into(),
        function,
    })
}

/// Bind each kind to one shared hasher, preserving order.
#[must_use]
pub fn builtin_chain(kinds: &[SignatureKind], hasher: &Arc<Hasher>) -> Vec<Arc<dyn SignatureFunction>> {
    kinds
        .iter()
        .map(|&kind| {
            Arc::new(BuiltinSignature::new(kind, Arc::clone(hasher))) as Arc<dyn SignatureFunction>
        })
        .collect()
}
