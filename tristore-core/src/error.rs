//! Error types for the tristore storage core.
//!
//! Every fallible operation in the core returns [`Result`]. Variants carry a
//! machine-readable kind (see [`Error::kind`]) so callers can dispatch on the
//! failure class without string matching. No panics cross the public boundary
//! in non-test code.

use crate::term_id::{TermId, TermType};
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // --- Validation (raised before any state change, caller-correctable) ---
    /// Encoded term exceeds the size ceiling
    #[error("term too large: {size} bytes exceeds the {max} byte ceiling")]
    TermTooLarge { size: usize, max: usize },

    /// URI terms must not contain NUL bytes
    #[error("URI term contains a NUL byte")]
    NullByteInUri,

    /// Term bytes are not valid UTF-8
    #[error("term is not valid UTF-8")]
    InvalidUtf8,

    // --- Domain / range ---
    /// Value cannot be represented inline; fall back to dictionary allocation
    #[error("value out of inline range: {0}")]
    OutOfRange(String),

    /// Decoder applied to an ID with the wrong type tag
    #[error("{id} is not an inline integer")]
    NotAnInteger { id: TermId },

    /// Decoder applied to an ID with the wrong type tag
    #[error("{id} is not an inline decimal")]
    NotADecimal { id: TermId },

    /// Decoder applied to an ID with the wrong type tag
    #[error("{id} is not an inline date-time")]
    NotADateTime { id: TermId },

    // --- Exhaustion ---
    /// Per-type sequence counter reached its ceiling; reads remain healthy
    #[error("sequence counter exhausted for {term_type} terms")]
    SequenceOverflow { term_type: TermType },

    // --- Integrity (store should be treated as degraded) ---
    /// An ID carries a type tag outside the known range
    #[error("corrupt id {id:#018x}: unknown type tag {tag}")]
    CorruptId { id: u64, tag: u8 },

    /// Stored term bytes do not decode as a term
    #[error("corrupt term bytes: {0}")]
    CorruptTerm(String),

    /// An index key is not exactly 24 bytes
    #[error("invalid index key: expected 24 bytes, got {len}")]
    InvalidKey { len: usize },

    // --- Engine ---
    /// Handle was closed before this operation
    #[error("engine already closed")]
    AlreadyClosed,

    /// Pass-through failure from the key-value engine
    #[error("engine error: {0}")]
    Engine(String),
}

impl Error {
    /// Create an out-of-range error
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Error::OutOfRange(msg.into())
    }

    /// Create a corrupt-term error
    pub fn corrupt_term(msg: impl Into<String>) -> Self {
        Error::CorruptTerm(msg.into())
    }

    /// Create an engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Error::Engine(msg.into())
    }

    /// Machine-readable kind for this error.
    ///
    /// Stable across releases; suitable for dispatch and for structured
    /// telemetry fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::TermTooLarge { .. } => "term_too_large",
            Error::NullByteInUri => "null_byte_in_uri",
            Error::InvalidUtf8 => "invalid_utf8",
            Error::OutOfRange(_) => "out_of_range",
            Error::NotAnInteger { .. } => "not_an_integer",
            Error::NotADecimal { .. } => "not_a_decimal",
            Error::NotADateTime { .. } => "not_a_datetime",
            Error::SequenceOverflow { .. } => "sequence_overflow",
            Error::CorruptId { .. } => "corrupt_id",
            Error::CorruptTerm(_) => "corrupt_term",
            Error::InvalidKey { .. } => "invalid_key",
            Error::AlreadyClosed => "already_closed",
            Error::Engine(_) => "engine",
        }
    }

    /// True for validation errors the caller can correct and retry.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::TermTooLarge { .. } | Error::NullByteInUri | Error::InvalidUtf8
        )
    }
}
