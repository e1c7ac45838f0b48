//! # Tristore Core
//!
//! Shared layer for the tristore triple store: the term model, compact
//! tagged identifiers, inline value codecs, the binary term codec, index
//! key encoding, pattern selection, and the key-value engine seam.
//!
//! This crate is runtime-light on purpose: everything here is either pure
//! computation or a trait definition. Backends (`tristore-rocksdb`) and the
//! storage core (`tristore-store`) build on top.
//!
//! ## Identifier scheme
//!
//! Terms are referenced everywhere by a 64-bit [`TermId`]: a 4-bit type tag
//! over a 60-bit payload. URIs, blank nodes, and plain/typed literals get
//! sequence numbers from the dictionary; small integers, decimals, and
//! timestamps are packed straight into the payload and never touch storage.
//!
//! ## Example
//!
//! ```ignore
//! use tristore_core::{inline, Term, vocab};
//!
//! let id = inline::try_inline_term(&Term::typed("42", vocab::XSD_INTEGER)).unwrap();
//! assert_eq!(inline::decode_integer(id).unwrap(), 42);
//! ```

pub mod codec;
pub mod error;
pub mod index_key;
pub mod inline;
pub mod kv;
pub mod pattern;
pub mod term;
pub mod term_id;
pub mod validate;
pub mod vocab;

// Re-export main types
pub use error::{Error, Result};
pub use index_key::{IndexOrder, Triple, KEY_LEN};
pub use kv::{BatchOp, Family, KvEngine, KvIter, KvSnapshot, MemoryKv};
pub use pattern::{select_index, Binding, PredicateFilter, ScanPlan, TriplePattern};
pub use term::{Literal, LiteralKind, Term};
pub use term_id::{TermId, TermType};
pub use validate::MAX_TERM_BYTES;
