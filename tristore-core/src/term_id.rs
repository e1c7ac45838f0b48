//! Compact term identifiers.
//!
//! [`TermId`] is a 64-bit tagged union: the high 4 bits select a type tag,
//! the low 60 bits carry the payload. Tags 1-3 cover dictionary-allocated
//! terms (the payload is a sequence number); tags 4-6 cover inline values
//! (the payload *is* the value, so no dictionary round-trip is needed).
//!
//! **Collision freedom:** the tag partitions the 64-bit space, so no two IDs
//! of different types can ever be equal, and within an allocated type IDs are
//! totally ordered by allocation order.
//!
//! Serialised form everywhere (index keys, dictionary keys, counter
//! checkpoints) is 8 bytes big-endian, which makes lexicographic byte order
//! equal numeric order.

use std::fmt;

// Tag constants (high nibble)
const TAG_URI: u8 = 0x1;
const TAG_BNODE: u8 = 0x2;
const TAG_LITERAL: u8 = 0x3;
const TAG_INTEGER: u8 = 0x4;
const TAG_DECIMAL: u8 = 0x5;
const TAG_DATETIME: u8 = 0x6;

const TAG_SHIFT: u32 = 60;

/// Mask for the 60-bit payload.
pub const PAYLOAD_MASK: u64 = (1u64 << TAG_SHIFT) - 1;

/// Term type selected by an ID's tag nibble.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TermType {
    /// IRI reference (allocated)
    Uri,
    /// Blank node label (allocated)
    BlankNode,
    /// Literal (allocated)
    Literal,
    /// Inline integer, two's-complement in 60 bits
    Integer,
    /// Inline decimal, sign/exponent/mantissa in 60 bits
    Decimal,
    /// Inline date-time, UTC Unix milliseconds in 60 bits
    DateTime,
}

impl TermType {
    /// All term types, allocated first.
    pub fn all() -> &'static [TermType] {
        &[
            TermType::Uri,
            TermType::BlankNode,
            TermType::Literal,
            TermType::Integer,
            TermType::Decimal,
            TermType::DateTime,
        ]
    }

    /// The three dictionary-allocated types.
    pub fn allocated() -> &'static [TermType] {
        &[TermType::Uri, TermType::BlankNode, TermType::Literal]
    }

    /// The tag nibble for this type.
    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            TermType::Uri => TAG_URI,
            TermType::BlankNode => TAG_BNODE,
            TermType::Literal => TAG_LITERAL,
            TermType::Integer => TAG_INTEGER,
            TermType::Decimal => TAG_DECIMAL,
            TermType::DateTime => TAG_DATETIME,
        }
    }

    /// Resolve a tag nibble to a type. Tags 0 and 7-15 are unknown.
    #[inline]
    pub fn from_tag(tag: u8) -> Option<TermType> {
        match tag {
            TAG_URI => Some(TermType::Uri),
            TAG_BNODE => Some(TermType::BlankNode),
            TAG_LITERAL => Some(TermType::Literal),
            TAG_INTEGER => Some(TermType::Integer),
            TAG_DECIMAL => Some(TermType::Decimal),
            TAG_DATETIME => Some(TermType::DateTime),
            _ => None,
        }
    }

    /// True for types whose payload is the value itself.
    #[inline]
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            TermType::Integer | TermType::Decimal | TermType::DateTime
        )
    }

    /// True for types whose payload is a dictionary sequence number.
    #[inline]
    pub fn is_allocated(self) -> bool {
        !self.is_inline()
    }

    /// Short lowercase name, used in error messages and telemetry fields.
    pub fn name(self) -> &'static str {
        match self {
            TermType::Uri => "uri",
            TermType::BlankNode => "bnode",
            TermType::Literal => "literal",
            TermType::Integer => "integer",
            TermType::Decimal => "decimal",
            TermType::DateTime => "datetime",
        }
    }
}

impl fmt::Display for TermType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 64-bit tagged term identifier.
///
/// Layout: `[tag: 4 bits][payload: 60 bits]`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TermId(u64);

impl TermId {
    /// Encode a tag/payload pair.
    ///
    /// The tag is masked to 4 bits and the payload to 60; callers that care
    /// about out-of-range inputs must check before encoding (the inline
    /// codecs do).
    #[inline]
    pub fn new(tag: u8, payload: u64) -> Self {
        debug_assert!(tag <= 0xF, "tag {} exceeds 4 bits", tag);
        debug_assert!(payload <= PAYLOAD_MASK, "payload {:#x} exceeds 60 bits", payload);
        Self((u64::from(tag & 0xF) << TAG_SHIFT) | (payload & PAYLOAD_MASK))
    }

    /// Build an allocated ID from a type and a sequence number.
    #[inline]
    pub fn allocated(term_type: TermType, seq: u64) -> Self {
        debug_assert!(term_type.is_allocated());
        Self::new(term_type.tag(), seq)
    }

    /// Construct from raw u64.
    #[inline]
    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw u64 representation.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Get the tag nibble (0..=15).
    #[inline]
    pub fn tag(self) -> u8 {
        (self.0 >> TAG_SHIFT) as u8
    }

    /// Get the 60-bit payload.
    #[inline]
    pub fn payload(self) -> u64 {
        self.0 & PAYLOAD_MASK
    }

    /// The term type, or `None` when the tag is unknown (0, 7-15).
    #[inline]
    pub fn term_type(self) -> Option<TermType> {
        TermType::from_tag(self.tag())
    }

    /// True when the payload is an inline value.
    #[inline]
    pub fn is_inline(self) -> bool {
        self.term_type().is_some_and(TermType::is_inline)
    }

    /// True when the payload is a dictionary sequence number.
    #[inline]
    pub fn is_allocated(self) -> bool {
        self.term_type().is_some_and(TermType::is_allocated)
    }

    /// Big-endian serialised form, used for index keys and `id2str` keys.
    #[inline]
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Inverse of [`to_be_bytes`](Self::to_be_bytes).
    #[inline]
    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl fmt::Debug for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.term_type() {
            Some(t) if t.is_allocated() => {
                write!(f, "TermId::{}({})", t.name(), self.payload())
            }
            Some(t) => write!(f, "TermId::{}({:#x})", t.name(), self.payload()),
            None => write!(f, "TermId(tag={:#x}, payload={:#x})", self.tag(), self.payload()),
        }
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
