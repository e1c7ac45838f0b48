//! Binary term codec.
//!
//! The dictionary stores each term twice: once as the `str2id` key and once
//! as the `id2str` value, both using this encoding. The encoding is a
//! deterministic bijection, so equal terms always produce equal bytes and
//! the `str2id` keyspace sorts first by term kind, then by content.
//!
//! Layout:
//!
//! ```text
//! URI:      0x01 | iri bytes
//! bnode:    0x02 | label bytes
//! literal:  0x03 | subtag | [tag_len u16 BE | tag bytes] | lexical bytes
//! ```
//!
//! The subtag is `0x00` (plain, no tag field), `0x01` (datatype IRI) or
//! `0x02` (language tag). The `0x00` lead byte is reserved for engine
//! bookkeeping keys (sequence counters), which is why kind discriminators
//! start at `0x01`.

use crate::error::{Error, Result};
use crate::term::{LiteralKind, Literal, Term};

/// Kind discriminator for URI terms.
pub const KIND_URI: u8 = 0x01;
/// Kind discriminator for blank node terms.
pub const KIND_BNODE: u8 = 0x02;
/// Kind discriminator for literal terms.
pub const KIND_LITERAL: u8 = 0x03;

const LIT_PLAIN: u8 = 0x00;
const LIT_DATATYPE: u8 = 0x01;
const LIT_LANGUAGE: u8 = 0x02;

/// Encode a term to its canonical bytes.
///
/// Callers are expected to validate and NFC-normalise first; this function
/// is a pure layout concern.
pub fn encode_term(term: &Term) -> Vec<u8> {
    match term {
        Term::Iri(iri) => {
            let mut out = Vec::with_capacity(1 + iri.len());
            out.push(KIND_URI);
            out.extend_from_slice(iri.as_bytes());
            out
        }
        Term::BlankNode(label) => {
            let mut out = Vec::with_capacity(1 + label.len());
            out.push(KIND_BNODE);
            out.extend_from_slice(label.as_bytes());
            out
        }
        Term::Literal(lit) => {
            let (subtag, tag) = match &lit.kind {
                LiteralKind::Plain => (LIT_PLAIN, None),
                LiteralKind::Datatype(dt) => (LIT_DATATYPE, Some(dt.as_str())),
                LiteralKind::Language(lang) => (LIT_LANGUAGE, Some(lang.as_str())),
            };
            let tag_len = tag.map_or(0, str::len);
            debug_assert!(tag_len <= u16::MAX as usize, "tag field exceeds u16 length");
            let mut out = Vec::with_capacity(2 + 2 + tag_len + lit.lexical.len());
            out.push(KIND_LITERAL);
            out.push(subtag);
            if let Some(tag) = tag {
                out.extend_from_slice(&(tag_len as u16).to_be_bytes());
                out.extend_from_slice(tag.as_bytes());
            }
            out.extend_from_slice(lit.lexical.as_bytes());
            out
        }
    }
}

/// Decode canonical term bytes.
///
/// Fails with `corrupt_term` on structural damage and `invalid_utf8` on
/// undecodable text.
pub fn decode_term(bytes: &[u8]) -> Result<Term> {
    let (&kind, rest) = bytes
        .split_first()
        .ok_or_else(|| Error::corrupt_term("empty term bytes"))?;
    match kind {
        KIND_URI => Ok(Term::Iri(utf8(rest)?)),
        KIND_BNODE => Ok(Term::BlankNode(utf8(rest)?)),
        KIND_LITERAL => {
            let (&subtag, rest) = rest
                .split_first()
                .ok_or_else(|| Error::corrupt_term("literal missing subtag"))?;
            match subtag {
                LIT_PLAIN => Ok(Term::Literal(Literal {
                    lexical: utf8(rest)?,
                    kind: LiteralKind::Plain,
                })),
                LIT_DATATYPE | LIT_LANGUAGE => {
                    if rest.len() < 2 {
                        return Err(Error::corrupt_term("literal missing tag length"));
                    }
                    let tag_len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
                    let rest = &rest[2..];
                    if rest.len() < tag_len {
                        return Err(Error::corrupt_term(format!(
                            "literal tag field truncated: want {} bytes, have {}",
                            tag_len,
                            rest.len()
                        )));
                    }
                    let tag = utf8(&rest[..tag_len])?;
                    let lexical = utf8(&rest[tag_len..])?;
                    let kind = if subtag == LIT_DATATYPE {
                        LiteralKind::Datatype(tag)
                    } else {
                        LiteralKind::Language(tag)
                    };
                    Ok(Term::Literal(Literal { lexical, kind }))
                }
                other => Err(Error::corrupt_term(format!(
                    "unknown literal subtag {:#04x}",
                    other
                ))),
            }
        }
        other => Err(Error::corrupt_term(format!(
            "unknown term kind {:#04x}",
            other
        ))),
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8)
}
