//! Term validation and normalisation.
//!
//! Runs on the encoding path before any dictionary state changes. Rules:
//!
//! - the encoded term binary must not exceed [`MAX_TERM_BYTES`];
//! - URI terms must not contain NUL bytes (blank nodes and literals may);
//! - all text is NFC-normalised before hashing/comparison, so canonically
//!   equivalent Unicode spellings map to the same dictionary entry.
//!
//! UTF-8 validity is guaranteed on this path by construction (`Term` holds
//! `String`s); the decode path checks it when reading stored bytes back.

use crate::codec::encode_term;
use crate::error::{Error, Result};
use crate::term::{Literal, LiteralKind, Term};
use unicode_normalization::{is_nfc, UnicodeNormalization};

/// Ceiling on the encoded term binary, 16 KiB.
pub const MAX_TERM_BYTES: usize = 16 * 1024;

fn nfc_owned(s: &str) -> String {
    if is_nfc(s) {
        s.to_owned()
    } else {
        s.nfc().collect()
    }
}

/// Validate a term and return its NFC-normalised form.
pub fn normalize_term(term: &Term) -> Result<Term> {
    match term {
        Term::Iri(iri) => {
            if iri.as_bytes().contains(&0) {
                return Err(Error::NullByteInUri);
            }
            Ok(Term::Iri(nfc_owned(iri)))
        }
        Term::BlankNode(label) => Ok(Term::BlankNode(nfc_owned(label))),
        Term::Literal(lit) => {
            let kind = match &lit.kind {
                LiteralKind::Plain => LiteralKind::Plain,
                LiteralKind::Datatype(dt) => LiteralKind::Datatype(nfc_owned(dt)),
                LiteralKind::Language(lang) => LiteralKind::Language(nfc_owned(lang)),
            };
            Ok(Term::Literal(Literal {
                lexical: nfc_owned(&lit.lexical),
                kind,
            }))
        }
    }
}

/// Validate, normalise, and encode a term in one step.
///
/// This is the dictionary's entry point: the returned bytes are the
/// canonical `str2id` key / `id2str` value for the returned term.
pub fn prepare_term(term: &Term) -> Result<(Term, Vec<u8>)> {
    let normalized = normalize_term(term)?;
    let bytes = encode_term(&normalized);
    if bytes.len() > MAX_TERM_BYTES {
        return Err(Error::TermTooLarge {
            size: bytes.len(),
            max: MAX_TERM_BYTES,
        });
    }
    Ok((normalized, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nul_byte_rejected_in_uri_only() {
        assert_eq!(
            normalize_term(&Term::iri("http://a\0b")).unwrap_err().kind(),
            "null_byte_in_uri"
        );
        // Blank nodes and literals may contain any code points.
        assert!(normalize_term(&Term::bnode("a\0b")).is_ok());
        assert!(normalize_term(&Term::literal("a\0b")).is_ok());
    }

    #[test]
    fn test_nfc_equivalent_spellings_converge() {
        // "é" precomposed vs "e" + combining acute.
        let composed = Term::literal("caf\u{e9}");
        let decomposed = Term::literal("cafe\u{301}");
        let (a, a_bytes) = prepare_term(&composed).unwrap();
        let (b, b_bytes) = prepare_term(&decomposed).unwrap();
        assert_eq!(a, b);
        assert_eq!(a_bytes, b_bytes);
    }

    #[test]
    fn test_nfc_applies_to_iris_and_tags() {
        let (a, _) = prepare_term(&Term::iri("http://x/cafe\u{301}")).unwrap();
        assert_eq!(a, Term::iri("http://x/caf\u{e9}"));
        let (b, _) = prepare_term(&Term::typed("v", "http://x/cafe\u{301}")).unwrap();
        assert_eq!(b, Term::typed("v", "http://x/caf\u{e9}"));
    }

    #[test]
    fn test_size_ceiling() {
        // Plain literal overhead is 2 bytes (kind + subtag).
        let at_limit = Term::literal("x".repeat(MAX_TERM_BYTES - 2));
        assert!(prepare_term(&at_limit).is_ok());

        let over = Term::literal("x".repeat(MAX_TERM_BYTES - 1));
        match prepare_term(&over).unwrap_err() {
            Error::TermTooLarge { size, max } => {
                assert_eq!(size, MAX_TERM_BYTES + 1);
                assert_eq!(max, MAX_TERM_BYTES);
            }
            other => panic!("expected term_too_large, got {:?}", other),
        }
    }
}
