//! Inline value codecs.
//!
//! Small integers, decimals, and timestamps are packed directly into the
//! 60-bit ID payload, so encoding and decoding them never touches storage.
//! Each codec is range-checked: values that do not fit exactly are rejected
//! with `out_of_range`, and the caller falls back to dictionary allocation
//! of the typed literal.
//!
//! All three codecs round-trip bit-exactly within their stated ranges.
//!
//! ## Layouts (60-bit payload)
//!
//! | type | layout |
//! |------|--------|
//! | integer | two's-complement i60, range `[-2^59, 2^59)` |
//! | decimal | `sign(1) \| biased_exponent(11) \| mantissa(48)`, bias 1023 |
//! | date-time | unsigned UTC Unix milliseconds, range `[0, 2^60)` |
//!
//! The decimal layout is the IEEE-754 double layout with the low 4 mantissa
//! bits dropped; a value whose dropped bits are non-zero is not representable
//! and falls through. Zero is the all-zero payload. Date-times lose
//! sub-millisecond precision and always decode as UTC.

use crate::error::{Error, Result};
use crate::term::{LiteralKind, Term};
use crate::term_id::{TermId, TermType, PAYLOAD_MASK};
use crate::vocab;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Smallest inline integer: -2^59.
pub const INTEGER_MIN: i64 = -(1i64 << 59);
/// Largest inline integer: 2^59 - 1.
pub const INTEGER_MAX: i64 = (1i64 << 59) - 1;

// Decimal payload layout.
const DEC_SIGN_SHIFT: u32 = 59;
const DEC_EXP_SHIFT: u32 = 48;
const DEC_EXP_MASK: u64 = 0x7FF;
const DEC_MANTISSA_MASK: u64 = (1u64 << 48) - 1;
// IEEE-754 double layout.
const F64_EXP_SHIFT: u32 = 52;
const F64_MANTISSA_MASK: u64 = (1u64 << 52) - 1;

// ============================================================================
// Integer
// ============================================================================

/// Encode an integer into an inline ID.
///
/// Returns `out_of_range` outside `[-2^59, 2^59)`.
pub fn encode_integer(value: i64) -> Result<TermId> {
    if !(INTEGER_MIN..=INTEGER_MAX).contains(&value) {
        return Err(Error::out_of_range(format!(
            "integer {} outside inline range",
            value
        )));
    }
    Ok(TermId::new(
        TermType::Integer.tag(),
        (value as u64) & PAYLOAD_MASK,
    ))
}

/// Decode an inline integer ID.
pub fn decode_integer(id: TermId) -> Result<i64> {
    if id.term_type() != Some(TermType::Integer) {
        return Err(Error::NotAnInteger { id });
    }
    // Sign-extend from 60 bits.
    Ok(((id.payload() << 4) as i64) >> 4)
}

// ============================================================================
// Decimal
// ============================================================================

/// Encode a decimal (carried as `f64`) into an inline ID.
///
/// Only values whose IEEE-754 mantissa fits in 48 bits are representable;
/// anything else, including non-finite values, returns `out_of_range` so the
/// caller can allocate the literal through the dictionary instead.
pub fn encode_decimal(value: f64) -> Result<TermId> {
    if value == 0.0 && value.is_sign_positive() {
        // Canonical zero: all payload bits zero.
        return Ok(TermId::new(TermType::Decimal.tag(), 0));
    }
    if !value.is_finite() {
        return Err(Error::out_of_range(format!(
            "non-finite decimal {} cannot be inlined",
            value
        )));
    }
    let bits = value.to_bits();
    let mantissa = bits & F64_MANTISSA_MASK;
    if mantissa & 0xF != 0 {
        return Err(Error::out_of_range(format!(
            "decimal {} needs more than 48 mantissa bits",
            value
        )));
    }
    let sign = bits >> 63;
    let exponent = (bits >> F64_EXP_SHIFT) & DEC_EXP_MASK;
    let payload = (sign << DEC_SIGN_SHIFT) | (exponent << DEC_EXP_SHIFT) | (mantissa >> 4);
    Ok(TermId::new(TermType::Decimal.tag(), payload))
}

/// Decode an inline decimal ID.
pub fn decode_decimal(id: TermId) -> Result<f64> {
    if id.term_type() != Some(TermType::Decimal) {
        return Err(Error::NotADecimal { id });
    }
    let payload = id.payload();
    if payload == 0 {
        return Ok(0.0);
    }
    let sign = (payload >> DEC_SIGN_SHIFT) & 1;
    let exponent = (payload >> DEC_EXP_SHIFT) & DEC_EXP_MASK;
    let mantissa = (payload & DEC_MANTISSA_MASK) << 4;
    Ok(f64::from_bits(
        (sign << 63) | (exponent << F64_EXP_SHIFT) | mantissa,
    ))
}

// ============================================================================
// Date-time
// ============================================================================

/// Encode a UTC Unix-millisecond count into an inline ID.
///
/// Pre-epoch timestamps return `out_of_range` (the payload is unsigned).
pub fn encode_datetime_ms(millis: i64) -> Result<TermId> {
    if millis < 0 {
        return Err(Error::out_of_range(format!(
            "pre-epoch timestamp {} ms cannot be inlined",
            millis
        )));
    }
    let payload = millis as u64;
    if payload > PAYLOAD_MASK {
        return Err(Error::out_of_range(format!(
            "timestamp {} ms exceeds 60 bits",
            millis
        )));
    }
    Ok(TermId::new(TermType::DateTime.tag(), payload))
}

/// Decode an inline date-time ID to UTC Unix milliseconds.
pub fn decode_datetime_ms(id: TermId) -> Result<i64> {
    if id.term_type() != Some(TermType::DateTime) {
        return Err(Error::NotADateTime { id });
    }
    Ok(id.payload() as i64)
}

/// Encode a UTC timestamp. Sub-millisecond precision is discarded.
pub fn encode_datetime(dt: &DateTime<Utc>) -> Result<TermId> {
    encode_datetime_ms(dt.timestamp_millis())
}

/// Decode an inline date-time ID to a UTC timestamp.
pub fn decode_datetime(id: TermId) -> Result<DateTime<Utc>> {
    let millis = decode_datetime_ms(id)?;
    Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        Error::out_of_range(format!("timestamp {} ms outside calendar range", millis))
    })
}

// ============================================================================
// Literal bridge
// ============================================================================

/// Try to inline a term without touching storage.
///
/// Returns `Some` for typed literals of `xsd:integer`, `xsd:decimal`, and
/// `xsd:dateTime` whose lexical forms fit the inline ranges; `None` means
/// the term takes the dictionary allocation path.
pub fn try_inline_term(term: &Term) -> Option<TermId> {
    let lit = match term {
        Term::Literal(lit) => lit,
        _ => return None,
    };
    let datatype = match &lit.kind {
        LiteralKind::Datatype(dt) => dt.as_str(),
        _ => return None,
    };
    match datatype {
        vocab::XSD_INTEGER => {
            let n: i64 = lit.lexical.parse().ok()?;
            encode_integer(n).ok()
        }
        vocab::XSD_DECIMAL => {
            let d: f64 = lit.lexical.parse().ok()?;
            encode_decimal(d).ok()
        }
        vocab::XSD_DATE_TIME => {
            let dt = DateTime::parse_from_rfc3339(&lit.lexical).ok()?;
            encode_datetime(&dt.with_timezone(&Utc)).ok()
        }
        _ => None,
    }
}

/// Reconstruct the canonical literal for an inline ID.
///
/// Date-times render as UTC RFC 3339 with millisecond precision; integers
/// and decimals render in their shortest exact form.
pub fn inline_term(id: TermId) -> Result<Term> {
    match id.term_type() {
        Some(TermType::Integer) => Ok(Term::typed(
            decode_integer(id)?.to_string(),
            vocab::XSD_INTEGER,
        )),
        Some(TermType::Decimal) => Ok(Term::typed(
            decode_decimal(id)?.to_string(),
            vocab::XSD_DECIMAL,
        )),
        Some(TermType::DateTime) => {
            let dt = decode_datetime(id)?;
            Ok(Term::typed(
                dt.to_rfc3339_opts(SecondsFormat::Millis, true),
                vocab::XSD_DATE_TIME,
            ))
        }
        Some(t) => Err(Error::out_of_range(format!(
            "{} ids are not inline values",
            t
        ))),
        None => Err(Error::CorruptId {
            id: id.as_u64(),
            tag: id.tag(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Integer ----

    #[test]
    fn test_integer_round_trip() {
        for &n in &[0i64, 1, -1, 42, -42, 1_000_000, -1_000_000, INTEGER_MIN, INTEGER_MAX] {
            let id = encode_integer(n).unwrap();
            assert_eq!(id.term_type(), Some(TermType::Integer));
            assert_eq!(decode_integer(id).unwrap(), n, "round-trip failed for {}", n);
        }
    }

    #[test]
    fn test_integer_out_of_range() {
        assert_eq!(
            encode_integer(INTEGER_MAX + 1).unwrap_err().kind(),
            "out_of_range"
        );
        assert_eq!(
            encode_integer(INTEGER_MIN - 1).unwrap_err().kind(),
            "out_of_range"
        );
        assert_eq!(encode_integer(i64::MAX).unwrap_err().kind(), "out_of_range");
        assert_eq!(encode_integer(i64::MIN).unwrap_err().kind(), "out_of_range");
    }

    #[test]
    fn test_integer_wrong_tag() {
        let id = encode_decimal(1.5).unwrap();
        assert_eq!(decode_integer(id).unwrap_err().kind(), "not_an_integer");
    }

    // ---- Decimal ----

    #[test]
    fn test_decimal_round_trip_exact_values() {
        for &d in &[0.0f64, -0.0, 1.0, -1.0, 1.5, 0.25, -3.0, 1024.0, 0.0078125] {
            let id = encode_decimal(d).unwrap();
            assert_eq!(id.term_type(), Some(TermType::Decimal));
            let back = decode_decimal(id).unwrap();
            assert_eq!(back.to_bits(), d.to_bits(), "bit-exact round-trip failed for {}", d);
        }
    }

    #[test]
    fn test_decimal_zero_is_all_zero_payload() {
        let id = encode_decimal(0.0).unwrap();
        assert_eq!(id.payload(), 0);
        // Negative zero keeps its sign bit and round-trips separately.
        let neg = encode_decimal(-0.0).unwrap();
        assert_ne!(neg.payload(), 0);
        assert_eq!(decode_decimal(neg).unwrap().to_bits(), (-0.0f64).to_bits());
    }

    #[test]
    fn test_decimal_falls_through_when_mantissa_too_wide() {
        // These need all 52 mantissa bits of a double.
        for &d in &[3.14f64, 0.1, 1.0 / 3.0] {
            assert_eq!(encode_decimal(d).unwrap_err().kind(), "out_of_range");
        }
    }

    #[test]
    fn test_decimal_rejects_non_finite() {
        for d in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(encode_decimal(d).unwrap_err().kind(), "out_of_range");
        }
    }

    #[test]
    fn test_decimal_wrong_tag() {
        let id = encode_integer(7).unwrap();
        assert_eq!(decode_decimal(id).unwrap_err().kind(), "not_a_decimal");
    }

    // ---- Date-time ----

    #[test]
    fn test_datetime_ms_round_trip() {
        for &ms in &[0i64, 1, 1_705_312_200_000, (1i64 << 60) - 1] {
            let id = encode_datetime_ms(ms).unwrap();
            assert_eq!(id.term_type(), Some(TermType::DateTime));
            assert_eq!(decode_datetime_ms(id).unwrap(), ms);
        }
    }

    #[test]
    fn test_datetime_pre_epoch_falls_through() {
        assert_eq!(encode_datetime_ms(-1).unwrap_err().kind(), "out_of_range");
    }

    #[test]
    fn test_datetime_chrono_round_trip() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let id = encode_datetime(&dt).unwrap();
        assert_eq!(decode_datetime(id).unwrap(), dt);
    }

    #[test]
    fn test_datetime_wrong_tag() {
        let id = encode_integer(7).unwrap();
        assert_eq!(decode_datetime_ms(id).unwrap_err().kind(), "not_a_datetime");
    }

    // ---- Bridge ----

    #[test]
    fn test_bridge_integer_literal() {
        let id = try_inline_term(&Term::typed("42", vocab::XSD_INTEGER)).unwrap();
        assert_eq!(id.term_type(), Some(TermType::Integer));
        assert_eq!(decode_integer(id).unwrap(), 42);
        assert_eq!(inline_term(id).unwrap(), Term::typed("42", vocab::XSD_INTEGER));
    }

    #[test]
    fn test_bridge_out_of_range_integer_not_inlined() {
        // 2^59 exceeds the inline range: dictionary path.
        let lexical = (1u64 << 59).to_string();
        assert!(try_inline_term(&Term::typed(lexical, vocab::XSD_INTEGER)).is_none());
        // So does an integer beyond i64 entirely.
        assert!(try_inline_term(&Term::typed(
            "123456789012345678901234567890",
            vocab::XSD_INTEGER
        ))
        .is_none());
    }

    #[test]
    fn test_bridge_decimal_literal() {
        let id = try_inline_term(&Term::typed("1.5", vocab::XSD_DECIMAL)).unwrap();
        assert_eq!(inline_term(id).unwrap(), Term::typed("1.5", vocab::XSD_DECIMAL));
        // A decimal that needs the full double mantissa is not inlined.
        assert!(try_inline_term(&Term::typed("3.14", vocab::XSD_DECIMAL)).is_none());
    }

    #[test]
    fn test_bridge_datetime_normalises_to_utc() {
        let id = try_inline_term(&Term::typed(
            "2024-01-15T12:30:00+02:00",
            vocab::XSD_DATE_TIME,
        ))
        .unwrap();
        assert_eq!(
            inline_term(id).unwrap(),
            Term::typed("2024-01-15T10:30:00.000Z", vocab::XSD_DATE_TIME)
        );
    }

    #[test]
    fn test_bridge_datetime_truncates_sub_millisecond() {
        let a = try_inline_term(&Term::typed(
            "2024-01-15T10:30:00.123456Z",
            vocab::XSD_DATE_TIME,
        ))
        .unwrap();
        let b = try_inline_term(&Term::typed(
            "2024-01-15T10:30:00.123Z",
            vocab::XSD_DATE_TIME,
        ))
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bridge_ignores_non_inline_terms() {
        assert!(try_inline_term(&Term::iri("http://a")).is_none());
        assert!(try_inline_term(&Term::literal("42")).is_none());
        assert!(try_inline_term(&Term::lang_tagged("42", "en")).is_none());
        assert!(try_inline_term(&Term::typed("x", vocab::XSD_STRING)).is_none());
    }

    #[test]
    fn test_inline_term_rejects_allocated_and_unknown_ids() {
        let uri = TermId::allocated(TermType::Uri, 1);
        assert_eq!(inline_term(uri).unwrap_err().kind(), "out_of_range");
        let unknown = TermId::new(0x9, 5);
        assert_eq!(inline_term(unknown).unwrap_err().kind(), "corrupt_id");
    }
}
