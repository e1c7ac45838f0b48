//! Triple index key codec.
//!
//! Each stored triple appears once per ordering, as a fixed 24-byte key with
//! an empty value: three 64-bit IDs, big-endian, concatenated in the
//! ordering's component order. Big-endian makes lexicographic byte order
//! equal numeric order on every component, so a fixed-length prefix selects
//! exactly the triples bound on the leading components.

use crate::error::{Error, Result};
use crate::kv::Family;
use crate::term_id::TermId;
use std::fmt;

/// Exact length of an index key.
pub const KEY_LEN: usize = 24;

/// A dictionary-encoded triple. Identity is the ID triple.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub s: TermId,
    pub p: TermId,
    pub o: TermId,
}

impl Triple {
    pub fn new(s: TermId, p: TermId, o: TermId) -> Self {
        Self { s, p, o }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.s, self.p, self.o)
    }
}

/// One of the three maintained orderings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndexOrder {
    /// Subject-Predicate-Object
    Spo,
    /// Predicate-Object-Subject
    Pos,
    /// Object-Subject-Predicate
    Osp,
}

impl IndexOrder {
    /// All three orderings.
    pub fn all() -> &'static [IndexOrder] {
        &[IndexOrder::Spo, IndexOrder::Pos, IndexOrder::Osp]
    }

    /// The column family holding this ordering.
    pub fn family(self) -> Family {
        match self {
            IndexOrder::Spo => Family::Spo,
            IndexOrder::Pos => Family::Pos,
            IndexOrder::Osp => Family::Osp,
        }
    }

    /// Short name of this ordering.
    pub fn name(self) -> &'static str {
        match self {
            IndexOrder::Spo => "spo",
            IndexOrder::Pos => "pos",
            IndexOrder::Osp => "osp",
        }
    }

    /// The triple's components in this ordering's key order.
    #[inline]
    fn components(self, t: &Triple) -> [TermId; 3] {
        match self {
            IndexOrder::Spo => [t.s, t.p, t.o],
            IndexOrder::Pos => [t.p, t.o, t.s],
            IndexOrder::Osp => [t.o, t.s, t.p],
        }
    }

    /// Encode a triple as this ordering's 24-byte key.
    pub fn key(self, t: &Triple) -> [u8; KEY_LEN] {
        let [a, b, c] = self.components(t);
        let mut key = [0u8; KEY_LEN];
        key[..8].copy_from_slice(&a.to_be_bytes());
        key[8..16].copy_from_slice(&b.to_be_bytes());
        key[16..].copy_from_slice(&c.to_be_bytes());
        key
    }

    /// Decode one of this ordering's keys back to canonical `(s, p, o)`.
    ///
    /// Fails with `invalid_key` unless the key is exactly 24 bytes.
    pub fn key_to_triple(self, key: &[u8]) -> Result<Triple> {
        if key.len() != KEY_LEN {
            return Err(Error::InvalidKey { len: key.len() });
        }
        let mut ids = [TermId::from_u64(0); 3];
        for (i, chunk) in key.chunks_exact(8).enumerate() {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            ids[i] = TermId::from_be_bytes(buf);
        }
        let [a, b, c] = ids;
        Ok(match self {
            IndexOrder::Spo => Triple::new(a, b, c),
            IndexOrder::Pos => Triple::new(c, a, b),
            IndexOrder::Osp => Triple::new(b, c, a),
        })
    }
}

impl fmt::Display for IndexOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for IndexOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spo" => Ok(IndexOrder::Spo),
            "pos" => Ok(IndexOrder::Pos),
            "osp" => Ok(IndexOrder::Osp),
            _ => Err(format!("unknown index order: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term_id::TermType;

    fn id(seq: u64) -> TermId {
        TermId::allocated(TermType::Uri, seq)
    }

    #[test]
    fn test_key_layout_per_order() {
        let t = Triple::new(id(1), id(2), id(3));
        let spo = IndexOrder::Spo.key(&t);
        assert_eq!(&spo[..8], &id(1).to_be_bytes());
        assert_eq!(&spo[8..16], &id(2).to_be_bytes());
        assert_eq!(&spo[16..], &id(3).to_be_bytes());

        let pos = IndexOrder::Pos.key(&t);
        assert_eq!(&pos[..8], &id(2).to_be_bytes());
        assert_eq!(&pos[8..16], &id(3).to_be_bytes());
        assert_eq!(&pos[16..], &id(1).to_be_bytes());

        let osp = IndexOrder::Osp.key(&t);
        assert_eq!(&osp[..8], &id(3).to_be_bytes());
        assert_eq!(&osp[8..16], &id(1).to_be_bytes());
        assert_eq!(&osp[16..], &id(2).to_be_bytes());
    }

    #[test]
    fn test_key_round_trip_yields_canonical_order() {
        let triples = [
            Triple::new(id(1), id(2), id(3)),
            Triple::new(id(u64::MAX & crate::term_id::PAYLOAD_MASK), id(0), id(42)),
            Triple::new(
                TermId::from_u64(0),
                TermId::from_u64(u64::MAX),
                TermId::from_u64(0x123456789ABCDEF0),
            ),
        ];
        for t in triples {
            for &order in IndexOrder::all() {
                let key = order.key(&t);
                assert_eq!(order.key_to_triple(&key).unwrap(), t, "order {}", order);
            }
        }
    }

    #[test]
    fn test_byte_order_equals_numeric_order() {
        // Keys in the same index sort by their leading component tuple.
        let low = Triple::new(id(1), id(300), id(2));
        let high = Triple::new(id(2), id(1), id(1));
        for &order in IndexOrder::all() {
            let a = order.key(&low);
            let b = order.key(&high);
            let cmp_components = order.components(&low).cmp(&order.components(&high));
            assert_eq!(a.cmp(&b), cmp_components, "order {}", order);
        }
        // The 255/256 boundary is where little-endian encodings would go wrong.
        let a = IndexOrder::Spo.key(&Triple::new(id(255), id(1), id(1)));
        let b = IndexOrder::Spo.key(&Triple::new(id(256), id(1), id(1)));
        assert!(a < b);
    }

    #[test]
    fn test_invalid_key_length() {
        for len in [0, 8, 16, 23, 25, 48] {
            let bytes = vec![0u8; len];
            match IndexOrder::Spo.key_to_triple(&bytes).unwrap_err() {
                Error::InvalidKey { len: got } => assert_eq!(got, len),
                other => panic!("expected invalid_key, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_order_family_mapping() {
        assert_eq!(IndexOrder::Spo.family(), Family::Spo);
        assert_eq!(IndexOrder::Pos.family(), Family::Pos);
        assert_eq!(IndexOrder::Osp.family(), Family::Osp);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("SPO".parse::<IndexOrder>().unwrap(), IndexOrder::Spo);
        assert!("spot".parse::<IndexOrder>().is_err());
    }
}
