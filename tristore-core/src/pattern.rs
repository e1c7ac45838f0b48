//! Triple pattern selection.
//!
//! A pattern binds or frees each of the three positions, giving eight
//! shapes. [`select_index`] maps a shape to the ordering whose key layout
//! makes the bound positions a contiguous byte prefix:
//!
//! | shape (s p o) | index | prefix | residual filter |
//! |---------------|-------|--------|-----------------|
//! | b b b | spo | 24 | - |
//! | b b _ | spo | 16 | - |
//! | b _ _ | spo |  8 | - |
//! | _ b b | pos | 16 | - |
//! | _ b _ | pos |  8 | - |
//! | _ _ b | osp |  8 | - |
//! | b _ b | osp | 16 | predicate |
//! | _ _ _ | spo |  0 | - |
//!
//! The `b _ b` shape scans OSP on the `o,s` prefix and reports a residual
//! predicate check; the scan path applies the check uniformly whenever a
//! plan carries one.
//!
//! Selection is pure: no I/O, no allocation beyond the returned plan.

use crate::index_key::{IndexOrder, Triple};
use crate::term_id::TermId;
use std::fmt;

/// One position of a pattern: a concrete ID or a wildcard.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Binding {
    Bound(TermId),
    Free,
}

impl Binding {
    /// True when `id` is admitted by this binding.
    #[inline]
    pub fn matches(self, id: TermId) -> bool {
        match self {
            Binding::Bound(want) => want == id,
            Binding::Free => true,
        }
    }

    #[inline]
    pub fn is_bound(self) -> bool {
        matches!(self, Binding::Bound(_))
    }
}

impl From<Option<TermId>> for Binding {
    fn from(value: Option<TermId>) -> Self {
        match value {
            Some(id) => Binding::Bound(id),
            None => Binding::Free,
        }
    }
}

/// A triple pattern over dictionary-encoded IDs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    pub s: Binding,
    pub p: Binding,
    pub o: Binding,
}

impl TriplePattern {
    pub fn new(
        s: impl Into<Binding>,
        p: impl Into<Binding>,
        o: impl Into<Binding>,
    ) -> Self {
        Self {
            s: s.into(),
            p: p.into(),
            o: o.into(),
        }
    }

    /// The fully-free pattern (full scan).
    pub fn any() -> Self {
        Self {
            s: Binding::Free,
            p: Binding::Free,
            o: Binding::Free,
        }
    }

    /// Check a concrete triple against this pattern.
    ///
    /// Used by the residual filter path and by tests.
    pub fn matches(&self, triple: &Triple) -> bool {
        self.s.matches(triple.s) && self.p.matches(triple.p) && self.o.matches(triple.o)
    }
}

impl From<(Option<TermId>, Option<TermId>, Option<TermId>)> for TriplePattern {
    fn from((s, p, o): (Option<TermId>, Option<TermId>, Option<TermId>)) -> Self {
        TriplePattern::new(s, p, o)
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = |b: Binding| match b {
            Binding::Bound(id) => id.to_string(),
            Binding::Free => "?".to_string(),
        };
        write!(f, "({}, {}, {})", slot(self.s), slot(self.p), slot(self.o))
    }
}

/// Residual check applied to each decoded triple after the prefix scan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PredicateFilter {
    pub predicate: Binding,
}

impl PredicateFilter {
    #[inline]
    pub fn matches(self, triple: &Triple) -> bool {
        self.predicate.matches(triple.p)
    }
}

/// A scan plan: which ordering to open, the byte prefix to seek, and an
/// optional residual filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanPlan {
    pub order: IndexOrder,
    pub prefix: Vec<u8>,
    pub filter: Option<PredicateFilter>,
}

fn prefix_of(ids: &[TermId]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ids.len() * 8);
    for id in ids {
        out.extend_from_slice(&id.to_be_bytes());
    }
    out
}

/// Choose the optimal index and prefix for a pattern.
pub fn select_index(pattern: &TriplePattern) -> ScanPlan {
    use Binding::{Bound, Free};
    match (pattern.s, pattern.p, pattern.o) {
        (Bound(s), Bound(p), Bound(o)) => ScanPlan {
            order: IndexOrder::Spo,
            prefix: prefix_of(&[s, p, o]),
            filter: None,
        },
        (Bound(s), Bound(p), Free) => ScanPlan {
            order: IndexOrder::Spo,
            prefix: prefix_of(&[s, p]),
            filter: None,
        },
        (Bound(s), Free, Free) => ScanPlan {
            order: IndexOrder::Spo,
            prefix: prefix_of(&[s]),
            filter: None,
        },
        (Free, Bound(p), Bound(o)) => ScanPlan {
            order: IndexOrder::Pos,
            prefix: prefix_of(&[p, o]),
            filter: None,
        },
        (Free, Bound(p), Free) => ScanPlan {
            order: IndexOrder::Pos,
            prefix: prefix_of(&[p]),
            filter: None,
        },
        (Free, Free, Bound(o)) => ScanPlan {
            order: IndexOrder::Osp,
            prefix: prefix_of(&[o]),
            filter: None,
        },
        // Subject and object bound, predicate free: OSP orders o,s
        // contiguously; the predicate slot is re-checked after decode.
        (Bound(s), Free, Bound(o)) => ScanPlan {
            order: IndexOrder::Osp,
            prefix: prefix_of(&[o, s]),
            filter: Some(PredicateFilter {
                predicate: pattern.p,
            }),
        },
        (Free, Free, Free) => ScanPlan {
            order: IndexOrder::Spo,
            prefix: Vec::new(),
            filter: None,
        },
    }
}
