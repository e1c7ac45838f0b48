//! Consistent read views.
//!
//! A [`StoreSnapshot`] freezes the whole store at one point in time:
//! dictionary resolution and pattern scans against it are unaffected by
//! concurrent writes, which is what downstream fixpoint evaluation needs
//! to see a stable universe per round. The snapshot co-owns engine
//! resources per the engine's lifetime contract, so it stays usable even
//! if the store is closed while it is alive.

use tristore_core::codec::decode_term;
use tristore_core::error::{Error, Result};
use tristore_core::index_key::Triple;
use tristore_core::inline;
use tristore_core::kv::{Family, KvSnapshot};
use tristore_core::pattern::{select_index, TriplePattern};
use tristore_core::term::Term;
use tristore_core::term_id::TermId;
use tristore_core::validate::prepare_term;

use crate::index::TripleScan;

/// A frozen view of the dictionary and the triple index.
pub struct StoreSnapshot {
    snap: Box<dyn KvSnapshot>,
}

impl StoreSnapshot {
    pub(crate) fn new(snap: Box<dyn KvSnapshot>) -> Self {
        Self { snap }
    }

    /// Look up a term's ID as of the snapshot.
    pub async fn lookup_id(&self, term: &Term) -> Result<Option<TermId>> {
        if let Some(id) = inline::try_inline_term(term) {
            return Ok(Some(id));
        }
        let (_, key) = prepare_term(term)?;
        match self.snap.get(Family::Str2Id, &key).await? {
            Some(value) => {
                let buf: [u8; 8] = value.as_slice().try_into().map_err(|_| {
                    Error::corrupt_term(format!(
                        "malformed id mapping value: {} bytes",
                        value.len()
                    ))
                })?;
                Ok(Some(TermId::from_be_bytes(buf)))
            }
            None => Ok(None),
        }
    }

    /// Resolve an ID as of the snapshot.
    pub async fn lookup_term(&self, id: TermId) -> Result<Option<Term>> {
        match id.term_type() {
            None => {
                tracing::error!(
                    id = id.as_u64(),
                    tag = id.tag(),
                    "id carries an unknown type tag; store may be corrupt"
                );
                Err(Error::CorruptId {
                    id: id.as_u64(),
                    tag: id.tag(),
                })
            }
            Some(t) if t.is_inline() => Ok(Some(inline::inline_term(id)?)),
            Some(_) => match self.snap.get(Family::Id2Str, &id.to_be_bytes()).await? {
                Some(bytes) => Ok(Some(decode_term(&bytes)?)),
                None => Ok(None),
            },
        }
    }

    /// Open a lazy scan over the frozen view.
    pub async fn lookup(&self, pattern: &TriplePattern) -> Result<TripleScan> {
        let plan = select_index(pattern);
        let iter = self.snap.iter_prefix(plan.order.family(), &plan.prefix).await?;
        Ok(TripleScan::new(iter, plan.order, plan.filter))
    }

    /// Materialise every match as of the snapshot.
    pub async fn lookup_all(&self, pattern: &TriplePattern) -> Result<Vec<Triple>> {
        let mut scan = self.lookup(pattern).await?;
        let mut out = Vec::new();
        while let Some(triple) = scan.next().await? {
            out.push(triple);
        }
        Ok(out)
    }

    /// Count matches as of the snapshot without materialising them.
    pub async fn count(&self, pattern: &TriplePattern) -> Result<usize> {
        let mut scan = self.lookup(pattern).await?;
        let mut n = 0;
        while scan.next().await?.is_some() {
            n += 1;
        }
        Ok(n)
    }

    /// Whether a triple is stored as of the snapshot.
    pub async fn triple_exists(&self, triple: &Triple) -> Result<bool> {
        use tristore_core::index_key::IndexOrder;
        Ok(self
            .snap
            .get(Family::Spo, &IndexOrder::Spo.key(triple))
            .await?
            .is_some())
    }
}
