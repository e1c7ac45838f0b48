//! Triple index over three orderings.
//!
//! Every stored triple owns one 24-byte key in each of the `spo`, `pos`,
//! and `osp` families, all written or removed in a single atomic batch, so
//! a triple is never partially visible. Values are empty: the key *is* the
//! record.
//!
//! Pattern lookups open a prefix iterator chosen by the selector and
//! decode triples lazily as the caller consumes them.

use std::sync::Arc;

use tristore_core::error::Result;
use tristore_core::index_key::{IndexOrder, Triple};
use tristore_core::kv::{BatchOp, Family, KvEngine, KvIter};
use tristore_core::pattern::{select_index, PredicateFilter, TriplePattern};

/// The three-ordering triple index over an engine `E`.
#[derive(Debug)]
pub struct TripleIndex<E: KvEngine> {
    engine: Arc<E>,
}

impl<E: KvEngine> TripleIndex<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    /// Insert one triple. Idempotent: re-inserting rewrites the same keys.
    pub async fn insert_triple(&self, triple: &Triple) -> Result<()> {
        self.engine.write_batch(insert_ops(triple)).await
    }

    /// Insert many triples in one atomic batch: all or none.
    pub async fn insert_triples(&self, triples: &[Triple]) -> Result<()> {
        if triples.is_empty() {
            return Ok(());
        }
        let mut ops = Vec::with_capacity(triples.len() * 3);
        for triple in triples {
            ops.extend(insert_ops(triple));
        }
        self.engine.write_batch(ops).await
    }

    /// Delete one triple. Deleting an absent triple is a no-op.
    pub async fn delete_triple(&self, triple: &Triple) -> Result<()> {
        self.engine.write_batch(delete_ops(triple)).await
    }

    /// Delete many triples in one atomic batch.
    pub async fn delete_triples(&self, triples: &[Triple]) -> Result<()> {
        if triples.is_empty() {
            return Ok(());
        }
        let mut ops = Vec::with_capacity(triples.len() * 3);
        for triple in triples {
            ops.extend(delete_ops(triple));
        }
        self.engine.write_batch(ops).await
    }

    /// Whether a triple is stored, via the engine's existence fast path.
    pub async fn triple_exists(&self, triple: &Triple) -> Result<bool> {
        self.engine
            .exists(Family::Spo, &IndexOrder::Spo.key(triple))
            .await
    }

    /// Open a lazy scan over every triple matching the pattern.
    ///
    /// The scan holds the underlying iterator until exhausted or dropped;
    /// dropping it cancels the scan and releases engine resources.
    pub async fn lookup(&self, pattern: &TriplePattern) -> Result<TripleScan> {
        let plan = select_index(pattern);
        let iter = self
            .engine
            .iter_prefix(plan.order.family(), &plan.prefix)
            .await?;
        Ok(TripleScan {
            iter,
            order: plan.order,
            filter: plan.filter,
        })
    }

    /// Materialise every match into a vector.
    pub async fn lookup_all(&self, pattern: &TriplePattern) -> Result<Vec<Triple>> {
        let mut scan = self.lookup(pattern).await?;
        let mut out = Vec::new();
        while let Some(triple) = scan.next().await? {
            out.push(triple);
        }
        Ok(out)
    }

    /// Count matches without materialising them.
    pub async fn count(&self, pattern: &TriplePattern) -> Result<usize> {
        let mut scan = self.lookup(pattern).await?;
        let mut n = 0;
        while scan.next().await?.is_some() {
            n += 1;
        }
        Ok(n)
    }
}

fn insert_ops(triple: &Triple) -> Vec<BatchOp> {
    IndexOrder::all()
        .iter()
        .map(|order| BatchOp::put(order.family(), order.key(triple).to_vec(), Vec::new()))
        .collect()
}

fn delete_ops(triple: &Triple) -> Vec<BatchOp> {
    IndexOrder::all()
        .iter()
        .map(|order| BatchOp::delete(order.family(), order.key(triple).to_vec()))
        .collect()
}

/// Lazy sequence of decoded triples. Finite and non-restartable; yields in
/// ascending full-key order of the scanned index.
pub struct TripleScan {
    iter: Box<dyn KvIter>,
    order: IndexOrder,
    filter: Option<PredicateFilter>,
}

impl TripleScan {
    pub(crate) fn new(
        iter: Box<dyn KvIter>,
        order: IndexOrder,
        filter: Option<PredicateFilter>,
    ) -> Self {
        Self {
            iter,
            order,
            filter,
        }
    }

    /// Next matching triple in canonical `(s, p, o)` form.
    pub async fn next(&mut self) -> Result<Option<Triple>> {
        while let Some((key, _)) = self.iter.next().await? {
            let triple = self.order.key_to_triple(&key).map_err(|err| {
                tracing::error!(
                    order = %self.order,
                    key_len = key.len(),
                    "undecodable index key; store may be corrupt"
                );
                err
            })?;
            if let Some(filter) = self.filter {
                if !filter.matches(&triple) {
                    continue;
                }
            }
            return Ok(Some(triple));
        }
        Ok(None)
    }
}
