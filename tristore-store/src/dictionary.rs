//! Bidirectional term dictionary.
//!
//! Maps RDF terms to tagged 64-bit IDs and back, through two column
//! families that are always mutually consistent: `str2id` (canonical term
//! bytes to 8-byte big-endian ID) and `id2str` (the mirror). Small
//! integers, decimals, and timestamps bypass both via the inline codecs.
//!
//! ## Allocation protocol
//!
//! `get_or_create_id` must hand the same ID to concurrent callers of the
//! same new term. Writes are serialised through an internal mutex: under
//! the lock, the term is re-checked, a sequence value is drawn, and both
//! mapping directions commit in a single atomic batch, so the two families
//! can never disagree. Readers never take the lock; they go straight to
//! the engine.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tristore_core::codec::decode_term;
use tristore_core::error::{Error, Result};
use tristore_core::inline;
use tristore_core::kv::{BatchOp, Family, KvEngine};
use tristore_core::term::Term;
use tristore_core::term_id::TermId;
use tristore_core::validate::prepare_term;

use crate::sequence::SequenceCounters;
use crate::StoreConfig;

/// The term dictionary over an engine `E`.
#[derive(Debug)]
pub struct Dictionary<E: KvEngine> {
    engine: Arc<E>,
    seq: SequenceCounters,
    /// Serialises the read-check/allocate/write path. Readers bypass it.
    alloc_lock: Mutex<()>,
}

impl<E: KvEngine> Dictionary<E> {
    /// Load the dictionary, resuming persisted sequence state.
    pub async fn load(engine: Arc<E>, config: &StoreConfig) -> Result<Self> {
        let seq = SequenceCounters::load(engine.as_ref(), config).await?;
        Ok(Self {
            engine,
            seq,
            alloc_lock: Mutex::new(()),
        })
    }

    /// The per-type sequence counters.
    pub fn sequences(&self) -> &SequenceCounters {
        &self.seq
    }

    /// Look up a term's ID without allocating.
    ///
    /// Inline-representable literals resolve without touching the engine.
    pub async fn lookup_id(&self, term: &Term) -> Result<Option<TermId>> {
        if let Some(id) = inline::try_inline_term(term) {
            return Ok(Some(id));
        }
        let (_, key) = prepare_term(term)?;
        match self.engine.get(Family::Str2Id, &key).await? {
            Some(value) => Ok(Some(decode_id_value(&value)?)),
            None => Ok(None),
        }
    }

    /// Resolve an ID back to its term.
    ///
    /// Inline IDs decode without touching the engine. An unknown type tag
    /// means the ID bytes themselves are damaged and fails with
    /// `corrupt_id`; an allocated ID simply missing from `id2str` is a
    /// plain miss.
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
            Some(_) => match self.engine.get(Family::Id2Str, &id.to_be_bytes()).await? {
                Some(bytes) => Ok(Some(decode_term(&bytes)?)),
                None => Ok(None),
            },
        }
    }

    /// Get a term's ID, allocating one if the term is new.
    pub async fn get_or_create_id(&self, term: &Term) -> Result<TermId> {
        if let Some(id) = inline::try_inline_term(term) {
            return Ok(id);
        }
        let (_, key) = prepare_term(term)?;

        // Optimistic read: existing terms resolve without the lock.
        if let Some(value) = self.engine.get(Family::Str2Id, &key).await? {
            return decode_id_value(&value);
        }

        let _guard = self.alloc_lock.lock().await;
        // Re-check: another writer may have allocated while we waited.
        if let Some(value) = self.engine.get(Family::Str2Id, &key).await? {
            return decode_id_value(&value);
        }

        let mut ops = Vec::with_capacity(3);
        let id = self.stage_allocation(term, key, &mut ops)?;
        self.engine.write_batch(ops).await?;
        Ok(id)
    }

    /// Batch form of [`get_or_create_id`](Self::get_or_create_id).
    ///
    /// Order-preserving: `result[i]` is the ID of `terms[i]`. All new
    /// mappings commit in a single atomic batch; the first fatal error
    /// (validation, overflow, engine) aborts the whole call.
    pub async fn get_or_create_ids(&self, terms: &[Term]) -> Result<Vec<TermId>> {
        let mut ids: Vec<Option<TermId>> = vec![None; terms.len()];
        let mut pending: Vec<(usize, Vec<u8>)> = Vec::new();
        for (i, term) in terms.iter().enumerate() {
            if let Some(id) = inline::try_inline_term(term) {
                ids[i] = Some(id);
            } else {
                let (_, key) = prepare_term(term)?;
                pending.push((i, key));
            }
        }

        if !pending.is_empty() {
            let _guard = self.alloc_lock.lock().await;
            let mut ops = Vec::new();
            // Duplicate terms inside one batch must share an allocation.
            let mut staged: HashMap<Vec<u8>, TermId> = HashMap::new();
            for (i, key) in pending {
                if let Some(&id) = staged.get(&key) {
                    ids[i] = Some(id);
                    continue;
                }
                if let Some(value) = self.engine.get(Family::Str2Id, &key).await? {
                    ids[i] = Some(decode_id_value(&value)?);
                    continue;
                }
                let id = self.stage_allocation(&terms[i], key.clone(), &mut ops)?;
                staged.insert(key, id);
                ids[i] = Some(id);
            }
            if !ops.is_empty() {
                self.engine.write_batch(ops).await?;
            }
        }

        Ok(ids
            .into_iter()
            .map(|id| id.expect("every term resolved or allocated"))
            .collect())
    }

    /// Look up many terms; `None` marks a miss. Order-preserving.
    pub async fn lookup_ids(&self, terms: &[Term]) -> Result<Vec<Option<TermId>>> {
        let mut out = Vec::with_capacity(terms.len());
        for term in terms {
            out.push(self.lookup_id(term).await?);
        }
        Ok(out)
    }

    /// Resolve many IDs; `None` marks a miss. Order-preserving. A corrupt
    /// ID is fatal and aborts the whole call.
    pub async fn lookup_terms(&self, ids: &[TermId]) -> Result<Vec<Option<Term>>> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            out.push(self.lookup_term(id).await?);
        }
        Ok(out)
    }

    /// Persist counter state. Called by the store on graceful close.
    pub async fn flush(&self) -> Result<()> {
        self.seq.flush(self.engine.as_ref()).await
    }

    /// Draw a sequence value and stage the two mapping writes (plus a
    /// counter checkpoint when one is due). Caller holds the allocation
    /// lock and commits the ops in one batch.
    fn stage_allocation(
        &self,
        term: &Term,
        key: Vec<u8>,
        ops: &mut Vec<BatchOp>,
    ) -> Result<TermId> {
        let term_type = term.term_type();
        let seq = self.seq.next(term_type)?;
        let id = TermId::allocated(term_type, seq);
        let id_bytes = id.to_be_bytes().to_vec();
        ops.push(BatchOp::put(Family::Str2Id, key.clone(), id_bytes.clone()));
        ops.push(BatchOp::put(Family::Id2Str, id_bytes, key));
        if self.seq.checkpoint_due(seq) {
            tracing::debug!(term_type = %term_type, seq, "sequence checkpoint");
            ops.push(self.seq.checkpoint_op(term_type, seq));
        }
        Ok(id)
    }
}

fn decode_id_value(value: &[u8]) -> Result<TermId> {
    let buf: [u8; 8] = value.try_into().map_err(|_| {
        Error::corrupt_term(format!("malformed id mapping value: {} bytes", value.len()))
    })?;
    Ok(TermId::from_be_bytes(buf))
}
