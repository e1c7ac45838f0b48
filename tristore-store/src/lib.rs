//! # Tristore Store
//!
//! The storage core of the tristore triple store: a dictionary that maps
//! RDF terms to tagged 64-bit IDs, and a triple index that keeps three
//! orderings of the encoded facts consistent, both over a pluggable
//! key-value engine.
//!
//! ## Example
//!
//! ```ignore
//! use tristore_core::{MemoryKv, Term, TriplePattern};
//! use tristore_store::Store;
//!
//! let store = Store::open(MemoryKv::new()).await?;
//! let alice = Term::iri("http://example.org/alice");
//! let knows = Term::iri("http://xmlns.com/foaf/0.1/knows");
//! let bob = Term::iri("http://example.org/bob");
//!
//! let triple = store.insert(&alice, &knows, &bob).await?;
//! assert!(store.index().triple_exists(&triple).await?);
//! store.close().await?;
//! ```

pub mod dictionary;
pub mod index;
pub mod sequence;
pub mod snapshot;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tristore_core::error::Result;
use tristore_core::index_key::Triple;
use tristore_core::kv::KvEngine;
use tristore_core::term::Term;

pub use dictionary::Dictionary;
pub use index::{TripleIndex, TripleScan};
pub use sequence::{SequenceCounters, MAX_SEQUENCE};
pub use snapshot::StoreSnapshot;

/// Tunables for the storage core.
///
/// The defaults match the persisted format's assumptions; change them only
/// on a store whose history you control. In particular the safety margin
/// must cover the longest possible run of unpersisted allocations, which
/// is `checkpoint_interval` under the piggybacked checkpointing scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Persist each sequence counter every this many allocations.
    pub checkpoint_interval: u64,
    /// How far past a persisted counter value a restart resumes.
    pub restart_safety_margin: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 1000,
            restart_safety_margin: 1000,
        }
    }
}

/// The assembled storage core over an engine `E`.
#[derive(Debug)]
pub struct Store<E: KvEngine> {
    engine: Arc<E>,
    dict: Dictionary<E>,
    index: TripleIndex<E>,
}

impl<E: KvEngine> Store<E> {
    /// Open a store over an engine with default configuration.
    pub async fn open(engine: E) -> Result<Self> {
        Self::open_with_config(engine, StoreConfig::default()).await
    }

    /// Open a store over an engine.
    pub async fn open_with_config(engine: E, config: StoreConfig) -> Result<Self> {
        let engine = Arc::new(engine);
        let dict = Dictionary::load(engine.clone(), &config).await?;
        let index = TripleIndex::new(engine.clone());
        Ok(Self {
            engine,
            dict,
            index,
        })
    }

    /// The term dictionary.
    pub fn dictionary(&self) -> &Dictionary<E> {
        &self.dict
    }

    /// The triple index.
    pub fn index(&self) -> &TripleIndex<E> {
        &self.index
    }

    /// The underlying engine handle.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Encode three terms (allocating as needed) and insert the triple.
    pub async fn insert(&self, s: &Term, p: &Term, o: &Term) -> Result<Triple> {
        let ids = self
            .dict
            .get_or_create_ids(&[s.clone(), p.clone(), o.clone()])
            .await?;
        let triple = Triple::new(ids[0], ids[1], ids[2]);
        self.index.insert_triple(&triple).await?;
        Ok(triple)
    }

    /// Encode and insert many term triples: one dictionary batch for every
    /// new term, one index batch for every key, so either all facts land
    /// or none do.
    pub async fn insert_all(&self, facts: &[(Term, Term, Term)]) -> Result<Vec<Triple>> {
        if facts.is_empty() {
            return Ok(Vec::new());
        }
        let mut terms = Vec::with_capacity(facts.len() * 3);
        for (s, p, o) in facts {
            terms.push(s.clone());
            terms.push(p.clone());
            terms.push(o.clone());
        }
        let ids = self.dict.get_or_create_ids(&terms).await?;
        let triples: Vec<Triple> = ids
            .chunks_exact(3)
            .map(|chunk| Triple::new(chunk[0], chunk[1], chunk[2]))
            .collect();
        self.index.insert_triples(&triples).await?;
        Ok(triples)
    }

    /// Take a consistent read view of the dictionary and the index.
    pub async fn read_snapshot(&self) -> Result<StoreSnapshot> {
        Ok(StoreSnapshot::new(self.engine.snapshot().await?))
    }

    /// Delete the triple named by three terms.
    ///
    /// A term the dictionary has never seen means the triple cannot be
    /// stored, so the call is a no-op rather than an allocation.
    pub async fn delete(&self, s: &Term, p: &Term, o: &Term) -> Result<()> {
        let ids = self
            .dict
            .lookup_ids(&[s.clone(), p.clone(), o.clone()])
            .await?;
        if let [Some(s), Some(p), Some(o)] = ids[..] {
            self.index.delete_triple(&Triple::new(s, p, o)).await?;
        }
        Ok(())
    }

    /// Flush counter state and close the engine.
    ///
    /// Outstanding scans and snapshots stay usable per the engine's
    /// lifetime contract.
    pub async fn close(&self) -> Result<()> {
        self.dict.flush().await?;
        self.engine.close().await
    }
}
