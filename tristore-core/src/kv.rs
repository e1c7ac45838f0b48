//! Key-value engine seam.
//!
//! The storage core runs over any ordered persistent map that supports
//! column families, atomic cross-family batches, forward prefix iteration,
//! and point-in-time snapshots. Backends implement [`KvEngine`]; the rest of
//! the core is generic over it.
//!
//! ## Lifetime contract
//!
//! Iterators and snapshots returned by an engine must keep working until
//! they are dropped, even if [`KvEngine::close`] runs first: an engine
//! either shares ownership of its handle with every outstanding
//! iterator/snapshot, or returns `already_closed` from their operations.
//! Use-after-free is not an acceptable outcome under any interleaving.
//!
//! ## Scheduling
//!
//! Every trait method may touch disk and is therefore async; backends are
//! expected to run blocking work on a blocking-capable scheduler rather
//! than stalling the caller's executor.

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// ============================================================================
// Column families
// ============================================================================

/// Logical key spaces within one store.
///
/// `Derived` is reserved for materialised inferences and is created but
/// never written by the storage core.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Family {
    Id2Str = 0,
    Str2Id = 1,
    Spo = 2,
    Pos = 3,
    Osp = 4,
    Derived = 5,
}

impl Family {
    /// All families, in creation order.
    pub const ALL: [Family; 6] = [
        Family::Id2Str,
        Family::Str2Id,
        Family::Spo,
        Family::Pos,
        Family::Osp,
        Family::Derived,
    ];

    /// On-disk family name.
    pub fn name(self) -> &'static str {
        match self {
            Family::Id2Str => "id2str",
            Family::Str2Id => "str2id",
            Family::Spo => "spo",
            Family::Pos => "pos",
            Family::Osp => "osp",
            Family::Derived => "derived",
        }
    }

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Family::ALL
            .into_iter()
            .find(|fam| fam.name() == s)
            .ok_or_else(|| format!("unknown column family: {}", s))
    }
}

// ============================================================================
// Batches
// ============================================================================

/// One operation inside an atomic batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    Put {
        family: Family,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        family: Family,
        key: Vec<u8>,
    },
}

impl BatchOp {
    pub fn put(family: Family, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOp::Put {
            family,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(family: Family, key: impl Into<Vec<u8>>) -> Self {
        BatchOp::Delete {
            family,
            key: key.into(),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// An ordered persistent map with column families.
#[async_trait]
pub trait KvEngine: fmt::Debug + Send + Sync + 'static {
    /// Point lookup. `Ok(None)` when the key is absent.
    async fn get(&self, family: Family, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Write one key.
    async fn put(&self, family: Family, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete one key. Deleting an absent key succeeds.
    async fn delete(&self, family: Family, key: &[u8]) -> Result<()>;

    /// Existence check. Engines override this when they have a cheaper
    /// path than a full read.
    async fn exists(&self, family: Family, key: &[u8]) -> Result<bool> {
        Ok(self.get(family, key).await?.is_some())
    }

    /// Apply a mixed put/delete batch atomically: either every operation
    /// becomes visible or none does.
    async fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()>;

    /// Iterate all pairs whose key starts with `prefix`, ascending.
    async fn iter_prefix(&self, family: Family, prefix: &[u8]) -> Result<Box<dyn KvIter>>;

    /// Take a consistent point-in-time view.
    async fn snapshot(&self) -> Result<Box<dyn KvSnapshot>>;

    /// Release the engine for new operations. Outstanding iterators and
    /// snapshots stay usable (see the module docs). A second close returns
    /// `already_closed`.
    async fn close(&self) -> Result<()>;

    /// Directory backing this engine, when there is one.
    fn path(&self) -> Option<&Path>;

    /// Whether the engine still accepts new operations.
    fn is_open(&self) -> bool;
}

/// Forward iterator over one prefix. Finite and non-restartable.
#[async_trait]
pub trait KvIter: Send {
    /// Next pair in ascending key order, or `None` when exhausted.
    async fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
}

/// A frozen point-in-time view, unaffected by later writes.
#[async_trait]
pub trait KvSnapshot: Send + Sync {
    async fn get(&self, family: Family, key: &[u8]) -> Result<Option<Vec<u8>>>;

    async fn iter_prefix(&self, family: Family, prefix: &[u8]) -> Result<Box<dyn KvIter>>;
}

impl std::fmt::Debug for dyn KvSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dyn KvSnapshot")
    }
}

// ============================================================================
// MemoryKv
// ============================================================================

type FamilyMaps = [BTreeMap<Vec<u8>, Vec<u8>>; 6];

#[derive(Debug)]
struct MemoryState {
    families: FamilyMaps,
    open: bool,
}

#[derive(Debug)]
struct MemoryInner {
    state: RwLock<MemoryState>,
    // Test hook: number of upcoming write_batch calls to fail.
    fail_batches: AtomicU32,
}

/// In-memory engine backed by one `BTreeMap` per family.
///
/// Used by unit tests and as the reference semantics for the trait
/// contract: batches are all-or-nothing, prefix iteration captures its
/// view at creation, and snapshots clone the maps. Clones share state, so
/// a "crash" is simulated by dropping one handle and keeping another.
#[derive(Debug, Clone)]
pub struct MemoryKv {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKv {
    /// Create a new empty engine.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                state: RwLock::new(MemoryState {
                    families: std::array::from_fn(|_| BTreeMap::new()),
                    open: true,
                }),
                fail_batches: AtomicU32::new(0),
            }),
        }
    }

    /// Make the next `n` `write_batch` calls fail without applying
    /// anything. Test hook for batch-atomicity scenarios.
    pub fn fail_next_write_batches(&self, n: u32) {
        self.inner.fail_batches.store(n, Ordering::SeqCst);
    }

    /// Number of keys currently stored in a family.
    pub fn len(&self, family: Family) -> usize {
        self.inner.state.read().families[family.slot()].len()
    }

    /// True when a family holds no keys.
    pub fn is_empty(&self, family: Family) -> bool {
        self.len(family) == 0
    }

    fn collect_prefix(maps: &FamilyMaps, family: Family, prefix: &[u8]) -> VecDeque<(Vec<u8>, Vec<u8>)> {
        maps[family.slot()]
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[async_trait]
impl KvEngine for MemoryKv {
    async fn get(&self, family: Family, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.inner.state.read();
        if !state.open {
            return Err(Error::AlreadyClosed);
        }
        Ok(state.families[family.slot()].get(key).cloned())
    }

    async fn put(&self, family: Family, key: &[u8], value: &[u8]) -> Result<()> {
        let mut state = self.inner.state.write();
        if !state.open {
            return Err(Error::AlreadyClosed);
        }
        state.families[family.slot()].insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, family: Family, key: &[u8]) -> Result<()> {
        let mut state = self.inner.state.write();
        if !state.open {
            return Err(Error::AlreadyClosed);
        }
        state.families[family.slot()].remove(key);
        Ok(())
    }

    async fn exists(&self, family: Family, key: &[u8]) -> Result<bool> {
        let state = self.inner.state.read();
        if !state.open {
            return Err(Error::AlreadyClosed);
        }
        Ok(state.families[family.slot()].contains_key(key))
    }

    async fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut state = self.inner.state.write();
        if !state.open {
            return Err(Error::AlreadyClosed);
        }
        // Fault injection happens before any mutation so a failed batch
        // leaves the maps untouched.
        let pending = self.inner.fail_batches.load(Ordering::SeqCst);
        if pending > 0 {
            self.inner.fail_batches.store(pending - 1, Ordering::SeqCst);
            return Err(Error::engine("injected write_batch failure"));
        }
        for op in ops {
            match op {
                BatchOp::Put { family, key, value } => {
                    state.families[family.slot()].insert(key, value);
                }
                BatchOp::Delete { family, key } => {
                    state.families[family.slot()].remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn iter_prefix(&self, family: Family, prefix: &[u8]) -> Result<Box<dyn KvIter>> {
        let state = self.inner.state.read();
        if !state.open {
            return Err(Error::AlreadyClosed);
        }
        Ok(Box::new(MemoryIter {
            items: Self::collect_prefix(&state.families, family, prefix),
        }))
    }

    async fn snapshot(&self) -> Result<Box<dyn KvSnapshot>> {
        let state = self.inner.state.read();
        if !state.open {
            return Err(Error::AlreadyClosed);
        }
        Ok(Box::new(MemorySnapshot {
            families: Arc::new(state.families.clone()),
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.inner.state.write();
        if !state.open {
            return Err(Error::AlreadyClosed);
        }
        state.open = false;
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    fn is_open(&self) -> bool {
        self.inner.state.read().open
    }
}

/// Iterator over a view captured at creation time.
struct MemoryIter {
    items: VecDeque<(Vec<u8>, Vec<u8>)>,
}

#[async_trait]
impl KvIter for MemoryIter {
    async fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        Ok(self.items.pop_front())
    }
}

struct MemorySnapshot {
    families: Arc<FamilyMaps>,
}

#[async_trait]
impl KvSnapshot for MemorySnapshot {
    async fn get(&self, family: Family, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.families[family.slot()].get(key).cloned())
    }

    async fn iter_prefix(&self, family: Family, prefix: &[u8]) -> Result<Box<dyn KvIter>> {
        Ok(Box::new(MemoryIter {
            items: MemoryKv::collect_prefix(&self.families, family, prefix),
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(mut iter: Box<dyn KvIter>) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some(kv) = iter.next().await.unwrap() {
            out.push(kv);
        }
        out
    }

    #[tokio::test]
    async fn test_point_ops() {
        let kv = MemoryKv::new();
        kv.put(Family::Spo, b"k", b"v").await.unwrap();
        assert_eq!(kv.get(Family::Spo, b"k").await.unwrap(), Some(b"v".to_vec()));
        assert!(kv.exists(Family::Spo, b"k").await.unwrap());
        // Families are independent key spaces.
        assert_eq!(kv.get(Family::Pos, b"k").await.unwrap(), None);

        kv.delete(Family::Spo, b"k").await.unwrap();
        assert!(!kv.exists(Family::Spo, b"k").await.unwrap());
        // Deleting an absent key is a no-op, not an error.
        kv.delete(Family::Spo, b"k").await.unwrap();
    }

    #[tokio::test]
    async fn test_batch_is_atomic_across_families() {
        let kv = MemoryKv::new();
        kv.put(Family::Spo, b"gone", b"").await.unwrap();
        kv.write_batch(vec![
            BatchOp::put(Family::Spo, b"a".as_slice(), b"".as_slice()),
            BatchOp::put(Family::Pos, b"b".as_slice(), b"".as_slice()),
            BatchOp::delete(Family::Spo, b"gone".as_slice()),
        ])
        .await
        .unwrap();
        assert!(kv.exists(Family::Spo, b"a").await.unwrap());
        assert!(kv.exists(Family::Pos, b"b").await.unwrap());
        assert!(!kv.exists(Family::Spo, b"gone").await.unwrap());
    }

    #[tokio::test]
    async fn test_injected_batch_failure_leaves_state_unchanged() {
        let kv = MemoryKv::new();
        kv.put(Family::Spo, b"keep", b"1").await.unwrap();
        kv.fail_next_write_batches(1);

        let err = kv
            .write_batch(vec![
                BatchOp::put(Family::Spo, b"new".as_slice(), b"".as_slice()),
                BatchOp::delete(Family::Spo, b"keep".as_slice()),
            ])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "engine");

        assert!(kv.exists(Family::Spo, b"keep").await.unwrap());
        assert!(!kv.exists(Family::Spo, b"new").await.unwrap());

        // The hook is consumed: the retry succeeds.
        kv.write_batch(vec![BatchOp::put(Family::Spo, b"new".as_slice(), b"".as_slice())])
            .await
            .unwrap();
        assert!(kv.exists(Family::Spo, b"new").await.unwrap());
    }

    #[tokio::test]
    async fn test_prefix_iteration_order_and_bounds() {
        let kv = MemoryKv::new();
        for key in ["ab1", "ab0", "ac", "ab2", "b", "a"] {
            kv.put(Family::Id2Str, key.as_bytes(), b"").await.unwrap();
        }
        let items = drain(kv.iter_prefix(Family::Id2Str, b"ab").await.unwrap()).await;
        let keys: Vec<_> = items.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"ab0".as_slice(), b"ab1", b"ab2"]);

        // Empty prefix iterates the whole family in order.
        let all = drain(kv.iter_prefix(Family::Id2Str, b"").await.unwrap()).await;
        assert_eq!(all.len(), 6);
        assert!(all.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[tokio::test]
    async fn test_snapshot_is_frozen() {
        let kv = MemoryKv::new();
        kv.put(Family::Spo, b"old", b"1").await.unwrap();
        let snap = kv.snapshot().await.unwrap();

        kv.put(Family::Spo, b"new", b"2").await.unwrap();
        kv.delete(Family::Spo, b"old").await.unwrap();

        assert_eq!(snap.get(Family::Spo, b"old").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(snap.get(Family::Spo, b"new").await.unwrap(), None);
        let items = drain(snap.iter_prefix(Family::Spo, b"").await.unwrap()).await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_close_semantics() {
        let kv = MemoryKv::new();
        kv.put(Family::Spo, b"k", b"v").await.unwrap();
        assert!(kv.is_open());

        kv.close().await.unwrap();
        assert!(!kv.is_open());
        assert_eq!(kv.get(Family::Spo, b"k").await.unwrap_err().kind(), "already_closed");
        assert_eq!(kv.put(Family::Spo, b"k", b"v").await.unwrap_err().kind(), "already_closed");
        assert_eq!(kv.snapshot().await.unwrap_err().kind(), "already_closed");
        assert_eq!(kv.close().await.unwrap_err().kind(), "already_closed");
    }

    #[tokio::test]
    async fn test_iterator_and_snapshot_survive_close() {
        let kv = MemoryKv::new();
        for i in 0..10u8 {
            kv.put(Family::Spo, &[b'k', i], b"").await.unwrap();
        }
        let iter = kv.iter_prefix(Family::Spo, b"k").await.unwrap();
        let snap = kv.snapshot().await.unwrap();
        kv.close().await.unwrap();

        assert_eq!(drain(iter).await.len(), 10);
        assert_eq!(snap.get(Family::Spo, &[b'k', 3]).await.unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_family_names_round_trip() {
        for fam in Family::ALL {
            assert_eq!(fam.name().parse::<Family>().unwrap(), fam);
        }
        assert!("nope".parse::<Family>().is_err());
    }
}
