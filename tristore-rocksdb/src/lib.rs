//! # Tristore RocksDB adapter
//!
//! Implements the tristore key-value engine seam over RocksDB: six column
//! families, atomic cross-family batches, chunk-buffered prefix iterators,
//! and snapshots that co-own the database handle.
//!
//! ## Blocking discipline
//!
//! RocksDB has no async API, so every call that can touch disk runs on
//! `tokio::task::spawn_blocking`; the async surface never stalls the
//! caller's executor.
//!
//! ## Close semantics
//!
//! [`RocksKv::close`] takes the handle out of the engine, so new operations
//! fail with `already_closed` (closing twice does too). Outstanding
//! iterators and snapshots hold their own `Arc` on the database and keep
//! working until dropped; the database shuts down when the last holder
//! goes away. Close is therefore never observable as a crash.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};
use tokio::task::spawn_blocking;

use tristore_core::error::{Error, Result};
use tristore_core::kv::{BatchOp, Family, KvEngine, KvIter, KvSnapshot};

/// How many pairs an iterator pulls from the engine per blocking call.
const ITER_CHUNK: usize = 256;

fn engine_err(err: rocksdb::Error) -> Error {
    Error::engine(err.to_string())
}

fn join_err(err: tokio::task::JoinError) -> Error {
    Error::engine(format!("spawn_blocking join error: {}", err))
}

fn cf_handle(db: &DB, family: Family) -> Result<&ColumnFamily> {
    db.cf_handle(family.name())
        .ok_or_else(|| Error::engine(format!("missing column family {}", family)))
}

// ============================================================================
// Engine
// ============================================================================

struct RocksInner {
    /// `None` once closed. Iterators and snapshots clone the `Arc` out, so
    /// taking it here never invalidates them.
    db: RwLock<Option<Arc<DB>>>,
    path: PathBuf,
}

/// RocksDB-backed engine.
#[derive(Clone)]
pub struct RocksKv {
    inner: Arc<RocksInner>,
}

impl fmt::Debug for RocksKv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksKv")
            .field("path", &self.inner.path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl RocksKv {
    /// Open (or create) a store directory with all column families.
    ///
    /// Idempotent on existing stores: families that already exist are
    /// reused, missing ones are created.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let db = spawn_blocking({
            let path = path.clone();
            move || -> Result<DB> {
                let mut opts = Options::default();
                opts.create_if_missing(true);
                opts.create_missing_column_families(true);
                let descriptors: Vec<ColumnFamilyDescriptor> = Family::ALL
                    .iter()
                    .map(|family| ColumnFamilyDescriptor::new(family.name(), Options::default()))
                    .collect();
                DB::open_cf_descriptors(&opts, &path, descriptors)
                    .map_err(|e| Error::engine(format!("open failed at {}: {}", path.display(), e)))
            }
        })
        .await
        .map_err(join_err)??;

        tracing::debug!(path = %path.display(), "rocksdb engine opened");
        Ok(Self {
            inner: Arc::new(RocksInner {
                db: RwLock::new(Some(Arc::new(db))),
                path,
            }),
        })
    }

    fn db(&self) -> Result<Arc<DB>> {
        self.inner.db.read().clone().ok_or(Error::AlreadyClosed)
    }
}

#[async_trait]
impl KvEngine for RocksKv {
    async fn get(&self, family: Family, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let db = self.db()?;
        let key = key.to_vec();
        spawn_blocking(move || {
            let cf = cf_handle(&db, family)?;
            db.get_cf(cf, &key).map_err(engine_err)
        })
        .await
        .map_err(join_err)?
    }

    async fn put(&self, family: Family, key: &[u8], value: &[u8]) -> Result<()> {
        let db = self.db()?;
        let key = key.to_vec();
        let value = value.to_vec();
        spawn_blocking(move || {
            let cf = cf_handle(&db, family)?;
            db.put_cf(cf, &key, &value).map_err(engine_err)
        })
        .await
        .map_err(join_err)?
    }

    async fn delete(&self, family: Family, key: &[u8]) -> Result<()> {
        let db = self.db()?;
        let key = key.to_vec();
        spawn_blocking(move || {
            let cf = cf_handle(&db, family)?;
            // Absent keys delete cleanly; RocksDB treats this as a no-op.
            db.delete_cf(cf, &key).map_err(engine_err)
        })
        .await
        .map_err(join_err)?
    }

    async fn exists(&self, family: Family, key: &[u8]) -> Result<bool> {
        let db = self.db()?;
        let key = key.to_vec();
        spawn_blocking(move || {
            let cf = cf_handle(&db, family)?;
            // Pinned read: existence without copying the value out.
            Ok(db.get_pinned_cf(cf, &key).map_err(engine_err)?.is_some())
        })
        .await
        .map_err(join_err)?
    }

    async fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let db = self.db()?;
        spawn_blocking(move || {
            let mut batch = rocksdb::WriteBatch::default();
            for op in &ops {
                match op {
                    BatchOp::Put { family, key, value } => {
                        batch.put_cf(cf_handle(&db, *family)?, key, value);
                    }
                    BatchOp::Delete { family, key } => {
                        batch.delete_cf(cf_handle(&db, *family)?, key);
                    }
                }
            }
            db.write(batch).map_err(engine_err)
        })
        .await
        .map_err(join_err)?
    }

    async fn iter_prefix(&self, family: Family, prefix: &[u8]) -> Result<Box<dyn KvIter>> {
        let db = self.db()?;
        Ok(Box::new(RocksIter::new(
            IterSource::Live(db),
            family,
            prefix.to_vec(),
        )))
    }

    async fn snapshot(&self) -> Result<Box<dyn KvSnapshot>> {
        let db = self.db()?;
        let handle = spawn_blocking(move || SnapshotHandle::capture(db))
            .await
            .map_err(join_err)?;
        Ok(Box::new(RocksSnapshot { handle }))
    }

    async fn close(&self) -> Result<()> {
        let taken = self.inner.db.write().take();
        match taken {
            Some(db) => {
                tracing::debug!(path = %self.inner.path.display(), "rocksdb engine closed");
                // Final teardown can compact and fsync; keep it off the
                // async threads. If iterators or snapshots are still
                // alive, this only drops a reference and teardown happens
                // when the last of them goes away.
                spawn_blocking(move || drop(db)).await.map_err(join_err)?;
                Ok(())
            }
            None => Err(Error::AlreadyClosed),
        }
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.inner.path)
    }

    fn is_open(&self) -> bool {
        self.inner.db.read().is_some()
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Owns a RocksDB snapshot together with the database handle it reads.
///
/// `rocksdb::Snapshot` borrows the `DB` it was taken from. The borrow here
/// points into the allocation owned by `db`, which an `Arc` pins on the
/// heap for as long as this struct lives, so erasing the lifetime cannot
/// dangle. Field order matters: `snap` is declared first so it is dropped
/// (and released against the still-live `DB`) before the handle.
struct SnapshotHandle {
    snap: rocksdb::Snapshot<'static>,
    db: Arc<DB>,
}

// SAFETY: a RocksDB snapshot is an immutable sequence-number pin; the C API
// permits reads through it from any thread, and `Snapshot` only exposes
// read methods taking `&self`. The raw pointer inside is what suppresses
// the auto traits.
unsafe impl Send for SnapshotHandle {}
unsafe impl Sync for SnapshotHandle {}

impl SnapshotHandle {
    fn capture(db: Arc<DB>) -> Arc<SnapshotHandle> {
        // SAFETY: see the struct docs; `db` outlives `snap` by field order
        // and the pointee is heap-pinned by the Arc.
        let snap = unsafe {
            std::mem::transmute::<rocksdb::Snapshot<'_>, rocksdb::Snapshot<'static>>(db.snapshot())
        };
        Arc::new(SnapshotHandle { snap, db })
    }
}

/// Frozen point-in-time view over the engine.
pub struct RocksSnapshot {
    handle: Arc<SnapshotHandle>,
}

#[async_trait]
impl KvSnapshot for RocksSnapshot {
    async fn get(&self, family: Family, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let handle = self.handle.clone();
        let key = key.to_vec();
        spawn_blocking(move || {
            let cf = cf_handle(&handle.db, family)?;
            handle.snap.get_cf(cf, &key).map_err(engine_err)
        })
        .await
        .map_err(join_err)?
    }

    async fn iter_prefix(&self, family: Family, prefix: &[u8]) -> Result<Box<dyn KvIter>> {
        Ok(Box::new(RocksIter::new(
            IterSource::Snapshot(self.handle.clone()),
            family,
            prefix.to_vec(),
        )))
    }
}

// ============================================================================
// Iterator
// ============================================================================

#[derive(Clone)]
enum IterSource {
    Live(Arc<DB>),
    Snapshot(Arc<SnapshotHandle>),
}

/// Chunk-buffered forward iterator.
///
/// Each refill seeks to the position after the last delivered key and pulls
/// up to [`ITER_CHUNK`] pairs in one blocking call, so per-item cost stays
/// amortised while no RocksDB iterator outlives a single call. The source
/// keeps the database alive independently of the engine handle.
pub struct RocksIter {
    source: IterSource,
    family: Family,
    prefix: Vec<u8>,
    /// Seek position for the next refill; starts at the prefix itself.
    cursor: Vec<u8>,
    buffer: VecDeque<(Vec<u8>, Vec<u8>)>,
    exhausted: bool,
}

impl RocksIter {
    fn new(source: IterSource, family: Family, prefix: Vec<u8>) -> Self {
        Self {
            source,
            family,
            cursor: prefix.clone(),
            prefix,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    async fn refill(&mut self) -> Result<()> {
        let source = self.source.clone();
        let family = self.family;
        let prefix = self.prefix.clone();
        let seek = self.cursor.clone();

        let (items, exhausted) = spawn_blocking(move || -> Result<_> {
            let db = match &source {
                IterSource::Live(db) => db.as_ref(),
                IterSource::Snapshot(handle) => handle.db.as_ref(),
            };
            let cf = cf_handle(db, family)?;
            let mode = if seek.is_empty() {
                IteratorMode::Start
            } else {
                IteratorMode::From(&seek, Direction::Forward)
            };
            let iter = match &source {
                IterSource::Live(db) => db.iterator_cf(cf, mode),
                IterSource::Snapshot(handle) => handle.snap.iterator_cf(cf, mode),
            };

            let mut items = Vec::with_capacity(ITER_CHUNK.min(64));
            for entry in iter {
                let (key, value) = entry.map_err(engine_err)?;
                if !key.starts_with(&prefix) {
                    return Ok((items, true));
                }
                items.push((key.into_vec(), value.into_vec()));
                if items.len() == ITER_CHUNK {
                    return Ok((items, false));
                }
            }
            Ok((items, true))
        })
        .await
        .map_err(join_err)??;

        if let Some((last_key, _)) = items.last() {
            // The immediate successor of the last delivered key.
            let mut next = last_key.clone();
            next.push(0);
            self.cursor = next;
        }
        self.exhausted = exhausted;
        self.buffer.extend(items);
        Ok(())
    }
}

#[async_trait]
impl KvIter for RocksIter {
    async fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        loop {
            if let Some(pair) = self.buffer.pop_front() {
                return Ok(Some(pair));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.refill().await?;
        }
    }
}
