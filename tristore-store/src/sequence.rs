//! Crash-safe sequence counters for dictionary-allocated term types.
//!
//! One counter per allocated type (URI, blank node, literal), held in a
//! lock-free atomic word. The counter hands out values in
//! `[1, 2^59 - 1]` and is persisted two ways:
//!
//! - every `checkpoint_interval` allocations, the current value rides along
//!   in the same atomic batch as the allocation that crossed the boundary;
//! - on graceful shutdown, `flush` writes the latest values.
//!
//! On startup a persisted value is resumed **plus a safety margin**, so an
//! ID handed out between the last checkpoint and a crash can never be
//! reallocated: with interval and margin both 1000, at most 999 allocations
//! can follow a checkpoint without triggering the next one, and the margin
//! skips all of them.
//!
//! Checkpoint keys live in the `str2id` family under a `0x00` lead byte;
//! term keys start with their kind discriminator (`0x01` and up), so the
//! two can never collide. Values are 8 bytes big-endian.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tristore_core::error::{Error, Result};
use tristore_core::kv::{BatchOp, Family, KvEngine};
use tristore_core::term_id::TermType;

use crate::StoreConfig;

/// Highest sequence value a counter may hand out.
pub const MAX_SEQUENCE: u64 = (1u64 << 59) - 1;

const WARN_THRESHOLD: u64 = MAX_SEQUENCE / 2;

/// Reserved `str2id` key holding a type's persisted counter.
pub(crate) fn counter_key(term_type: TermType) -> [u8; 5] {
    [0x00, b's', b'e', b'q', term_type.tag()]
}

/// Index into the per-type arrays. Inline types never allocate; calling
/// this with one is a programming error and panics in debug and release.
fn slot(term_type: TermType) -> usize {
    match term_type {
        TermType::Uri => 0,
        TermType::BlankNode => 1,
        TermType::Literal => 2,
        other => panic!("inline term type {} has no sequence counter", other),
    }
}

/// The three per-type counters plus their telemetry latches.
#[derive(Debug)]
pub struct SequenceCounters {
    /// Next value to hand out, per type.
    next: [AtomicU64; 3],
    /// One-shot half-capacity warning latch.
    warned: [AtomicBool; 3],
    /// One-shot exhaustion telemetry latch.
    overflow_reported: [AtomicBool; 3],
    /// Set on first allocation; flush is a no-op while clear.
    dirty: AtomicBool,
    checkpoint_interval: u64,
}

impl SequenceCounters {
    /// Load persisted counter state from the engine.
    pub async fn load<E: KvEngine>(engine: &E, config: &StoreConfig) -> Result<Self> {
        let mut next = [1u64; 3];
        for &term_type in TermType::allocated() {
            let key = counter_key(term_type);
            if let Some(bytes) = engine.get(Family::Str2Id, &key).await? {
                let persisted = decode_checkpoint(term_type, &bytes)?;
                // Resume past everything the margin could have covered,
                // capped so exhaustion still reports instead of wrapping.
                next[slot(term_type)] =
                    (persisted.saturating_add(config.restart_safety_margin)).min(MAX_SEQUENCE + 1);
            }
        }
        Ok(Self {
            next: next.map(AtomicU64::new),
            warned: [(); 3].map(|_| AtomicBool::new(false)),
            overflow_reported: [(); 3].map(|_| AtomicBool::new(false)),
            dirty: AtomicBool::new(false),
            checkpoint_interval: config.checkpoint_interval,
        })
    }

    /// Allocate the next sequence value for a type.
    ///
    /// Fails with `sequence_overflow` at the ceiling; the counter never
    /// wraps and reads stay healthy.
    pub fn next(&self, term_type: TermType) -> Result<u64> {
        let i = slot(term_type);
        loop {
            let current = self.next[i].load(Ordering::SeqCst);
            if current > MAX_SEQUENCE {
                if !self.overflow_reported[i].swap(true, Ordering::SeqCst) {
                    tracing::error!(
                        term_type = %term_type,
                        capacity = MAX_SEQUENCE,
                        "sequence counter exhausted; further allocations of this type will fail"
                    );
                }
                return Err(Error::SequenceOverflow { term_type });
            }
            if self.next[i]
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                self.dirty.store(true, Ordering::Release);
                if current >= WARN_THRESHOLD && !self.warned[i].swap(true, Ordering::SeqCst) {
                    tracing::warn!(
                        term_type = %term_type,
                        allocated = current,
                        capacity = MAX_SEQUENCE,
                        "sequence counter past half capacity"
                    );
                }
                return Ok(current);
            }
        }
    }

    /// Last value handed out for a type, 0 before the first allocation.
    pub fn last_allocated(&self, term_type: TermType) -> u64 {
        self.next[slot(term_type)].load(Ordering::SeqCst) - 1
    }

    /// Whether the allocation of `seq` must carry a checkpoint write.
    pub fn checkpoint_due(&self, seq: u64) -> bool {
        self.checkpoint_interval != 0 && seq % self.checkpoint_interval == 0
    }

    /// The batch operation persisting `seq` as a type's checkpoint.
    pub fn checkpoint_op(&self, term_type: TermType, seq: u64) -> BatchOp {
        BatchOp::put(
            Family::Str2Id,
            counter_key(term_type).to_vec(),
            seq.to_be_bytes().to_vec(),
        )
    }

    /// Persist the latest values. Called on graceful shutdown.
    pub async fn flush<E: KvEngine>(&self, engine: &E) -> Result<()> {
        if !self.dirty.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut ops = Vec::new();
        for &term_type in TermType::allocated() {
            let last = self.last_allocated(term_type);
            if last > 0 {
                ops.push(self.checkpoint_op(term_type, last.min(MAX_SEQUENCE)));
            }
        }
        if !ops.is_empty() {
            engine.write_batch(ops).await?;
        }
        Ok(())
    }
}

fn decode_checkpoint(term_type: TermType, bytes: &[u8]) -> Result<u64> {
    let buf: [u8; 8] = bytes.try_into().map_err(|_| {
        Error::engine(format!(
            "malformed sequence checkpoint for {}: {} bytes",
            term_type,
            bytes.len()
        ))
    })?;
    Ok(u64::from_be_bytes(buf))
}
