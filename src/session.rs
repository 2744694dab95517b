//! Per-caller sampling state.
//!
//! A `Session` owns every mutable buffer a delta snapshot needs: the pid
//! scratch list, the previous-sample baseline and the current-sample scratch
//! set. Sessions are never shared; independent callers use independent
//! sessions and need no locking. Operations on one session are sequential
//! (`&mut self`).

use tracing::debug;

use crate::error::{Result, ScanError};
use crate::sample::Sample;

/// Initial capacity of a buffer's first growth.
pub const SEED_CAPACITY: usize = 1024;

/// Grows `buf` so that it can hold at least `needed` elements.
///
/// Capacity doubles from `SEED_CAPACITY` until sufficient and never shrinks.
/// A `limit` caps the resulting capacity; exceeding it is reported the same
/// way as allocator exhaustion.
pub(crate) fn reserve_doubling<T>(buf: &mut Vec<T>, needed: usize, limit: Option<usize>) -> Result<()> {
    if needed <= buf.capacity() {
        return Ok(());
    }
    if limit.is_some_and(|max| needed > max) {
        return Err(ScanError::AllocationFailure { requested: needed });
    }

    let mut target = buf.capacity().max(SEED_CAPACITY);
    while target < needed {
        target = target
            .checked_mul(2)
            .ok_or(ScanError::AllocationFailure { requested: needed })?;
    }
    if let Some(max) = limit {
        target = target.min(max);
    }

    buf.try_reserve_exact(target - buf.len())
        .map_err(|_| ScanError::AllocationFailure { requested: target })
}

#[derive(Debug, Default)]
pub struct Session {
    pids: Vec<u32>,
    previous: Vec<Sample>,
    current: Vec<Sample>,
    row_limit: Option<usize>,
    generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session whose buffers may never grow beyond `rows` elements. Calls that
    /// would need more degrade as on allocation failure.
    pub fn with_row_limit(rows: usize) -> Self {
        Self {
            row_limit: Some(rows),
            ..Self::default()
        }
    }

    pub fn row_limit(&self) -> Option<usize> {
        self.row_limit
    }

    /// The stored baseline, ascending by pid.
    pub fn baseline(&self) -> &[Sample] {
        &self.previous
    }

    pub fn has_baseline(&self) -> bool {
        !self.previous.is_empty()
    }

    /// Number of completed delta calls since creation or the last release.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Combined capacity of all owned buffers, in elements.
    pub fn allocated(&self) -> usize {
        self.pids.capacity() + self.previous.capacity() + self.current.capacity()
    }

    /// Frees all owned storage and forgets the baseline. The session stays
    /// usable; the next delta call behaves like a first observation.
    pub fn release(&mut self) {
        debug!(
            generation = self.generation,
            allocated = self.allocated(),
            "releasing session buffers"
        );
        self.pids = Vec::new();
        self.previous = Vec::new();
        self.current = Vec::new();
        self.generation = 0;
    }

    /// Scratch pid list and current-sample set, borrowed together for a capture.
    pub(crate) fn capture_buffers(&mut self) -> (&mut Vec<u32>, &mut Vec<Sample>) {
        (&mut self.pids, &mut self.current)
    }

    pub(crate) fn previous_and_current(&self) -> (&[Sample], &[Sample]) {
        (&self.previous, &self.current)
    }

    /// Replaces the baseline wholesale with the current sample set.
    ///
    /// Buffers are swapped, not copied; the old baseline becomes the next
    /// call's scratch and keeps its capacity.
    pub(crate) fn commit_baseline(&mut self) {
        std::mem::swap(&mut self.previous, &mut self.current);
        self.current.clear();
        self.generation += 1;
    }

    /// Drops whatever a failed call left in the scratch set.
    pub(crate) fn discard_current(&mut self) {
        self.current.clear();
    }
}
