//! Per-range sample buckets with a fixed capacity.
//!
//! The feed worker is the only writer; the live display and the controller
//! read snapshots concurrently. Buckets are pre-sized so a push never
//! reallocates.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::RangeId;

#[derive(Debug)]
pub struct SampleBank {
    capacity: usize,
    buckets: RwLock<Vec<Vec<f64>>>,
}

/// Point-in-time copy of every bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct BankSnapshot {
    capacity: usize,
    buckets: Vec<Vec<f64>>,
}

impl BankSnapshot {
    /// A snapshot of a bank nothing has been accepted into yet.
    pub fn empty(ranges: usize, capacity: usize) -> Self {
        Self {
            capacity,
            buckets: vec![Vec::new(); ranges],
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bucket(&self, range: RangeId) -> &[f64] {
        self.buckets.get(range.index()).map_or(&[], Vec::as_slice)
    }

    pub fn buckets(&self) -> &[Vec<f64>] {
        &self.buckets
    }

    pub fn accepted_total(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}

impl SampleBank {
    pub fn new(ranges: usize, capacity: usize) -> Self {
        Self {
            capacity,
            buckets: RwLock::new((0..ranges).map(|_| Vec::with_capacity(capacity)).collect()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Vec<f64>>> {
        self.buckets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Vec<f64>>> {
        self.buckets.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn range_count(&self) -> usize {
        self.read().len()
    }

    /// Appends `value` to the bucket unless it is full or `range` is unknown.
    pub fn try_accept(&self, range: RangeId, value: f64) -> bool {
        let mut buckets = self.write();
        match buckets.get_mut(range.index()) {
            Some(bucket) if bucket.len() < self.capacity => {
                bucket.push(value);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self, range: RangeId) -> usize {
        self.read().get(range.index()).map_or(0, Vec::len)
    }

    pub fn is_full(&self, range: RangeId) -> bool {
        self.read()
            .get(range.index())
            .is_some_and(|b| b.len() >= self.capacity)
    }

    /// True once every bucket holds `capacity` samples.
    pub fn is_complete(&self) -> bool {
        self.read().iter().all(|b| b.len() >= self.capacity)
    }

    pub fn accepted_total(&self) -> usize {
        self.read().iter().map(Vec::len).sum()
    }

    pub fn snapshot(&self) -> BankSnapshot {
        BankSnapshot {
            capacity: self.capacity,
            buckets: self.read().clone(),
        }
    }

    pub fn reset(&self) {
        for bucket in self.write().iter_mut() {
            bucket.clear();
        }
    }
}
