//! Per-chunk memory budget with RAII reservations.
//!
//! The assembler reserves the byte size of every tensor before allocating it.
//! Dropping the [`Reservation`] returns the bytes; the budget also remembers
//! the peak so a run can report it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

struct BudgetInner {
    capacity: usize,
    used: AtomicUsize,
    peak: AtomicUsize,
}

impl BudgetInner {
    fn try_acquire(&self, bytes: usize) -> std::result::Result<usize, usize> {
        loop {
            let cur = self.used.load(Ordering::Relaxed);
            let next = cur.saturating_add(bytes);
            if next > self.capacity {
                return Err(cur);
            }
            if self
                .used
                .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(next);
            }
        }
    }

    fn record_peak(&self, used: usize) {
        let mut cur = self.peak.load(Ordering::Relaxed);
        while used > cur {
            match self
                .peak
                .compare_exchange(cur, used, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

#[derive(Clone)]
pub struct ChunkBudget {
    inner: Arc<BudgetInner>,
}

impl ChunkBudget {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Arc::new(BudgetInner {
                capacity: capacity_bytes,
                used: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Account for `bytes`, or fail with [`Error::BudgetExceeded`].
    pub fn reserve(&self, bytes: usize, tag: &'static str) -> Result<Reservation> {
        match self.inner.try_acquire(bytes) {
            Ok(used) => {
                self.inner.record_peak(used);
                Ok(Reservation {
                    inner: Arc::clone(&self.inner),
                    bytes,
                    tag,
                })
            }
            Err(used) => Err(Error::BudgetExceeded {
                tag,
                requested: bytes,
                capacity: self.inner.capacity,
                used,
            }),
        }
    }

    pub fn capacity_bytes(&self) -> usize {
        self.inner.capacity
    }

    /// Current usage (advisory).
    pub fn used_bytes(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }

    pub fn peak_bytes(&self) -> usize {
        self.inner.peak.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ChunkBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkBudget")
            .field("capacity", &self.capacity_bytes())
            .field("used", &self.used_bytes())
            .field("peak", &self.peak_bytes())
            .finish()
    }
}

/// Bytes held against a [`ChunkBudget`]; released on drop.
pub struct Reservation {
    inner: Arc<BudgetInner>,
    bytes: usize,
    tag: &'static str,
}

impl Reservation {
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.bytes > 0 {
            self.inner.release(self.bytes);
            self.bytes = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservations_release_on_drop() {
        let budget = ChunkBudget::new(100);
        {
            let a = budget.reserve(60, "a").unwrap();
            assert_eq!(a.bytes(), 60);
            assert_eq!(budget.used_bytes(), 60);
            let _b = budget.reserve(40, "b").unwrap();
            assert_eq!(budget.used_bytes(), 100);
        }
        assert_eq!(budget.used_bytes(), 0);
        assert_eq!(budget.peak_bytes(), 100);
    }

    #[test]
    fn over_capacity_reports_context() {
        let budget = ChunkBudget::new(10);
        let _held = budget.reserve(4, "held").unwrap();
        match budget.reserve(8, "cube") {
            Err(Error::BudgetExceeded {
                tag,
                requested,
                capacity,
                used,
            }) => {
                assert_eq!((tag, requested, capacity, used), ("cube", 8, 10, 4));
            }
            other => panic!("expected budget error, got {:?}", other.map(|r| r.bytes())),
        }
    }
}
