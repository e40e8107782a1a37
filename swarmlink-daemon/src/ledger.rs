//! Dedup ledger: process-lifetime idempotency guard.
//!
//! A pure in-memory set of dispatched [`DedupKey`]s — not a durability
//! guarantee. A restart may re-announce very recent changes; that is an
//! accepted limitation. Capped by insertion order so an unbounded run cannot
//! grow without limit.

use std::collections::{HashSet, VecDeque};

use swarmlink_core::DedupKey;

/// Keys retained before the oldest entries are evicted.
pub const DEFAULT_CAP: usize = 8192;

#[derive(Debug)]
pub struct DedupLedger {
    seen: HashSet<DedupKey>,
    order: VecDeque<DedupKey>,
    cap: usize,
}

impl Default for DedupLedger {
    fn default() -> Self {
        Self::with_cap(DEFAULT_CAP)
    }
}

impl DedupLedger {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    /// True if no change for this key has been dispatched yet.
    pub fn should_process(&self, key: &DedupKey) -> bool {
        !self.seen.contains(key)
    }

    /// Record a successful dispatch. Evicts the oldest key beyond the cap.
    pub fn mark_processed(&mut self, key: DedupKey) {
        if !self.seen.insert(key.clone()) {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
