//! Protocol identifiers
//!
//! WAMP identifiers are integers in `[1, 2^53]` so they survive a round trip
//! through an IEEE-754 double on the remote side. The broker issues
//! subscription IDs and publication IDs from one shared allocator, so no two
//! subscribe/publish calls observe the same fresh ID.

use std::sync::atomic::{AtomicU64, Ordering};

pub type SubscriptionId = u64;
pub type PublicationId = u64;
pub type SessionId = u64;
pub type RequestId = u64;

/// Largest identifier allowed on the wire (`2^53`).
pub const MAX_ID: u64 = 1 << 53;

pub trait IdAllocator: Send + Sync {
    fn next_id(&self) -> u64;
}

/// Hands out `first, first + 1, ...` and wraps back to 1 past [`MAX_ID`].
#[derive(Debug)]
pub struct SequentialIdAllocator {
    next: AtomicU64,
}

impl SequentialIdAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// `first` is clamped into `[1, MAX_ID]`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.clamp(1, MAX_ID)),
        }
    }
}

impl Default for SequentialIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator for SequentialIdAllocator {
    fn next_id(&self) -> u64 {
        let previous = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(if current >= MAX_ID { 1 } else { current + 1 })
            });
        // the closure always returns Some
        match previous {
            Ok(id) | Err(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn sequential_ids_start_at_seed() {
        let ids = SequentialIdAllocator::starting_at(100);
        assert_eq!(ids.next_id(), 100);
        assert_eq!(ids.next_id(), 101);
    }

    #[test]
    fn zero_seed_is_clamped() {
        let ids = SequentialIdAllocator::starting_at(0);
        assert_eq!(ids.next_id(), 1);
    }

    #[test]
    fn wraps_after_max_id() {
        let ids = SequentialIdAllocator::starting_at(MAX_ID);
        assert_eq!(ids.next_id(), MAX_ID);
        assert_eq!(ids.next_id(), 1);
    }

    #[test]
    fn concurrent_allocation_never_repeats() {
        let ids = Arc::new(SequentialIdAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..1000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "id {id} allocated twice");
            }
        }
        assert_eq!(seen.len(), 8000);
    }
}
