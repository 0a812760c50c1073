//! Bounded memory of settled transaction handles.
//!
//! A FIFO set: when full, the oldest handle is evicted to make room for a
//! new one. Lookups are O(1) via a `HashSet`.

use stakeflow_types::TxHandle;
use std::collections::{HashSet, VecDeque};

/// Handles whose terminal outcome has already been processed.
///
/// A late or repeated terminal notification for a handle in this set is
/// ignored, so no outcome is reported twice and no refresh is repeated.
pub struct ProcessedSet {
    set: HashSet<TxHandle>,
    order: VecDeque<TxHandle>,
    capacity: usize,
}

impl ProcessedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            set: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a handle. Returns `false` if it was already present.
    pub fn insert(&mut self, handle: TxHandle) -> bool {
        if self.set.contains(&handle) {
            return false;
        }
        if self.capacity == 0 {
            return true;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        self.set.insert(handle.clone());
        self.order.push_back(handle);
        true
    }

    pub fn contains(&self, handle: &TxHandle) -> bool {
        self.set.contains(handle)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(n: u8) -> TxHandle {
        TxHandle::new(format!("0x{n:02x}"))
    }

    #[test]
    fn second_insert_reports_duplicate() {
        let mut set = ProcessedSet::new(4);
        assert!(set.insert(handle(1)));
        assert!(!set.insert(handle(1)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut set = ProcessedSet::new(2);
        set.insert(handle(1));
        set.insert(handle(2));
        set.insert(handle(3));

        assert!(!set.contains(&handle(1)));
        assert!(set.contains(&handle(2)));
        assert!(set.contains(&handle(3)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn empty_set() {
        let set = ProcessedSet::new(8);
        assert!(set.is_empty());
        assert!(!set.contains(&handle(9)));
    }
}
