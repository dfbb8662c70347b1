//! Keyed in-flight guard.
//!
//! Tracks which keyed operations are currently running so a second trigger
//! for the same key is a no-op until the first completes. The UI keeps one
//! per write concern (e.g. add-competitor per candidate); different keys
//! never block each other.

use std::collections::HashSet;
use std::hash::Hash;

#[derive(Debug, Default)]
pub struct PendingSet<K: Eq + Hash> {
    in_flight: HashSet<K>,
}

impl<K: Eq + Hash> PendingSet<K> {
    pub fn new() -> Self {
        Self {
            in_flight: HashSet::new(),
        }
    }

    /// Claim the key. Returns false when an operation for it is already in
    /// flight, in which case the caller must not start another.
    pub fn begin(&mut self, key: K) -> bool {
        self.in_flight.insert(key)
    }

    pub fn finish(&mut self, key: &K) {
        self.in_flight.remove(key);
    }

    pub fn contains(&self, key: &K) -> bool {
        self.in_flight.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_begin_is_refused_until_finish() {
        let mut pending = PendingSet::new();
        assert!(pending.begin(42u64));
        // double submit in quick succession: second begin refused, so
        // exactly one outbound request would be issued
        assert!(!pending.begin(42));
        assert!(pending.contains(&42));
        pending.finish(&42);
        assert!(pending.begin(42));
    }

    #[test]
    fn distinct_keys_do_not_block_each_other() {
        let mut pending = PendingSet::new();
        assert!(pending.begin(1u64));
        assert!(pending.begin(2));
        assert!(pending.contains(&1));
        assert!(pending.contains(&2));
        pending.finish(&1);
        assert!(!pending.contains(&1));
        assert!(pending.contains(&2));
    }
}
