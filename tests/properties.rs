//! Property tests for the queue's core invariants: sortedness, no
//! duplicate live keys, conservation of inserted elements, min semantics,
//! and update-on-duplicate-key behavior.

use std::collections::HashMap;

use concurrent_pqueue::PQueue;
use proptest::prelude::*;

fn drain_all(q: &PQueue<i64, i64>) -> Vec<(i64, i64)> {
    let mut out = Vec::new();
    while let Some(pair) = q.delete_min() {
        out.push(pair);
    }
    out
}

proptest! {
    /// `to_array` is always sorted ascending by key, with no duplicate keys.
    #[test]
    fn to_array_is_sorted_and_deduplicated(keys in prop::collection::vec(-1000i64..1000, 0..200)) {
        let q: PQueue<i64, i64> = PQueue::new(16);
        for (i, k) in keys.iter().enumerate() {
            q.insert(*k, i as i64);
        }

        let snapshot = q.to_array();
        for pair in snapshot.windows(2) {
            prop_assert!(pair[0].0 < pair[1].0);
        }
    }

    /// Every distinct inserted key is conserved: `delete_min`, repeated
    /// until empty, yields exactly the set of distinct keys inserted.
    #[test]
    fn delete_min_conserves_distinct_keys(keys in prop::collection::vec(-500i64..500, 0..150)) {
        let q: PQueue<i64, i64> = PQueue::new(16);
        let mut last_value_by_key: HashMap<i64, i64> = HashMap::new();
        for (i, k) in keys.iter().enumerate() {
            q.insert(*k, i as i64);
            last_value_by_key.insert(*k, i as i64);
        }

        let drained = drain_all(&q);
        let mut expected: Vec<i64> = last_value_by_key.keys().copied().collect();
        expected.sort_unstable();

        let drained_keys: Vec<i64> = drained.iter().map(|(k, _)| *k).collect();
        prop_assert_eq!(drained_keys, expected);
    }

    /// `delete_min` always returns the current minimum among the
    /// not-yet-deleted keys.
    #[test]
    fn delete_min_returns_ascending_sequence(keys in prop::collection::vec(-500i64..500, 0..150)) {
        let q: PQueue<i64, i64> = PQueue::new(16);
        for k in &keys {
            q.insert(*k, *k);
        }

        let drained = drain_all(&q);
        for pair in drained.windows(2) {
            prop_assert!(pair[0].0 < pair[1].0);
        }
    }

    /// Inserting the same key twice keeps a single entry carrying the
    /// most recently inserted value.
    #[test]
    fn duplicate_insert_keeps_latest_value(k in -100i64..100, v1 in 0i64..1000, v2 in 0i64..1000) {
        let q: PQueue<i64, i64> = PQueue::new(16);
        q.insert(k, v1);
        q.insert(k, v2);

        let snapshot = q.to_array();
        prop_assert_eq!(snapshot, vec![(k, v2)]);
    }
}
