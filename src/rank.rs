// 🏆 Ranker - Per-group top-1 selection and result ordering
//
// Tie-break: among values sharing the maximum count, the one that sorts
// first (ascending, by the value itself) wins.

use crate::aggregate::{GroupBy, ValueCounts};

/// Winning value of one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranked<K, V> {
    pub key: K,
    pub value: V,
    pub count: u64,
}

/// Most frequent value, or None for an empty tally
pub fn top_value<V: Ord>(counts: &ValueCounts<V>) -> Option<(&V, u64)> {
    let mut best: Option<(&V, u64)> = None;

    // ValueCounts iterates in ascending value order, so only a strictly
    // greater count may replace the current leader.
    for (value, count) in counts.iter() {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((value, count)),
        }
    }

    best
}

/// Top-1 of every group, in ascending key order. Empty groups are dropped.
pub fn top_per_group<K, V>(groups: &GroupBy<K, ValueCounts<V>>) -> Vec<Ranked<K, V>>
where
    K: Ord + Clone,
    V: Ord + Clone,
{
    groups
        .iter()
        .filter_map(|(key, counts)| {
            top_value(counts).map(|(value, count)| Ranked {
                key: key.clone(),
                value: value.clone(),
                count,
            })
        })
        .collect()
}

/// Stable descending sort; rows with equal keys keep their current order
pub fn sort_descending_by<T, K, F>(rows: &mut [T], key: F)
where
    K: Ord,
    F: Fn(&T) -> K,
{
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

// ============================================================================
// TESTS
// ============================================================================
