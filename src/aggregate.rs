// 🧮 Aggregator - Grouping and per-group reductions
//
// Reductions: count, count_distinct, sum, value_counts.
// Null contributions count as zero. Every accumulator can fold one value
// at a time (`update`) or absorb another partial (`merge`), so shards and
// streams use the same code as whole batches.

use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// ACCUMULATOR TRAITS
// ============================================================================

/// Fold one (possibly null) value into a running reduction
pub trait Accumulator<V>: Default {
    fn update(&mut self, value: Option<V>);
}

/// Combine two partial reductions of disjoint inputs
pub trait Mergeable {
    fn merge(&mut self, other: Self);
}

// ============================================================================
// REDUCTIONS
// ============================================================================

/// Number of non-null values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Count(u64);

impl Count {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl<V> Accumulator<V> for Count {
    fn update(&mut self, value: Option<V>) {
        if value.is_some() {
            self.0 += 1;
        }
    }
}

impl Mergeable for Count {
    fn merge(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Sum of non-negative integers; nulls add nothing.
///
/// Totals are kept in `u128`, wide enough for any number of `u64` inputs
/// a batch can hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sum(u128);

impl Sum {
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Accumulator<u64> for Sum {
    fn update(&mut self, value: Option<u64>) {
        self.0 += u128::from(value.unwrap_or(0));
    }
}

impl Mergeable for Sum {
    fn merge(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Set of distinct non-null values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountDistinct<T: Ord> {
    seen: BTreeSet<T>,
}

impl<T: Ord> Default for CountDistinct<T> {
    fn default() -> Self {
        CountDistinct { seen: BTreeSet::new() }
    }
}

impl<T: Ord> CountDistinct<T> {
    pub fn count(&self) -> u64 {
        self.seen.len() as u64
    }
}

impl<T: Ord> Accumulator<T> for CountDistinct<T> {
    fn update(&mut self, value: Option<T>) {
        if let Some(v) = value {
            self.seen.insert(v);
        }
    }
}

impl<T: Ord> Mergeable for CountDistinct<T> {
    fn merge(&mut self, other: Self) {
        self.seen.extend(other.seen);
    }
}

/// Occurrence count per distinct value, kept in ascending value order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCounts<T: Ord> {
    counts: BTreeMap<T, u64>,
}

impl<T: Ord> Default for ValueCounts<T> {
    fn default() -> Self {
        ValueCounts { counts: BTreeMap::new() }
    }
}

impl<T: Ord> ValueCounts<T> {
    pub fn get(&self, value: &T) -> u64 {
        self.counts.get(value).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, u64)> {
        self.counts.iter().map(|(v, c)| (v, *c))
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl<T: Ord> Accumulator<T> for ValueCounts<T> {
    fn update(&mut self, value: Option<T>) {
        if let Some(v) = value {
            *self.counts.entry(v).or_insert(0) += 1;
        }
    }
}

impl<T: Ord> Mergeable for ValueCounts<T> {
    fn merge(&mut self, other: Self) {
        for (value, count) in other.counts {
            *self.counts.entry(value).or_insert(0) += count;
        }
    }
}

// ============================================================================
// GROUP BY
// ============================================================================

/// Per-key accumulators. Iteration is in ascending key order, independent
/// of the order rows were folded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBy<K: Ord, A> {
    groups: BTreeMap<K, A>,
}

impl<K: Ord, A> Default for GroupBy<K, A> {
    fn default() -> Self {
        GroupBy { groups: BTreeMap::new() }
    }
}

impl<K: Ord, A: Default> GroupBy<K, A> {
    pub fn new() -> Self {
        GroupBy::default()
    }

    /// Fold a value into the group for `key`
    pub fn update<V>(&mut self, key: K, value: Option<V>)
    where
        A: Accumulator<V>,
    {
        self.groups.entry(key).or_default().update(value);
    }

    /// Make sure a group exists even if nothing is ever folded into it
    pub fn touch(&mut self, key: K) {
        self.groups.entry(key).or_default();
    }

    pub fn get(&self, key: &K) -> Option<&A> {
        self.groups.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &A)> {
        self.groups.iter()
    }

    pub fn into_groups(self) -> BTreeMap<K, A> {
        self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<K: Ord, A: Mergeable + Default> Mergeable for GroupBy<K, A> {
    fn merge(&mut self, other: Self) {
        for (key, partial) in other.groups {
            self.groups.entry(key).or_default().merge(partial);
        }
    }
}

/// Group rows by `key` and fold `value` of each row into its group
pub fn group_by<R, K, V, A>(
    rows: impl IntoIterator<Item = R>,
    key: impl Fn(&R) -> K,
    value: impl Fn(&R) -> Option<V>,
) -> GroupBy<K, A>
where
    K: Ord,
    A: Accumulator<V>,
{
    let mut grouped = GroupBy::new();
    for row in rows {
        grouped.update(key(&row), value(&row));
    }
    grouped
}

// ============================================================================
// TESTS
// ============================================================================
