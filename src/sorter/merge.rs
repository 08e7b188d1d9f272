//! Merge resolvers and the k-way merge over sorted runs.

use crate::error::Result;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// A key-value pair produced by a run.
pub type Entry = (Vec<u8>, Vec<u8>);

/// Resolves two values that were added under the same key.
///
/// `left` is the value produced first, `right` the one produced after it.
/// When more than two values collide, the resolver is applied pairwise in
/// production order: `merge(merge(v1, v2), v3)` and so on. Resolvers need
/// not be associative.
///
/// Any `Fn(&[u8], &[u8], &[u8]) -> Vec<u8>` closure is a resolver:
///
/// ```
/// use mtable::SorterOptions;
///
/// let concat = |_key: &[u8], left: &[u8], right: &[u8]| [left, right].concat();
/// let options = SorterOptions::new().merge(concat);
/// ```
pub trait MergeResolver: Send + Sync {
    /// Merge two colliding values for `key` into one.
    fn merge(&self, key: &[u8], left: &[u8], right: &[u8]) -> Vec<u8>;

    /// Name used in logs and debug output.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> MergeResolver for F
where
    F: Fn(&[u8], &[u8], &[u8]) -> Vec<u8> + Send + Sync,
{
    fn merge(&self, key: &[u8], left: &[u8], right: &[u8]) -> Vec<u8> {
        self(key, left, right)
    }
}

/// Keeps the most recently added value; later additions override earlier ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepLatest;

impl MergeResolver for KeepLatest {
    fn merge(&self, _key: &[u8], _left: &[u8], right: &[u8]) -> Vec<u8> {
        right.to_vec()
    }

    fn name(&self) -> &str {
        "KeepLatest"
    }
}

/// Keeps the first value added for a key and ignores later ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepFirst;

impl MergeResolver for KeepFirst {
    fn merge(&self, _key: &[u8], left: &[u8], _right: &[u8]) -> Vec<u8> {
        left.to_vec()
    }

    fn name(&self) -> &str {
        "KeepFirst"
    }
}

/// Entry in the merge heap
struct HeapEntry {
    key: Vec<u8>,
    value: Vec<u8>,
    run: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.run == other.run
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (smallest key first)
        other.key.cmp(&self.key).then_with(|| {
            // For equal keys, the earlier run (older data) comes out first
            other.run.cmp(&self.run)
        })
    }
}

/// A sorted source of entries: a spilled run or the final in-memory buffer.
pub type RunSource = Box<dyn Iterator<Item = Result<Entry>>>;

/// Multi-way merge over sorted runs.
///
/// Runs must be given in the order their entries were added, and each run
/// must be sorted by key with equal keys kept in insertion order. The
/// output has strictly increasing keys; colliding values are folded with
/// the resolver in insertion order.
pub struct MergingRuns {
    heap: BinaryHeap<HeapEntry>,
    runs: Vec<RunSource>,
    resolver: Arc<dyn MergeResolver>,
    collisions: u64,
}

impl MergingRuns {
    /// Create a merge over `runs`, priming the heap with each run's first entry.
    pub fn new(runs: Vec<RunSource>, resolver: Arc<dyn MergeResolver>) -> Result<Self> {
        let mut merge = Self { heap: BinaryHeap::new(), runs, resolver, collisions: 0 };
        for run in 0..merge.runs.len() {
            merge.pull(run)?;
        }
        Ok(merge)
    }

    /// Advance the run at the given index and add its next entry to the heap
    fn pull(&mut self, run: usize) -> Result<()> {
        if let Some(next) = self.runs[run].next() {
            let (key, value) = next?;
            self.heap.push(HeapEntry { key, value, run });
        }
        Ok(())
    }

    /// Number of resolver invocations so far
    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    fn next_merged(&mut self) -> Result<Option<Entry>> {
        let Some(first) = self.heap.pop() else {
            return Ok(None);
        };
        // Refill before peeking so a run's own duplicates surface in order.
        self.pull(first.run)?;

        let key = first.key;
        let mut value = first.value;
        while self.heap.peek().is_some_and(|e| e.key == key) {
            if let Some(next) = self.heap.pop() {
                self.pull(next.run)?;
                value = self.resolver.merge(&key, &value, &next.value);
                self.collisions += 1;
            }
        }

        Ok(Some((key, value)))
    }
}

impl Iterator for MergingRuns {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_merged().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(entries: &[(&str, &str)]) -> RunSource {
        let owned: Vec<Entry> = entries
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect();
        Box::new(owned.into_iter().map(Ok))
    }

    fn merged(runs: Vec<RunSource>, resolver: Arc<dyn MergeResolver>) -> Vec<(String, String)> {
        MergingRuns::new(runs, resolver)
            .unwrap()
            .map(|e| {
                let (k, v) = e.unwrap();
                (String::from_utf8(k).unwrap(), String::from_utf8(v).unwrap())
            })
            .collect()
    }

    fn s(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_merge_disjoint_runs() {
        let runs = vec![run(&[("a", "1"), ("d", "4")]), run(&[("b", "2"), ("c", "3")])];
        let out = merged(runs, Arc::new(KeepLatest));
        assert_eq!(out, vec![s("a", "1"), s("b", "2"), s("c", "3"), s("d", "4")]);
    }

    #[test]
    fn test_keep_latest_and_keep_first() {
        let runs = || vec![run(&[("a", "1"), ("b", "2")]), run(&[("a", "9")])];
        assert_eq!(merged(runs(), Arc::new(KeepLatest)), vec![s("a", "9"), s("b", "2")]);
        assert_eq!(merged(runs(), Arc::new(KeepFirst)), vec![s("a", "1"), s("b", "2")]);
    }

    #[test]
    fn test_three_way_collision_is_left_to_right() {
        // Run 0 holds two values for "k" (added first), runs 1 and 2 one each.
        let runs = vec![
            run(&[("k", "a"), ("k", "b")]),
            run(&[("k", "c"), ("z", "1")]),
            run(&[("k", "d")]),
        ];
        let calls = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = Arc::clone(&calls);
        let resolver = move |_key: &[u8], left: &[u8], right: &[u8]| {
            seen.lock().push((left.to_vec(), right.to_vec()));
            [b"(".as_slice(), left, b"+".as_slice(), right, b")".as_slice()].concat()
        };

        let out = merged(runs, Arc::new(resolver));
        assert_eq!(out, vec![s("k", "(((a+b)+c)+d)"), s("z", "1")]);
        assert_eq!(calls.lock().len(), 3);
    }

    #[test]
    fn test_merge_propagates_run_errors() {
        let failing: RunSource = Box::new(
            vec![
                Ok((b"a".to_vec(), b"1".to_vec())),
                Err(crate::Error::sort_failed("disk gone")),
            ]
            .into_iter(),
        );
        let mut merge = MergingRuns::new(vec![failing], Arc::new(KeepLatest)).unwrap();
        // Pulling the replacement for "a" fails.
        assert!(matches!(merge.next(), Some(Err(crate::Error::SortFailed(_)))));
    }
}
