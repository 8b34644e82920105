use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use super::assembly::SuperBB;

/// Wrapper giving [`SuperBB`] the total search order required by the
/// eviction heaps.
#[derive(Debug, Clone)]
pub struct Ranked(pub Arc<SuperBB>);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.0.search_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.search_cmp(&other.0)
    }
}

/// Fixed-capacity best-K heap.
///
/// Inserts beyond capacity evict the current minimum under the total
/// `(score, trans_used_count, identity, placements)` order, which makes
/// the retained set independent of insertion order.
#[derive(Debug, Clone)]
pub struct BestK {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl BestK {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts unless the heap is full and the candidate ranks at or
    /// below the current minimum. Returns whether it was kept.
    pub fn insert(&mut self, assembly: Arc<SuperBB>) -> bool {
        let candidate = Ranked(assembly);
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(candidate));
            return true;
        }

        let worst = self
            .heap
            .peek()
            .map(|Reverse(w)| candidate.cmp(w))
            .unwrap_or(Ordering::Greater);
        if worst == Ordering::Greater {
            self.heap.pop();
            self.heap.push(Reverse(candidate));
            true
        } else {
            false
        }
    }

    /// Contents best-first.
    pub fn into_sorted(self) -> Vec<Arc<SuperBB>> {
        let mut items: Vec<Arc<SuperBB>> =
            self.heap.into_iter().map(|Reverse(r)| r.0).collect();
        items.sort_by(|a, b| b.search_cmp(a));
        items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SuperBB>> {
        self.heap.iter().map(|Reverse(r)| &r.0)
    }
}
