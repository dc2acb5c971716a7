use std::cmp::Reverse;
use std::collections::BinaryHeap;

use fxhash::FxHashSet;

use super::Scheduler;
use crate::runtime::event::{EventKey, EventNode, EventUid};

/// Dead entries tolerated before a compaction pass, independent of size.
const COMPACTION_FLOOR: usize = 64;

///
/// A binary heap of pending events with lazy deletion.
///
/// [`remove`](Scheduler::remove) only records the uid in a dead set; the
/// entry is physically dropped when it surfaces at the heap top. To keep
/// cancel-heavy workloads from accumulating unbounded garbage, the heap is
/// rebuilt without dead entries once they outnumber the live ones (and
/// exceed a fixed floor).
///
pub(crate) struct HeapScheduler<A: 'static> {
    heap: BinaryHeap<Reverse<EventNode<A>>>,
    dead: FxHashSet<EventUid>,
}

impl<A: 'static> HeapScheduler<A> {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::with_capacity(64),
            dead: FxHashSet::default(),
        }
    }

    /// Drops dead entries sitting at the heap top.
    fn purge_front(&mut self) {
        while let Some(Reverse(front)) = self.heap.peek() {
            if self.dead.remove(&front.key.uid) {
                drop(self.heap.pop());
            } else {
                break;
            }
        }
    }

    fn maybe_compact(&mut self) {
        if self.dead.len() <= COMPACTION_FLOOR || self.dead.len() <= self.len() {
            return;
        }

        let dead = std::mem::take(&mut self.dead);
        let entries = std::mem::take(&mut self.heap).into_vec();
        self.heap = entries
            .into_iter()
            .filter(|Reverse(node)| !dead.contains(&node.key.uid))
            .collect();
    }
}

impl<A: 'static> Scheduler<A> for HeapScheduler<A> {
    fn insert(&mut self, node: EventNode<A>) {
        self.heap.push(Reverse(node));
    }

    fn peek_next(&mut self) -> Option<EventKey> {
        self.purge_front();
        self.heap.peek().map(|Reverse(node)| node.key)
    }

    fn remove_next(&mut self) -> Option<EventNode<A>> {
        self.purge_front();
        self.heap.pop().map(|Reverse(node)| node)
    }

    fn remove(&mut self, key: EventKey) -> bool {
        // The caller guarantees the key is present; a reverse index would
        // cost a swap-tracking pass on every sift for no extra information.
        self.dead.insert(key.uid);
        self.maybe_compact();
        true
    }

    fn len(&self) -> usize {
        self.heap.len() - self.dead.len()
    }

    fn descriptor(&self) -> &'static str {
        "heap"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{drain, node};
    use super::*;

    #[test]
    fn pops_in_key_order() {
        let mut s = HeapScheduler::new();
        s.insert(node(10.0, 1));
        s.insert(node(5.0, 2));
        s.insert(node(5.0, 3));
        s.insert(node(7.0, 4));

        assert_eq!(s.peek_next().unwrap().uid, 2);
        assert_eq!(drain(&mut s), vec![2, 3, 4, 1]);
    }

    #[test]
    fn lazy_removal_is_invisible() {
        let mut s = HeapScheduler::new();
        let victim = node(5.0, 2);
        let victim_key = victim.key;

        s.insert(node(10.0, 1));
        s.insert(victim);
        s.insert(node(1.0, 3));

        assert!(s.remove(victim_key));
        assert_eq!(s.len(), 2);
        assert_eq!(s.peek_next().unwrap().uid, 3);
        assert_eq!(drain(&mut s), vec![3, 1]);
    }

    #[test]
    fn compaction_bounds_garbage() {
        let mut s: HeapScheduler<()> = HeapScheduler::new();
        let mut keys = Vec::new();
        for uid in 1..=200 {
            let n = node(uid as f64, uid);
            keys.push(n.key);
            s.insert(n);
        }

        // Remove all but the last event; garbage must not survive compaction.
        for key in &keys[..199] {
            s.remove(*key);
        }
        assert_eq!(s.len(), 1);
        assert!(s.heap.len() < 199);
        assert_eq!(drain(&mut s), vec![200]);
    }
}
