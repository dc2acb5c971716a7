use std::collections::BTreeMap;

use super::Scheduler;
use crate::runtime::event::{EventKey, EventNode};

///
/// A balanced map of pending events.
///
/// Since an event's key is carried by its handle, removal is a direct
/// O(log n) erase with no deferred cleanup, which makes this the simplest
/// backend to reason about under cancel-heavy workloads.
///
pub(crate) struct MapScheduler<A: 'static> {
    events: BTreeMap<EventKey, EventNode<A>>,
}

impl<A: 'static> MapScheduler<A> {
    pub(crate) fn new() -> Self {
        Self {
            events: BTreeMap::new(),
        }
    }
}

impl<A: 'static> Scheduler<A> for MapScheduler<A> {
    fn insert(&mut self, node: EventNode<A>) {
        let prev = self.events.insert(node.key, node);
        debug_assert!(prev.is_none(), "duplicate event key inserted");
    }

    fn peek_next(&mut self) -> Option<EventKey> {
        self.events.keys().next().copied()
    }

    fn remove_next(&mut self) -> Option<EventNode<A>> {
        self.events.pop_first().map(|(_, node)| node)
    }

    fn remove(&mut self, key: EventKey) -> bool {
        self.events.remove(&key).is_some()
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn descriptor(&self) -> &'static str {
        "map"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{drain, node};
    use super::*;

    #[test]
    fn pops_in_key_order() {
        let mut s = MapScheduler::new();
        s.insert(node(10.0, 1));
        s.insert(node(5.0, 2));
        s.insert(node(5.0, 3));
        s.insert(node(7.0, 4));

        assert_eq!(s.peek_next().unwrap().uid, 2);
        assert_eq!(drain(&mut s), vec![2, 3, 4, 1]);
    }

    #[test]
    fn removal_is_eager() {
        let mut s = MapScheduler::new();
        let victim = node(5.0, 2);
        let victim_key = victim.key;

        s.insert(node(10.0, 1));
        s.insert(victim);

        assert!(s.remove(victim_key));
        assert!(!s.remove(victim_key));
        assert_eq!(s.len(), 1);
        assert_eq!(drain(&mut s), vec![1]);
    }
}
