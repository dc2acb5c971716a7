use std::collections::VecDeque;

use super::Scheduler;
use crate::runtime::event::{EventKey, EventNode};

///
/// A sorted list of pending events.
///
/// Inserts scan for their slot from the back, since most workloads schedule
/// later than everything already queued. Pop is a O(1) `pop_front`.
///
pub(crate) struct ListScheduler<A: 'static> {
    events: VecDeque<EventNode<A>>,
}

impl<A: 'static> ListScheduler<A> {
    pub(crate) fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(64),
        }
    }
}

impl<A: 'static> Scheduler<A> for ListScheduler<A> {
    fn insert(&mut self, node: EventNode<A>) {
        let mut idx = self.events.len();
        while idx > 0 && self.events[idx - 1].key > node.key {
            idx -= 1;
        }
        self.events.insert(idx, node);
    }

    fn peek_next(&mut self) -> Option<EventKey> {
        self.events.front().map(|node| node.key)
    }

    fn remove_next(&mut self) -> Option<EventNode<A>> {
        self.events.pop_front()
    }

    fn remove(&mut self, key: EventKey) -> bool {
        match self.events.iter().position(|node| node.key == key) {
            Some(idx) => {
                self.events.remove(idx);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn descriptor(&self) -> &'static str {
        "list"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{drain, node};
    use super::*;

    #[test]
    fn pops_in_key_order() {
        let mut s = ListScheduler::new();
        s.insert(node(10.0, 1));
        s.insert(node(5.0, 2));
        s.insert(node(5.0, 3));
        s.insert(node(7.0, 4));

        assert_eq!(s.peek_next().unwrap().uid, 2);
        assert_eq!(drain(&mut s), vec![2, 3, 4, 1]);
    }

    #[test]
    fn removes_by_key() {
        let mut s = ListScheduler::new();
        let victim = node(5.0, 2);
        let victim_key = victim.key;

        s.insert(node(10.0, 1));
        s.insert(victim);
        s.insert(node(1.0, 3));

        assert!(s.remove(victim_key));
        assert!(!s.remove(victim_key));
        assert_eq!(s.len(), 2);
        assert_eq!(drain(&mut s), vec![3, 1]);
    }
}
