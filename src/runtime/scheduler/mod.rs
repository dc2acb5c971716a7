//!
//! Interchangeable event queue implementations.
//!
//! All backends maintain the set of pending events totally ordered by
//! [`EventKey`] and must be behaviorally identical from the runtime's point
//! of view: same dispatch order, same set of invoked callbacks. They differ
//! only in their performance profile.
//!

use super::event::{EventKey, EventNode};

mod heap;
mod list;
mod map;

pub(crate) use heap::HeapScheduler;
pub(crate) use list::ListScheduler;
pub(crate) use map::MapScheduler;

///
/// The ordered set of pending events backing a runtime.
///
/// Mutation methods must be safe to call while the runtime is dispatching
/// an event: the dispatched node has already been extracted via
/// [`remove_next`](Scheduler::remove_next) when its callback runs, so
/// reentrant inserts and removals cannot touch it.
///
pub(crate) trait Scheduler<A: 'static> {
    /// Inserts a new pending event.
    ///
    /// Keys are unique by construction; inserting a duplicate key is an
    /// internal invariant violation.
    fn insert(&mut self, node: EventNode<A>);

    /// The key of the earliest pending event, without removing it.
    fn peek_next(&mut self) -> Option<EventKey>;

    /// Extracts the earliest pending event. `None` is the normal
    /// "nothing left to do" signal, not an error.
    fn remove_next(&mut self) -> Option<EventNode<A>>;

    /// Excises the event with the given key, returning whether it was
    /// found. Physical removal may be deferred, but a removed event is
    /// never yielded by [`remove_next`](Scheduler::remove_next) again.
    fn remove(&mut self, key: EventKey) -> bool;

    /// The number of live pending events.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn descriptor(&self) -> &'static str;
}

///
/// Selects the event queue implementation used by a runtime.
///
/// The backend is fixed at construction time via
/// [`Builder::scheduler`](crate::runtime::Builder::scheduler); there is no
/// way to switch it mid-run.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerKind {
    /// A sorted list. O(n) insert, O(1) peek/pop. Fastest for small or
    /// heavily front-loaded event sets.
    List,
    /// A binary heap with lazy deletion. O(log n) insert/pop, O(1) remove
    /// plus amortized compaction. The default.
    #[default]
    Heap,
    /// A balanced map with eager removal by key. O(log n) everywhere, with
    /// higher constant factors but no deferred cleanup.
    Map,
}

impl SchedulerKind {
    pub(crate) fn instantiate<A: 'static>(self) -> Box<dyn Scheduler<A>> {
        match self {
            SchedulerKind::List => Box::new(ListScheduler::new()),
            SchedulerKind::Heap => Box::new(HeapScheduler::new()),
            SchedulerKind::Map => Box::new(MapScheduler::new()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::runtime::event::{EventHandle, EventUid};
    use crate::time::SimTime;

    /// A no-op node for direct backend tests.
    pub(crate) fn node(time: f64, uid: EventUid) -> EventNode<()> {
        let key = EventKey {
            time: SimTime::from(time),
            uid,
        };
        EventNode::new(key, EventHandle::new(key), Box::new(|_| {}))
    }

    /// Drains the backend, returning the uids in pop order.
    pub(crate) fn drain(s: &mut dyn Scheduler<()>) -> Vec<EventUid> {
        let mut uids = Vec::new();
        while let Some(node) = s.remove_next() {
            uids.push(node.key.uid);
        }
        uids
    }
}
