use crate::time::SimTime;
use std::cell::Cell;
use std::cmp;
use std::fmt::Debug;
use std::rc::Rc;

use super::Runtime;

///
/// A runtime unique identifier for an event.
///
/// Uids are handed out in schedule order, so they double as the FIFO
/// tie-break between events expiring at the same simulation time.
/// Uid `0` is reserved for the external actor, i.e. scheduling calls made
/// outside of any event callback.
///
pub type EventUid = u64;

/// The uid attributed to scheduling decisions made outside of any
/// event callback.
pub const EXTERNAL_UID: EventUid = 0;

///
/// The position of an event in the global dispatch order.
///
/// Keys order lexicographically on `(time, uid)`. Since uids are unique,
/// no two distinct events ever compare equal.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    /// The absolute expiry time of the event.
    pub time: SimTime,
    /// The schedule-order uid, breaking ties between equal-time events.
    pub uid: EventUid,
}

///
/// The lifecycle state of a scheduled event.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    /// The event sits in the queue and will be dispatched at its expiry time.
    Pending,
    /// The event was cancelled; its callback will never run.
    Cancelled,
    /// The event was dispatched, or dropped while draining the runtime.
    Expired,
}

/// The state cell shared between all handles to one event and the
/// queue entry itself.
#[derive(Debug)]
pub(crate) struct EventSlot {
    key: EventKey,
    state: Cell<EventState>,
}

///
/// A reference counted, cancellable handle to a scheduled event.
///
/// Handles are cheap to clone; all clones refer to the same underlying
/// event. Dropping every handle does not affect the event, the queue
/// keeps its own reference until dispatch or removal.
///
#[derive(Debug, Clone)]
pub struct EventHandle {
    slot: Rc<EventSlot>,
}

impl EventHandle {
    pub(crate) fn new(key: EventKey) -> Self {
        Self {
            slot: Rc::new(EventSlot {
                key,
                state: Cell::new(EventState::Pending),
            }),
        }
    }

    /// The uid of the referenced event.
    #[must_use]
    pub fn uid(&self) -> EventUid {
        self.slot.key.uid
    }

    /// The absolute expiry time of the referenced event.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.slot.key.time
    }

    pub(crate) fn key(&self) -> EventKey {
        self.slot.key
    }

    /// The current lifecycle state of the referenced event.
    #[must_use]
    pub fn state(&self) -> EventState {
        self.slot.state.get()
    }

    /// Cancels the event.
    ///
    /// This is an O(1) flag flip: once cancelled the callback body will never
    /// execute, even if the event is already due or mid-extraction from the
    /// queue. The queue entry itself is collected lazily when the queue next
    /// touches it. Cancelling an expired or already cancelled event is a
    /// no-op.
    pub fn cancel(&self) {
        if self.slot.state.get() == EventState::Pending {
            self.slot.state.set(EventState::Cancelled);
        }
    }

    /// Whether the event still sits in the queue awaiting dispatch.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.state.get() == EventState::Pending
    }

    /// Whether the event will never fire anymore, either because it already
    /// ran, because it was cancelled, or because the runtime drained it.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        !self.is_pending()
    }

    /// Marks the event as consumed. Cancelled events keep their state.
    pub(crate) fn mark_expired(&self) {
        if self.slot.state.get() == EventState::Pending {
            self.slot.state.set(EventState::Expired);
        }
    }
}

/// The type erased deferred callback bound at schedule time.
pub(crate) type EventFn<A> = Box<dyn FnOnce(&mut Runtime<A>)>;

///
/// A queue entry: the dispatch key, the state slot shared with all
/// caller-held handles, and the callback itself.
///
pub(crate) struct EventNode<A: 'static> {
    pub(crate) key: EventKey,
    pub(crate) handle: EventHandle,
    event: EventFn<A>,
}

impl<A: 'static> EventNode<A> {
    pub(crate) fn new(key: EventKey, handle: EventHandle, event: EventFn<A>) -> Self {
        Self { key, handle, event }
    }

    /// Consumes the node and invokes the callback.
    ///
    /// Callers must have extracted the node from the queue beforehand, the
    /// callback is free to mutate the queue reentrantly.
    pub(crate) fn invoke(self, rt: &mut Runtime<A>) {
        (self.event)(rt);
    }
}

impl<A: 'static> cmp::PartialEq for EventNode<A> {
    fn eq(&self, other: &Self) -> bool {
        self.key.uid == other.key.uid
    }
}

impl<A: 'static> cmp::Eq for EventNode<A> {}

impl<A: 'static> cmp::PartialOrd for EventNode<A> {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<A: 'static> cmp::Ord for EventNode<A> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl<A: 'static> Debug for EventNode<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EventNode {{ uid: {} time: {} state: {:?} }}",
            self.key.uid,
            self.key.time,
            self.handle.state()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(time: f64, uid: EventUid) -> EventKey {
        EventKey {
            time: SimTime::from(time),
            uid,
        }
    }

    #[test]
    fn key_order_is_time_then_uid() {
        assert!(key(1.0, 7) < key(2.0, 1));
        assert!(key(2.0, 1) < key(2.0, 2));
        assert!(key(2.0, 2) == key(2.0, 2));
    }

    #[test]
    fn cancel_is_permanent_and_idempotent() {
        let handle = EventHandle::new(key(1.0, 1));
        assert!(handle.is_pending());

        handle.cancel();
        assert_eq!(handle.state(), EventState::Cancelled);

        handle.cancel();
        handle.mark_expired();
        assert_eq!(handle.state(), EventState::Cancelled);
        assert!(handle.is_expired());
    }

    #[test]
    fn clones_share_state() {
        let handle = EventHandle::new(key(1.0, 1));
        let clone = handle.clone();
        clone.cancel();
        assert!(handle.is_expired());
        assert_eq!(handle.uid(), clone.uid());
    }

    #[test]
    fn expiry_via_dispatch() {
        let handle = EventHandle::new(key(1.0, 1));
        handle.mark_expired();
        assert_eq!(handle.state(), EventState::Expired);

        // too late to cancel
        handle.cancel();
        assert_eq!(handle.state(), EventState::Expired);
    }
}
