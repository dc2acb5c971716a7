//!
//! Central primitives for running a discrete event simulation.
//!

use crate::time::{Duration, SimTime};
use rand::{
    distributions::{Distribution, Standard},
    Rng, RngCore,
};
use std::{
    any::type_name,
    cell::UnsafeCell,
    fmt::{Debug, Display},
    mem,
    sync::MutexGuard,
};

mod builder;
pub use self::builder::*;

mod event;
pub use self::event::{EventHandle, EventKey, EventState, EventUid, EXTERNAL_UID};
pub(crate) use self::event::{EventFn, EventNode};

mod limit;
pub use self::limit::*;

mod replay;
pub use self::replay::{Replay, ReplayError, ReplayOp, ReplayRecord, ReplayReport, ReplayTrace};
pub(crate) use self::replay::EventLog;

mod scheduler;
pub use self::scheduler::SchedulerKind;
pub(crate) use self::scheduler::Scheduler;

/// Interior mutable global. Access is serialized externally by the
/// simulation lock, only one runtime exists at a time.
pub(crate) struct SyncWrap<T> {
    inner: UnsafeCell<T>,
}

unsafe impl<T> Sync for SyncWrap<T> {}

impl<T> SyncWrap<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self {
            inner: UnsafeCell::new(value),
        }
    }

    pub(crate) fn get(&self) -> *mut T {
        self.inner.get()
    }
}

pub(crate) static RNG: SyncWrap<Option<Box<dyn RngCore>>> = SyncWrap::new(None);

///
/// Returns a reference to the simulation RNG.
///
/// # Panics
///
/// This function panics if the RNG has not been initialized.
/// This is done once a [`Runtime`] is built.
///
#[must_use]
pub fn rng() -> &'static mut dyn RngCore {
    let rng = unsafe { &mut *RNG.get() }
        .as_mut()
        .expect("RNG not yet initialized");
    &mut **rng
}

///
/// Generates a random instance of type T with a Standard distribution.
///
#[must_use]
pub fn random<T>() -> T
where
    Standard: Distribution<T>,
{
    rng().gen::<T>()
}

///
/// Generates a random instance of type T with a distribution
/// of type D.
///
pub fn sample<T, D>(distr: D) -> T
where
    D: Distribution<T>,
{
    rng().sample::<T, D>(distr)
}

///
/// The central management point for an instance of a discrete event
/// based simulation.
///
/// A runtime owns the event queue and the virtual clock. Client code
/// schedules closures against it; [`run`](Runtime::run) then pops the
/// earliest event, advances the clock to its expiry time and invokes it,
/// until the queue drains or a limit applies. Callbacks receive
/// `&mut Runtime<A>` and may schedule, remove or stop reentrantly.
///
/// The generic parameter `A` is the client's own state. It is stored as
/// the public field `app` and is freely accessible from within callbacks.
///
/// # Examples
///
/// ```
/// use simcore::prelude::*;
///
/// let mut rt = Builder::seeded(1).quiet().build(Vec::new());
/// rt.schedule_in(Duration::from_secs(10), |rt: &mut Runtime<Vec<&str>>| {
///     rt.app.push("a");
/// });
/// rt.schedule_in(Duration::from_secs(5), |rt: &mut Runtime<Vec<&str>>| {
///     rt.app.push("b");
///     rt.schedule_now(|rt: &mut Runtime<Vec<&str>>| rt.app.push("c"));
/// });
///
/// let summary = rt.run();
/// assert_eq!(summary.time, SimTime::from(10.0));
/// assert_eq!(summary.event_count, 3);
/// assert_eq!(rt.destroy(), ["b", "c", "a"]);
/// ```
pub struct Runtime<A: 'static> {
    /// The client state of the simulation.
    pub app: A,

    state: State,
    scheduler: Box<dyn Scheduler<A>>,
    limit: RuntimeLimit,
    stop_requested: bool,

    next_uid: EventUid,
    current_uid: EventUid,
    itr: usize,

    destroy_queue: Vec<EventNode<A>>,
    log: Option<EventLog>,

    quiet: bool,

    #[allow(dead_code)]
    permit: MutexGuard<'static, ()>,
}

#[derive(Debug, PartialEq, Eq)]
enum State {
    Idle,
    Running,
}

/// The cause that made [`Runtime::run`] return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The event queue is empty.
    Drained,
    /// A [`RuntimeLimit`] applied to the next pending event.
    LimitReached,
    /// [`Runtime::stop`] was called from within a callback.
    Stopped,
}

/// The result of a completed [`Runtime::run`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// The virtual time at which the dispatch loop returned.
    pub time: SimTime,
    /// The total number of events this runtime has dispatched so far.
    pub event_count: usize,
    /// Why the loop returned.
    pub reason: StopReason,
}

enum Dispatch {
    Continue,
    Break(StopReason),
}

impl<A: 'static> Runtime<A> {
    ///
    /// Creates a runtime with default options.
    /// Use a [`Builder`] to pick the queue backend, a RNG seed or limits.
    ///
    pub fn new(app: A) -> Self {
        Builder::new().build(app)
    }

    /// Returns the number of events that were scheduled on this
    /// runtime instance.
    #[must_use]
    pub fn num_events_scheduled(&self) -> usize {
        (self.next_uid - 1) as usize
    }

    /// Returns the number of events that were dispatched on this
    /// runtime instance.
    #[must_use]
    pub fn num_events_dispatched(&self) -> usize {
        self.itr
    }

    /// Returns the number of events awaiting dispatch.
    #[must_use]
    pub fn num_events_pending(&self) -> usize {
        self.scheduler.len()
    }

    /// Returns the current simulation time.
    #[allow(clippy::unused_self)]
    #[must_use]
    pub fn sim_time(&self) -> SimTime {
        SimTime::now()
    }

    /// Returns a random instance of type T.
    #[allow(clippy::unused_self)]
    pub fn random<T>(&mut self) -> T
    where
        Standard: Distribution<T>,
    {
        self::random()
    }

    /// Samples the given distribution.
    #[allow(clippy::unused_self)]
    pub fn rng_sample<T, D>(&mut self, distr: D) -> T
    where
        D: Distribution<T>,
    {
        self::sample(distr)
    }

    fn alloc_uid(&mut self) -> EventUid {
        let uid = self.next_uid;
        self.next_uid += 1;
        uid
    }

    ///
    /// Schedules a callback for execution at the given absolute time.
    ///
    /// Returns a handle that can be used to cancel or remove the event.
    /// Same-time events execute in schedule order.
    ///
    /// # Panics
    ///
    /// Panics if `time` lies before the current simulation time. Scheduling
    /// into the past is a bug in client code, not a recoverable condition.
    ///
    pub fn schedule_at(
        &mut self,
        time: SimTime,
        f: impl FnOnce(&mut Runtime<A>) + 'static,
    ) -> EventHandle {
        let now = SimTime::now();
        assert!(
            time >= now,
            "cannot schedule an event at {time}, which lies before now ({now})"
        );

        let key = EventKey {
            time,
            uid: self.alloc_uid(),
        };
        let handle = EventHandle::new(key);

        if let Some(log) = self.log.as_mut() {
            log.insert(self.current_uid, now, key);
        }
        tracing::trace!(uid = key.uid, time = %key.time, "scheduled event");

        self.scheduler
            .insert(EventNode::new(key, handle.clone(), Box::new(f)));
        handle
    }

    ///
    /// Schedules a callback for execution `delay` time units from now.
    ///
    pub fn schedule_in(
        &mut self,
        delay: Duration,
        f: impl FnOnce(&mut Runtime<A>) + 'static,
    ) -> EventHandle {
        self.schedule_at(SimTime::now() + delay, f)
    }

    ///
    /// Schedules a callback for execution at the current simulation time.
    ///
    /// The new event runs after all already queued same-time events and,
    /// when called from within a callback, strictly after that callback
    /// returns. This is the cooperative yield point of the simulation.
    ///
    pub fn schedule_now(&mut self, f: impl FnOnce(&mut Runtime<A>) + 'static) -> EventHandle {
        self.schedule_at(SimTime::now(), f)
    }

    ///
    /// Registers a callback to run when the runtime is destroyed.
    ///
    /// Destroy-time callbacks never run during [`run`](Runtime::run); they
    /// execute in registration order inside [`destroy`](Runtime::destroy).
    ///
    pub fn schedule_destroy(&mut self, f: impl FnOnce(&mut Runtime<A>) + 'static) -> EventHandle {
        let key = EventKey {
            time: SimTime::now(),
            uid: self.alloc_uid(),
        };
        let handle = EventHandle::new(key);
        self.destroy_queue
            .push(EventNode::new(key, handle.clone(), Box::new(f)));
        handle
    }

    ///
    /// Physically excises a still-pending event from the queue.
    ///
    /// The cost depends on the backend, see [`SchedulerKind`]. Removing an
    /// event that already executed or was cancelled is a no-op; so is
    /// removing the same handle twice.
    ///
    pub fn remove(&mut self, handle: &EventHandle) {
        if !handle.is_pending() {
            return;
        }

        // Destroy-time events are queued aside, not in the scheduler.
        if let Some(idx) = self
            .destroy_queue
            .iter()
            .position(|node| node.key.uid == handle.uid())
        {
            self.destroy_queue.remove(idx);
            handle.cancel();
            return;
        }

        handle.cancel();
        let found = self.scheduler.remove(handle.key());
        debug_assert!(found, "pending event missing from the event queue");

        if let Some(log) = self.log.as_mut() {
            log.remove(self.current_uid, SimTime::now(), handle.key());
        }
        tracing::trace!(uid = handle.uid(), "removed event");
    }

    ///
    /// Requests the dispatch loop to return after the current event.
    ///
    /// Pending events stay queued; a later [`run`](Runtime::run) call
    /// resumes where the loop left off.
    ///
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    ///
    /// Requests the dispatch loop to return once the next pending event
    /// lies beyond the given time. Events exactly at `time` still execute.
    ///
    pub fn stop_at(&mut self, time: SimTime) {
        self.limit.add(RuntimeLimit::SimTime(time));
    }

    ///
    /// Runs the dispatch loop until the queue drains, a limit applies or
    /// [`stop`](Runtime::stop) is requested.
    ///
    /// Running a runtime with zero scheduled events returns immediately
    /// without advancing the virtual clock; an empty queue is the normal
    /// termination signal, not an error.
    ///
    /// # Panics
    ///
    /// Panics when called reentrantly from within an event callback.
    ///
    pub fn run(&mut self) -> RunSummary {
        assert_eq!(
            self.state,
            State::Idle,
            "Runtime::run cannot be called from within an event callback"
        );
        self.state = State::Running;

        if !self.quiet && self.itr == 0 {
            println!("Simulation starting");
            println!("  executor := {}", self.scheduler.descriptor());
            println!("  limit := {}", self.limit);
        }

        let reason = loop {
            if self.stop_requested {
                self.stop_requested = false;
                break StopReason::Stopped;
            }
            match self.dispatch_event() {
                Dispatch::Continue => {}
                Dispatch::Break(reason) => break reason,
            }
        };

        self.state = State::Idle;

        let summary = RunSummary {
            time: SimTime::now(),
            event_count: self.itr,
            reason,
        };

        if !self.quiet && reason == StopReason::Drained {
            println!(
                "Simulation ended at event #{} after {}",
                self.itr,
                SimTime::now()
            );
        }

        summary
    }

    /// Processes the next event in the queue by calling its handler.
    ///
    /// The node is fully extracted before its callback runs, so the
    /// callback may freely mutate the queue, including removing itself
    /// (a no-op) or scheduling at the current time.
    fn dispatch_event(&mut self) -> Dispatch {
        let Some(key) = self.scheduler.peek_next() else {
            return Dispatch::Break(StopReason::Drained);
        };

        if self.limit.applies(self.itr + 1, key.time) {
            return Dispatch::Break(StopReason::LimitReached);
        }

        let Some(node) = self.scheduler.remove_next() else {
            return Dispatch::Break(StopReason::Drained);
        };

        debug_assert!(
            node.key.time >= SimTime::now(),
            "event queue yielded an event expiring before now"
        );

        // The only place where the virtual clock advances.
        SimTime::set_now(node.key.time);

        // Cancelled events still consume their queue slot, but their
        // callback body never runs.
        if node.handle.is_pending() {
            self.itr += 1;
            node.handle.mark_expired();

            let prev_actor = mem::replace(&mut self.current_uid, node.key.uid);
            tracing::trace!(uid = node.key.uid, time = %node.key.time, "dispatching event");
            node.invoke(self);
            self.current_uid = prev_actor;
        }

        Dispatch::Continue
    }

    /// Executes the next `n` events in the queue.
    ///
    /// # Panics
    ///
    /// Panics when called reentrantly from within an event callback.
    pub fn dispatch_n_events(&mut self, n: usize) -> RunSummary {
        let mut limit = RuntimeLimit::EventCount(self.itr + n);
        mem::swap(&mut self.limit, &mut limit);
        let summary = self.run();
        self.limit = limit;
        summary
    }

    /// Executes events until the runtime reaches the designated time.
    ///
    /// # Panics
    ///
    /// Panics when called reentrantly from within an event callback.
    pub fn dispatch_events_until(&mut self, time: SimTime) -> RunSummary {
        let mut limit = RuntimeLimit::SimTime(time);
        mem::swap(&mut self.limit, &mut limit);
        let summary = self.run();
        self.limit = limit;
        summary
    }

    ///
    /// Tears the simulation down and returns the client state.
    ///
    /// All still-pending events are drained and dropped without executing;
    /// destroy-time callbacks registered via
    /// [`schedule_destroy`](Runtime::schedule_destroy) then run in
    /// registration order. Finally the virtual clock resets to zero, so a
    /// fresh runtime can be built afterwards.
    ///
    pub fn destroy(mut self) -> A {
        tracing::debug!(pending = self.scheduler.len(), "destroying runtime");

        while let Some(node) = self.scheduler.remove_next() {
            node.handle.mark_expired();
        }

        // Destroy handlers may register further destroy handlers.
        while !self.destroy_queue.is_empty() {
            let queue = mem::take(&mut self.destroy_queue);
            for node in queue {
                if node.handle.is_pending() {
                    node.handle.mark_expired();
                    let prev_actor = mem::replace(&mut self.current_uid, node.key.uid);
                    node.invoke(&mut self);
                    self.current_uid = prev_actor;
                }
            }
        }

        // Regular events scheduled by destroy handlers are dropped as well.
        while let Some(node) = self.scheduler.remove_next() {
            node.handle.mark_expired();
        }

        SimTime::set_now(SimTime::ZERO);
        self.app
    }
}

impl<A: 'static> Debug for Runtime<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Runtime<{}> {{ sim_time: {} scheduler: {} ({}/{} limit {}) pending: {} }}",
            type_name::<A>(),
            self.sim_time(),
            self.scheduler.descriptor(),
            self.num_events_dispatched(),
            self.num_events_scheduled(),
            self.limit,
            self.scheduler.len()
        )
    }
}

impl<A: 'static> Display for Runtime<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}
