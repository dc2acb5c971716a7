use std::{
    fmt::Debug,
    path::PathBuf,
    sync::{Mutex, PoisonError, TryLockError},
};

use rand::{rngs::StdRng, RngCore, SeedableRng};

use crate::time::SimTime;

use super::{
    replay::EventLog, Runtime, RuntimeLimit, SchedulerKind, State, EXTERNAL_UID, RNG,
};

/// A lock that ensures only one runtime exists at a time, since the
/// virtual clock and the RNG are process-wide.
static SIMULATION_LOCK: Mutex<()> = Mutex::new(());

/// A builder for a runtime instance.
///
/// All configuration happens here, before any event is scheduled: the
/// queue backend, the RNG seed, run limits and the optional replay log.
#[must_use]
pub struct Builder {
    pub(super) quiet: bool,
    pub(super) rng: Box<dyn RngCore>,
    pub(super) limit: RuntimeLimit,
    pub(super) start_time: SimTime,
    pub(super) scheduler: SchedulerKind,
    pub(super) replay_log: Option<PathBuf>,
}

impl Builder {
    /// Creates a new unconfigured builder with an entropy-seeded RNG.
    pub fn new() -> Builder {
        Builder {
            quiet: false,
            rng: Box::new(StdRng::from_entropy()),
            limit: RuntimeLimit::None,
            start_time: SimTime::MIN,
            scheduler: SchedulerKind::default(),
            replay_log: None,
        }
    }

    /// Creates a `Builder` with a statically seeded RNG, for
    /// reproducible runs.
    pub fn seeded(seed: u64) -> Builder {
        Builder {
            rng: Box::new(StdRng::seed_from_u64(seed)),
            ..Builder::new()
        }
    }

    ///
    /// Suppresses runtime messages from the simulation framework.
    ///
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    ///
    /// Sets the simulation time at which the runtime starts.
    ///
    pub fn start_time(mut self, time: SimTime) -> Self {
        self.start_time = time;
        self
    }

    ///
    /// Bounds the number of events the runtime will dispatch.
    ///
    pub fn max_itr(mut self, max_itr: usize) -> Self {
        self.limit.add(RuntimeLimit::EventCount(max_itr));
        self
    }

    ///
    /// Bounds the simulation time the runtime will reach (default: inf).
    ///
    pub fn max_time(mut self, max_time: SimTime) -> Self {
        self.limit.add(RuntimeLimit::SimTime(max_time));
        self
    }

    ///
    /// Adds a custom limit to the end of the runtime, combined with
    /// any `max_itr` and `max_time` options via logical OR.
    ///
    pub fn limit(mut self, limit: RuntimeLimit) -> Self {
        self.limit.add(limit);
        self
    }

    ///
    /// Selects the event queue backend. This is the only place the backend
    /// can be chosen; it cannot change once the runtime exists.
    ///
    pub fn scheduler(mut self, kind: SchedulerKind) -> Self {
        self.scheduler = kind;
        self
    }

    ///
    /// Records every queue insert and remove to the given file, in the
    /// format consumed by [`ReplayTrace`](crate::runtime::ReplayTrace).
    ///
    pub fn replay_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.replay_log = Some(path.into());
        self
    }

    ///
    /// Builds a new [`Runtime`] instance around the given client state.
    ///
    /// Blocks until any previously built runtime has been dropped or
    /// destroyed, then resets the virtual clock to the configured start
    /// time and installs the configured RNG.
    ///
    /// # Panics
    ///
    /// Panics if a configured replay log file cannot be created.
    ///
    pub fn build<A: 'static>(self, app: A) -> Runtime<A> {
        let permit = match SIMULATION_LOCK.try_lock() {
            Ok(permit) => permit,
            Err(TryLockError::WouldBlock) => {
                eprintln!(
                    "simcore::warning ** another runtime already exists ... waiting for simlock"
                );
                SIMULATION_LOCK
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
            }
            Err(TryLockError::Poisoned(poison)) => poison.into_inner(),
        };

        let log = self.replay_log.map(|path| {
            EventLog::create(&path).expect("failed to create replay log file")
        });

        SimTime::set_now(self.start_time);
        *unsafe { &mut *RNG.get() } = Some(self.rng);

        Runtime {
            app,
            state: State::Idle,
            scheduler: self.scheduler.instantiate(),
            limit: self.limit,
            stop_requested: false,
            next_uid: EXTERNAL_UID + 1,
            current_uid: EXTERNAL_UID,
            itr: 0,
            destroy_queue: Vec::new(),
            log,
            quiet: self.quiet,
            permit,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("scheduler", &self.scheduler)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}
