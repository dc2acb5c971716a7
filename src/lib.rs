#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//!
//! A discrete event scheduling kernel for network simulations.
//!
//! At its core this crate provides a [`Runtime`](runtime::Runtime): an event
//! queue ordered by virtual time plus the dispatch loop driving it. Client
//! code schedules closures for a relative or absolute point of virtual time;
//! the runtime pops the earliest event, advances the clock exactly to its
//! expiry time and invokes it. Callbacks may schedule, cancel or remove
//! further events reentrantly, which makes the whole of a protocol model
//! expressible as chains of scheduled closures.
//!
//! # Scheduling events
//!
//! ```
//! use simcore::prelude::*;
//!
//! #[derive(Default)]
//! struct Pings {
//!     seen: usize,
//! }
//!
//! fn ping(rt: &mut Runtime<Pings>) {
//!     rt.app.seen += 1;
//!     if rt.app.seen < 3 {
//!         rt.schedule_in(Duration::from_secs(1), ping);
//!     }
//! }
//!
//! let mut rt = Builder::seeded(42).quiet().build(Pings::default());
//! rt.schedule_now(ping);
//! let summary = rt.run();
//!
//! assert_eq!(summary.time, SimTime::from(2.0));
//! assert_eq!(rt.destroy().seen, 3);
//! ```
//!
//! # Queue backends
//!
//! The pending event set can be backed by a sorted list, a binary heap or a
//! balanced map, selected once at construction via
//! [`Builder::scheduler`](runtime::Builder::scheduler). All backends are
//! behaviorally identical; they only trade off insert, pop and removal cost.
//! See [`SchedulerKind`](runtime::SchedulerKind).
//!
//! # Record and replay
//!
//! Built with [`Builder::replay_log`](runtime::Builder::replay_log), a
//! runtime records every queue mutation to a text file. The
//! [`runtime::Replay`] driver re-executes such a log against a fresh runtime
//! with any backend, validating that dispatch times reproduce exactly. This
//! is the primary tool for cross-checking backends and for benchmarking
//! them on real recorded workloads.
//!

pub mod logger;
pub mod prelude;
pub mod runtime;
pub mod time;
