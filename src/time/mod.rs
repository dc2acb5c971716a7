//!
//! Temporal quantification in a simulation context.
//!
//! A [`SimTime`] is a point on the simulation timeline, measured as a
//! [`Duration`] since simulation start. It is entirely unrelated to wall-clock
//! time: the current value only moves when the runtime dispatches an event.
//!
//! # Examples
//!
//! ```rust
//! # use simcore::time::*;
//! let t = SimTime::from_duration(Duration::from_millis(1500));
//! assert_eq!(t, SimTime::from(1.5));
//! assert_eq!(t + Duration::from_millis(500), SimTime::from(2.0));
//! ```

mod duration;
pub use duration::*;

use std::fmt::{Debug, Display};
use std::ops::{Deref, Div, Sub, SubAssign};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

static SIMTIME: (AtomicU64, AtomicU32) = (AtomicU64::new(0), AtomicU32::new(0));

///
/// A specific point of time in the simulation.
///
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SimTime(Duration);

impl SimTime {
    /// The smallest instance of a [`SimTime`].
    pub const ZERO: SimTime = SimTime(Duration::ZERO);
    /// The smallest valid instance of a [`SimTime`].
    pub const MIN: SimTime = SimTime(Duration::ZERO);
    /// The greatest instance of a [`SimTime`].
    pub const MAX: SimTime = SimTime(Duration::MAX);

    /// Returns an instant corresponding to "now" in the simulation context.
    ///
    /// Only the runtime's dispatch loop advances this value.
    #[must_use]
    pub fn now() -> Self {
        SimTime(Duration::new(
            SIMTIME.0.load(Ordering::SeqCst),
            SIMTIME.1.load(Ordering::SeqCst),
        ))
    }

    /// Sets the global simulation time.
    ///
    /// Only called from the dispatch loop and from runtime setup/teardown.
    pub(crate) fn set_now(time: SimTime) {
        SIMTIME.0.store(time.as_secs(), Ordering::SeqCst);
        SIMTIME.1.store(time.subsec_nanos(), Ordering::SeqCst);
    }

    /// Constructs an instance of `SimTime` from a given duration since
    /// `SimTime::ZERO`.
    #[must_use]
    pub const fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    /// Constructs an instance of `SimTime` from a count of microseconds
    /// since `SimTime::ZERO`.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(Duration::from_micros(micros))
    }

    /// Returns the amount of time elapsed from another instant to this one.
    ///
    /// # Panics
    ///
    /// Panics if `earlier` is later than `self`.
    #[must_use]
    pub fn duration_since(&self, earlier: SimTime) -> Duration {
        self.checked_duration_since(earlier)
            .expect("supplied instant is later than self")
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or `None` if that instant is later than this one.
    #[must_use]
    pub fn checked_duration_since(&self, earlier: SimTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or a zero duration if that instant is later than this one.
    #[must_use]
    pub fn saturating_duration_since(&self, earlier: SimTime) -> Duration {
        self.checked_duration_since(earlier).unwrap_or_default()
    }

    /// Returns `Some(t)` where `t` is the time `self + duration`, or `None`
    /// if the sum would overflow the underlying representation.
    #[must_use]
    pub fn checked_add(&self, duration: Duration) -> Option<SimTime> {
        self.0.checked_add(duration).map(SimTime)
    }

    /// Returns `Some(t)` where `t` is the time `self - duration`, or `None`
    /// if the subtraction would underflow.
    #[must_use]
    pub fn checked_sub(&self, duration: Duration) -> Option<SimTime> {
        self.0.checked_sub(duration).map(SimTime)
    }
}

// CMP

impl PartialEq<f64> for SimTime {
    fn eq(&self, other: &f64) -> bool {
        let diff = (self.0.as_secs_f64() - *other).abs();
        diff < f64::EPSILON
    }
}

// OPS

impl Sub<Duration> for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: Duration) -> Self::Output {
        self.checked_sub(rhs)
            .expect("overflow when subtracting Duration from SimTime")
    }
}

impl SubAssign<Duration> for SimTime {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl Div<f64> for SimTime {
    type Output = SimTime;

    fn div(self, rhs: f64) -> Self::Output {
        Self::from(self.0.as_secs_f64() / rhs)
    }
}

// DEREF

impl Deref for SimTime {
    type Target = Duration;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// FMT

impl Debug for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

// FROM

impl From<SimTime> for f64 {
    fn from(this: SimTime) -> Self {
        this.0.as_secs_f64()
    }
}

impl From<f64> for SimTime {
    fn from(value: f64) -> Self {
        SimTime(Duration::from_secs_f64(value))
    }
}

impl From<Duration> for SimTime {
    fn from(value: Duration) -> Self {
        SimTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops() {
        assert_eq!(
            f64::from(SimTime::from_duration(Duration::from_millis(300))),
            0.3
        );

        assert_eq!(SimTime::from(60.0) / 3.0, SimTime::from(20.0));

        assert_eq!(
            SimTime::from(30.0) - SimTime::from(10.0),
            Duration::from_secs(20)
        );
        assert_eq!(SimTime::from(30.0) - Duration::from_secs(10), 20.0);

        let mut time = SimTime::from(30.0);
        time -= Duration::from_secs(10);
        assert_eq!(time, 20.0);
    }

    #[test]
    fn micros_round_trip() {
        let t = SimTime::from_micros(1_234_567);
        assert_eq!(t.as_micros(), 1_234_567);
        assert_eq!(t, SimTime::from(1.234567));
    }

    #[test]
    fn saturating_diff() {
        let early = SimTime::from(1.0);
        let late = SimTime::from(3.0);
        assert_eq!(late.saturating_duration_since(early), Duration::from_secs(2));
        assert_eq!(early.saturating_duration_since(late), Duration::ZERO);
        assert_eq!(early.checked_duration_since(late), None);
    }
}
