use crate::time::SimTime;
use std::{fmt::Display, mem};

///
/// A composed limit that terminates the event execution of
/// a runtime.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeLimit {
    /// An unbounded runtime. A runtime with this limit only returns from
    /// `run` once all events are handled and none were created in response.
    None,

    /// A bound on the number of executed events. The runtime returns
    /// before dispatching the `n+1`-th event.
    EventCount(usize),

    /// A bound on the simulation time. The runtime returns once the next
    /// pending event lies strictly beyond the given time; events exactly
    /// at the bound still execute.
    SimTime(SimTime),

    /// Combines two limits with a logical AND: the runtime only returns
    /// once both are satisfied.
    CombinedAnd(Box<RuntimeLimit>, Box<RuntimeLimit>),

    /// Combines two limits with a logical OR: the runtime returns as soon
    /// as either is satisfied.
    CombinedOr(Box<RuntimeLimit>, Box<RuntimeLimit>),
}

impl RuntimeLimit {
    pub(crate) fn applies(&self, itr_count: usize, time: SimTime) -> bool {
        match self {
            Self::None => false,

            Self::EventCount(e) => itr_count > *e,
            Self::SimTime(t) => time > *t,

            Self::CombinedAnd(lhs, rhs) => {
                lhs.applies(itr_count, time) && rhs.applies(itr_count, time)
            }
            Self::CombinedOr(lhs, rhs) => {
                lhs.applies(itr_count, time) || rhs.applies(itr_count, time)
            }
        }
    }

    pub(crate) fn add(&mut self, limit: RuntimeLimit) {
        if matches!(self, Self::None) {
            *self = limit;
        } else {
            let mut other = Self::None;
            mem::swap(&mut other, self);
            *self = Self::CombinedOr(Box::new(other), Box::new(limit));
        }
    }
}

impl Display for RuntimeLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),

            Self::EventCount(e) => write!(f, "MaxEventCount({e})"),
            Self::SimTime(t) => write!(f, "MaxSimTime({t})"),

            Self::CombinedAnd(lhs, rhs) => write!(f, "{lhs} and {rhs}"),
            Self::CombinedOr(lhs, rhs) => write!(f, "{lhs} or {rhs}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_limits() {
        let limit = RuntimeLimit::None;
        assert!(!limit.applies(123, 100.0.into()));
        assert!(!limit.applies(usize::MAX, SimTime::MAX));

        let limit = RuntimeLimit::EventCount(100);
        assert!(!limit.applies(23, 100.0.into()));
        assert!(limit.applies(101, 0.0.into()));
        assert!(limit.applies(230, 23.0.into()));

        let limit = RuntimeLimit::SimTime(100.0.into());
        assert!(!limit.applies(0, 10.0.into()));
        assert!(!limit.applies(0, 100.0.into()));
        assert!(limit.applies(0, 100.000001.into()));
    }

    #[test]
    fn combined_limits() {
        use RuntimeLimit::{CombinedAnd, CombinedOr, EventCount, SimTime};

        let limit = CombinedAnd(Box::new(EventCount(100)), Box::new(SimTime(100.0.into())));
        assert!(!limit.applies(200, 10.0.into()));
        assert!(!limit.applies(0, 200.0.into()));
        assert!(limit.applies(101, 100.000001.into()));

        let limit = CombinedOr(Box::new(EventCount(100)), Box::new(SimTime(100.0.into())));
        assert!(!limit.applies(20, 10.0.into()));
        assert!(limit.applies(0, 200.0.into()));
        assert!(limit.applies(101, 10.0.into()));

        let mut other = RuntimeLimit::EventCount(100);
        other.add(SimTime(100.0.into()));
        assert_eq!(limit, other);
    }
}
