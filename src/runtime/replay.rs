//!
//! Recording and mechanical replay of event queue decisions.
//!
//! When a runtime is built with [`Builder::replay_log`], every queue insert
//! and remove is appended to a text file, one record per line:
//!
//! ```text
//! op actor_uid now_us target_uid target_time_us
//! ```
//!
//! `op` is `i` (insert), `il` (insert whose removal is recorded later in the
//! same log) or `r` (remove). `actor_uid` is the uid of the event whose
//! callback made the decision, `0` for calls made outside of any callback.
//! Times are integral microseconds of virtual time.
//!
//! A [`ReplayTrace`] parses such a log back into a command stream, and a
//! [`Replay`] drives a fresh runtime through the identical sequence of
//! operations against any [`SchedulerKind`]. This is used to cross-check
//! the queue backends against each other and to benchmark them on
//! recorded workloads.
//!

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use fxhash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::time::SimTime;

use super::{
    Builder, EventFn, EventHandle, EventKey, EventUid, Runtime, SchedulerKind, EXTERNAL_UID,
};

///
/// The append-only record sink attached to a running runtime.
///
/// Recording is a side effect only: it must never alter scheduling
/// outcomes, so write failures are reported as warnings instead of
/// propagating into the dispatch path.
///
pub(crate) struct EventLog {
    out: BufWriter<File>,
}

impl EventLog {
    pub(crate) fn create(path: &Path) -> io::Result<Self> {
        Ok(Self {
            out: BufWriter::new(File::create(path)?),
        })
    }

    pub(crate) fn insert(&mut self, actor: EventUid, now: SimTime, target: EventKey) {
        self.append("i", actor, now, target);
    }

    pub(crate) fn remove(&mut self, actor: EventUid, now: SimTime, target: EventKey) {
        self.append("r", actor, now, target);
    }

    fn append(&mut self, op: &str, actor: EventUid, now: SimTime, target: EventKey) {
        let result = writeln!(
            self.out,
            "{op} {actor} {} {} {}",
            now.as_micros(),
            target.uid,
            target.time.as_micros()
        );
        if let Err(err) = result {
            tracing::warn!(%err, "failed to append to replay log");
        }
    }
}

/// An error reading or parsing a replay log.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The log file could not be accessed.
    #[error("failed to access replay log: {0}")]
    Io(#[from] io::Error),
    /// A log line did not match the record format.
    #[error("replay log line {line}: {reason}")]
    Parse {
        /// The 1-based line number of the offending record.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },
}

/// The kind of queue decision a [`ReplayRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOp {
    /// An event was inserted and eventually dispatched.
    Insert,
    /// An event was inserted and later removed; replay must retain its
    /// handle for the matching [`Remove`](ReplayOp::Remove).
    InsertRemoved,
    /// A pending event was removed.
    Remove,
}

impl ReplayOp {
    fn token(self) -> &'static str {
        match self {
            ReplayOp::Insert => "i",
            ReplayOp::InsertRemoved => "il",
            ReplayOp::Remove => "r",
        }
    }
}

/// One recorded queue decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayRecord {
    /// The decision kind.
    pub op: ReplayOp,
    /// The uid of the event executing when the decision was made,
    /// [`EXTERNAL_UID`] outside of any callback.
    pub actor: EventUid,
    /// The virtual time of the decision.
    pub now: SimTime,
    /// The uid of the inserted or removed event.
    pub target: EventUid,
    /// The expiry time of the inserted or removed event.
    pub target_time: SimTime,
}

///
/// A parsed replay log: the exact sequence of queue operations of a
/// recorded run.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayTrace {
    records: Vec<ReplayRecord>,
}

impl ReplayTrace {
    /// Reads and parses a replay log file.
    ///
    /// # Errors
    ///
    /// Returns a [`ReplayError`] if the file cannot be read or a line does
    /// not match the record format.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Parses a replay log from any buffered reader.
    ///
    /// # Errors
    ///
    /// Returns a [`ReplayError`] if a line does not match the record format.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, ReplayError> {
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(parse_record(&line, idx + 1)?);
        }

        let mut trace = Self { records };
        trace.mark_deferred_removals();
        Ok(trace)
    }

    /// The recorded operations, in recording order.
    #[must_use]
    pub fn records(&self) -> &[ReplayRecord] {
        &self.records
    }

    /// The number of recorded operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the trace holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serializes the trace back into the textual log format, with
    /// deferred removals marked as `il`.
    ///
    /// # Errors
    ///
    /// Returns a [`ReplayError`] on I/O failure.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ReplayError> {
        let mut out = BufWriter::new(File::create(path)?);
        for record in &self.records {
            writeln!(
                out,
                "{} {} {} {} {}",
                record.op.token(),
                record.actor,
                record.now.as_micros(),
                record.target,
                record.target_time.as_micros()
            )?;
        }
        out.flush()?;
        Ok(())
    }

    /// The live writer only emits `i`/`r`; upgrade inserts whose target is
    /// removed later, so the replay driver knows to retain their handles.
    fn mark_deferred_removals(&mut self) {
        let removed: FxHashSet<EventUid> = self
            .records
            .iter()
            .filter(|record| record.op == ReplayOp::Remove)
            .map(|record| record.target)
            .collect();

        for record in &mut self.records {
            if record.op == ReplayOp::Insert && removed.contains(&record.target) {
                record.op = ReplayOp::InsertRemoved;
            }
        }
    }
}

fn parse_record(line: &str, line_no: usize) -> Result<ReplayRecord, ReplayError> {
    fn token<'a>(
        tokens: &mut impl Iterator<Item = &'a str>,
        line: usize,
    ) -> Result<&'a str, ReplayError> {
        tokens.next().ok_or(ReplayError::Parse {
            line,
            reason: "missing field".to_string(),
        })
    }

    fn number(token: &str, line: usize) -> Result<u64, ReplayError> {
        token.parse().map_err(|_| ReplayError::Parse {
            line,
            reason: format!("invalid number {token:?}"),
        })
    }

    let mut tokens = line.split_whitespace();

    let op = match token(&mut tokens, line_no)? {
        "i" => ReplayOp::Insert,
        "il" => ReplayOp::InsertRemoved,
        "r" => ReplayOp::Remove,
        other => {
            return Err(ReplayError::Parse {
                line: line_no,
                reason: format!("unknown op {other:?}"),
            })
        }
    };

    let actor = number(token(&mut tokens, line_no)?, line_no)?;
    let now = SimTime::from_micros(number(token(&mut tokens, line_no)?, line_no)?);
    let target = number(token(&mut tokens, line_no)?, line_no)?;
    let target_time = SimTime::from_micros(number(token(&mut tokens, line_no)?, line_no)?);

    if tokens.next().is_some() {
        return Err(ReplayError::Parse {
            line: line_no,
            reason: "trailing tokens".to_string(),
        });
    }

    Ok(ReplayRecord {
        op,
        actor,
        now,
        target,
        target_time,
    })
}

/// The queue operations attributed to one recorded actor.
#[derive(Debug, Clone, Copy)]
enum ReplayCmd {
    Insert {
        target: EventUid,
        time: SimTime,
        keep: bool,
    },
    Remove {
        target: EventUid,
    },
}

#[derive(Default)]
struct ReplayApp {
    cmds: FxHashMap<EventUid, Vec<ReplayCmd>>,
    expected: FxHashMap<EventUid, SimTime>,
    pending: FxHashMap<EventUid, EventHandle>,
    dispatched: usize,
    removed: usize,
    divergences: usize,
}

/// The outcome of replaying a trace against a fresh runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    /// Events that were dispatched.
    pub dispatched: usize,
    /// Events that were physically removed before dispatch.
    pub removed: usize,
    /// Events that fired at a different virtual time than recorded.
    pub divergences: usize,
    /// Events that were neither dispatched nor removed (the recorded run
    /// ended early, e.g. due to a limit).
    pub pending: usize,
}

impl ReplayReport {
    /// Whether the replayed run reproduced every recorded dispatch time.
    #[must_use]
    pub fn is_faithful(&self) -> bool {
        self.divergences == 0
    }
}

///
/// Drives a fresh runtime through a recorded operation sequence.
///
/// Each recorded event, when dispatched, performs exactly the inserts and
/// removes its original performed; recorded external operations are issued
/// before the run starts. The report tells whether the new run reproduced
/// the recorded dispatch times, which must hold for every backend.
///
#[derive(Debug, Clone)]
pub struct Replay {
    trace: ReplayTrace,
}

impl Replay {
    /// Wraps an already parsed trace.
    #[must_use]
    pub fn new(trace: ReplayTrace) -> Self {
        Self { trace }
    }

    /// Reads a replay log file.
    ///
    /// # Errors
    ///
    /// Returns a [`ReplayError`] if the log cannot be read or parsed.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        Ok(Self::new(ReplayTrace::read_from(path)?))
    }

    /// The underlying trace.
    #[must_use]
    pub fn trace(&self) -> &ReplayTrace {
        &self.trace
    }

    /// Replays the trace against a fresh runtime using the given backend.
    #[must_use]
    pub fn run(&self, scheduler: SchedulerKind) -> ReplayReport {
        let mut app = ReplayApp::default();
        for record in self.trace.records() {
            let cmd = match record.op {
                ReplayOp::Insert => ReplayCmd::Insert {
                    target: record.target,
                    time: record.target_time,
                    keep: false,
                },
                ReplayOp::InsertRemoved => ReplayCmd::Insert {
                    target: record.target,
                    time: record.target_time,
                    keep: true,
                },
                ReplayOp::Remove => ReplayCmd::Remove {
                    target: record.target,
                },
            };
            if record.op != ReplayOp::Remove {
                app.expected.insert(record.target, record.target_time);
            }
            app.cmds.entry(record.actor).or_default().push(cmd);
        }

        let mut rt = Builder::new().quiet().scheduler(scheduler).build(app);

        let root_cmds = rt.app.cmds.remove(&EXTERNAL_UID).unwrap_or_default();
        exec_cmds(&mut rt, root_cmds);
        rt.run();

        let app = rt.destroy();
        ReplayReport {
            dispatched: app.dispatched,
            removed: app.removed,
            divergences: app.divergences,
            pending: app.pending.len(),
        }
    }
}

/// The callback body of a replayed event: validate the dispatch time, then
/// perform the inserts/removes the original event performed.
fn replay_event(uid: EventUid) -> EventFn<ReplayApp> {
    Box::new(move |rt| {
        rt.app.dispatched += 1;
        if rt.app.expected.get(&uid).copied() != Some(SimTime::now()) {
            rt.app.divergences += 1;
        }
        rt.app.pending.remove(&uid);

        let cmds = rt.app.cmds.remove(&uid).unwrap_or_default();
        exec_cmds(rt, cmds);
    })
}

fn exec_cmds(rt: &mut Runtime<ReplayApp>, cmds: Vec<ReplayCmd>) {
    for cmd in cmds {
        match cmd {
            ReplayCmd::Insert { target, time, keep } => {
                let handle = rt.schedule_at(time, replay_event(target));
                if keep {
                    rt.app.pending.insert(target, handle);
                }
            }
            ReplayCmd::Remove { target } => {
                if let Some(handle) = rt.app.pending.remove(&target) {
                    rt.remove(&handle);
                    rt.app.removed += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_upgrades_deferred_removals() {
        let log = "\
i 0 0 1 5000000
i 0 0 2 7000000
i 1 5000000 3 9000000
r 1 5000000 2 7000000
";
        let trace = ReplayTrace::from_reader(log.as_bytes()).unwrap();
        assert_eq!(trace.len(), 4);

        assert_eq!(trace.records()[0].op, ReplayOp::Insert);
        assert_eq!(trace.records()[1].op, ReplayOp::InsertRemoved);
        assert_eq!(trace.records()[2].op, ReplayOp::Insert);
        assert_eq!(trace.records()[3].op, ReplayOp::Remove);

        let record = trace.records()[2];
        assert_eq!(record.actor, 1);
        assert_eq!(record.now, SimTime::from(5.0));
        assert_eq!(record.target, 3);
        assert_eq!(record.target_time, SimTime::from(9.0));
    }

    #[test]
    fn skips_blank_lines() {
        let trace = ReplayTrace::from_reader("\n\ni 0 0 1 1000000\n\n".as_bytes()).unwrap();
        assert_eq!(trace.len(), 1);
    }

    #[test]
    fn rejects_malformed_records() {
        let err = ReplayTrace::from_reader("x 0 0 1 1".as_bytes()).unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 1, .. }));

        let err = ReplayTrace::from_reader("i 0 0 1".as_bytes()).unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 1, .. }));

        let err = ReplayTrace::from_reader("i 0 0 1 1 1".as_bytes()).unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 1, .. }));

        let err = ReplayTrace::from_reader("i 0 0 nan 1".as_bytes()).unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 1, .. }));

        let err = ReplayTrace::from_reader("i 0 0 1 1\nil 2".as_bytes()).unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 2, .. }));
    }
}
