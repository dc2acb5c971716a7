use std::path::PathBuf;

use serial_test::serial;
use simcore::prelude::*;
use simcore::runtime::ReplayOp;

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

fn log_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(name)
}

#[derive(Default)]
struct Recorded {
    victim: Option<EventHandle>,
    fired: Vec<u128>,
}

/// Records a small scenario with a reentrant insert and a removal, then
/// returns the parsed trace.
fn record(name: &str) -> ReplayTrace {
    let path = log_path(name);
    let mut rt = Builder::seeded(7)
        .quiet()
        .replay_log(&path)
        .build(Recorded::default());

    rt.schedule_in(secs(10.0), |rt: &mut Runtime<Recorded>| {
        rt.app.fired.push(rt.sim_time().as_micros());
    });
    rt.schedule_in(secs(5.0), |rt: &mut Runtime<Recorded>| {
        rt.app.fired.push(rt.sim_time().as_micros());
        rt.schedule_in(secs(1.0), |rt: &mut Runtime<Recorded>| {
            rt.app.fired.push(rt.sim_time().as_micros());
        });
        let victim = rt.app.victim.take().unwrap();
        rt.remove(&victim);
    });
    let victim = rt.schedule_in(secs(7.0), |rt: &mut Runtime<Recorded>| {
        rt.app.fired.push(rt.sim_time().as_micros());
    });
    rt.app.victim = Some(victim);

    let summary = rt.run();
    assert_eq!(summary.reason, StopReason::Drained);
    let app = rt.destroy();
    assert_eq!(app.fired, [5_000_000, 6_000_000, 10_000_000]);

    ReplayTrace::read_from(&path).expect("reading back the replay log")
}

#[test]
#[serial]
fn recorded_log_matches_the_run() {
    let trace = record("simcore-replay-record.log");

    // 3 external inserts, 1 reentrant insert, 1 remove
    assert_eq!(trace.len(), 5);

    let ops: Vec<ReplayOp> = trace.records().iter().map(|r| r.op).collect();
    assert_eq!(
        ops,
        [
            ReplayOp::Insert,
            ReplayOp::Insert,
            ReplayOp::InsertRemoved,
            ReplayOp::Insert,
            ReplayOp::Remove,
        ]
    );

    // the reentrant insert and the remove are attributed to the t=5 event
    let actor = trace.records()[1].target;
    assert_eq!(trace.records()[3].actor, actor);
    assert_eq!(trace.records()[4].actor, actor);
    assert_eq!(trace.records()[4].now, SimTime::from(5.0));
    assert_eq!(trace.records()[4].target, trace.records()[2].target);
}

#[test]
#[serial]
fn replaying_reproduces_dispatch_times_on_every_backend() {
    let trace = record("simcore-replay-cross.log");
    let replay = Replay::new(trace);

    for kind in [SchedulerKind::List, SchedulerKind::Heap, SchedulerKind::Map] {
        let report = replay.run(kind);
        assert!(report.is_faithful(), "{kind:?} diverged: {report:?}");
        assert_eq!(report.dispatched, 3);
        assert_eq!(report.removed, 1);
        assert_eq!(report.pending, 0);
    }
}

#[test]
#[serial]
fn traces_round_trip_through_the_text_format() {
    let trace = record("simcore-replay-roundtrip.log");

    let copy = log_path("simcore-replay-roundtrip-copy.log");
    trace.write_to(&copy).expect("writing the trace");
    let reread = ReplayTrace::read_from(&copy).expect("re-reading the trace");

    assert_eq!(reread, trace);
}

#[test]
#[serial]
fn replaying_a_churn_workload_is_faithful() {
    let path = log_path("simcore-replay-churn.log");

    // a larger recorded workload with growth, ties and random removals
    let mut rt = Builder::seeded(13)
        .quiet()
        .replay_log(&path)
        .max_itr(300)
        .build(Churn::default());
    for _ in 0..5 {
        rt.schedule_in(secs(1.0), churn);
    }
    rt.run();
    rt.destroy();

    let replay = Replay::read_from(&path).expect("reading the churn log");
    assert!(!replay.trace().is_empty());

    // The replay has no event limit, so every insert that was never removed
    // gets dispatched, including events still pending when recording ended.
    let records = replay.trace().records();
    let inserted = records.iter().filter(|r| r.op == ReplayOp::Insert).count();
    let removed = records.iter().filter(|r| r.op == ReplayOp::Remove).count();

    for kind in [SchedulerKind::List, SchedulerKind::Heap, SchedulerKind::Map] {
        let report = replay.run(kind);
        assert!(report.is_faithful(), "{kind:?} diverged: {report:?}");
        assert_eq!(report.dispatched, inserted);
        assert_eq!(report.removed, removed);
        assert_eq!(report.pending, 0);
    }
}

#[derive(Default)]
struct Churn {
    handles: Vec<EventHandle>,
}

fn churn(rt: &mut Runtime<Churn>) {
    let roll = rt.random::<f64>();
    if roll < 0.8 {
        let delay = secs(rt.random::<f64>() * 4.0);
        let handle = rt.schedule_in(delay, churn);
        rt.app.handles.push(handle);
    }
    if roll < 0.4 {
        rt.schedule_now(churn);
    }
    if rt.random::<f64>() < 0.25 && !rt.app.handles.is_empty() {
        let idx = rt.random::<usize>() % rt.app.handles.len();
        let victim = rt.app.handles.swap_remove(idx);
        rt.remove(&victim);
    }
}
