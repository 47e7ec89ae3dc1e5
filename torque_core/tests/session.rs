use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use torque_core::mocks::{ChannelFeed, FeedStep, MemoryPersistence, ScriptedFeed};
use torque_core::{
    ManualClock, RangeId, RunOpts, SampleSlot, SessionCfg, SessionController, SessionError,
    SessionNotice, SessionState, StopReason, ToleranceProfile, ToleranceRange, ToolKind,
    run_session,
};

fn bench_profile() -> ToleranceProfile {
    ToleranceProfile::new(
        75.0,
        ToolKind::Wrench,
        "ft/lbs",
        vec![
            ToleranceRange::new(70.0, 67.2, 72.8),
            ToleranceRange::new(50.0, 48.0, 52.0),
            ToleranceRange::new(30.0, 28.8, 31.2),
        ],
    )
}

fn controller_with(persistence: Arc<MemoryPersistence>) -> SessionController {
    SessionController::builder()
        .with_persistence(persistence)
        .build()
}

fn session_error(err: &eyre::Report) -> &SessionError {
    err.downcast_ref::<SessionError>()
        .expect("typed session error")
}

/// Waits for a notice matching `pred`, failing after two seconds.
fn wait_for(ctrl: &SessionController, pred: impl Fn(&SessionNotice) -> bool) -> SessionNotice {
    let rx = ctrl.notices();
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        let n = rx.recv_timeout(left).expect("notice before deadline");
        if pred(&n) {
            return n;
        }
    }
}

#[test]
fn bench_stream_is_bucketed_and_persisted() {
    let sink = Arc::new(MemoryPersistence::new());
    let mut ctrl = controller_with(sink.clone());
    let feed = ScriptedFeed::values(&[70.1, 50.1, 70.3, 29.9, 999.0]);
    let id = ctrl.start(bench_profile(), Some(Box::new(feed))).unwrap();

    let summary = run_session(&mut ctrl, id, &RunOpts::default(), |_| {}).unwrap();
    assert_eq!(summary.session, id);
    assert_eq!(
        summary.reason,
        StopReason::FeedDisconnected("script exhausted".to_string())
    );
    let values: Vec<Vec<f64>> = summary.rows.iter().map(|r| r.values().collect()).collect();
    assert_eq!(values, vec![vec![70.1, 70.3], vec![50.1], vec![29.9]]);
    assert!(!summary.passed);
    assert_eq!(summary.rows[0].samples.len(), 5);
    assert_eq!(summary.rows[2].samples[1], SampleSlot::Absent);

    let recs = sink.samples();
    assert_eq!(recs.len(), 4);
    let order: Vec<u64> = recs.iter().map(|r| r.seq).collect();
    assert_eq!(order, vec![0, 1, 2, 3]);
    assert_eq!(recs[1].range, RangeId(1));
    assert_eq!(recs[1].label, "48.0 - 52.0");
    assert!(recs.iter().all(|r| r.session == id));
    assert_eq!(sink.summaries().len(), 1);
    assert_eq!(ctrl.state(), SessionState::Idle);
}

#[test]
fn sixth_match_is_discarded_without_persistence() {
    let sink = Arc::new(MemoryPersistence::new());
    let mut ctrl = controller_with(sink.clone());
    let feed = ScriptedFeed::values(&[70.0, 70.1, 70.2, 70.3, 70.4, 70.5]);
    let id = ctrl.start(bench_profile(), Some(Box::new(feed))).unwrap();
    let mut full = 0;
    let summary = run_session(&mut ctrl, id, &RunOpts::default(), |n| {
        if matches!(n, SessionNotice::RangesFull { .. }) {
            full += 1;
        }
    })
    .unwrap();
    assert_eq!(summary.rows[0].samples_so_far, 5);
    assert_eq!(summary.rows[0].values().last(), Some(70.4));
    assert_eq!(sink.samples().len(), 5);
    assert_eq!(full, 1);
}

#[test]
fn zero_range_profile_is_rejected_and_state_stays_idle() {
    let mut ctrl = SessionController::builder().build();
    let empty = ToleranceProfile::new(75.0, ToolKind::Wrench, "ft/lbs", vec![]);
    let err = ctrl
        .start(empty, Some(Box::new(ScriptedFeed::values(&[]))))
        .unwrap_err();
    assert!(matches!(session_error(&err), SessionError::InvalidProfile(_)));
    assert_eq!(ctrl.state(), SessionState::Idle);
    assert!(ctrl.session_id().is_none());
}

#[test]
fn missing_feed_is_rejected() {
    let mut ctrl = SessionController::builder().build();
    let err = ctrl.start(bench_profile(), None).unwrap_err();
    assert!(matches!(session_error(&err), SessionError::NoFeed(_)));
    assert_eq!(ctrl.state(), SessionState::Idle);
}

#[test]
fn commands_while_running_report_busy() {
    let mut ctrl = SessionController::builder().build();
    let feed = ScriptedFeed::values(&[]).hold_open();
    ctrl.start(bench_profile(), Some(Box::new(feed))).unwrap();
    assert_eq!(ctrl.state(), SessionState::Running);

    let err = ctrl
        .start(bench_profile(), Some(Box::new(ScriptedFeed::values(&[]))))
        .unwrap_err();
    assert!(matches!(
        session_error(&err),
        SessionError::SessionBusy {
            state: SessionState::Running,
            ..
        }
    ));
    let err = ctrl.select_profile(bench_profile()).unwrap_err();
    assert!(matches!(session_error(&err), SessionError::SessionBusy { .. }));

    assert!(ctrl.stop().is_some());
    assert_eq!(ctrl.state(), SessionState::Idle);
}

#[test]
fn stop_is_idempotent() {
    let mut ctrl = SessionController::builder().build();
    assert!(ctrl.stop().is_none());

    let feed = ScriptedFeed::values(&[70.0]).hold_open();
    ctrl.start(bench_profile(), Some(Box::new(feed))).unwrap();
    wait_for(&ctrl, |n| matches!(n, SessionNotice::SampleAccepted { .. }));
    let first = ctrl.stop().expect("summary from first stop");
    assert_eq!(first.reason, StopReason::Operator);
    assert!(ctrl.stop().is_none());
    assert_eq!(ctrl.last_summary(), Some(first));
}

#[test]
fn stop_cuts_over_and_cancels_feed() {
    let sink = Arc::new(MemoryPersistence::new());
    let mut ctrl = controller_with(sink.clone());
    let (tx, feed) = ChannelFeed::pair();
    let id = ctrl.start(bench_profile(), Some(Box::new(feed))).unwrap();

    tx.send(FeedStep::Value(70.1)).unwrap();
    tx.send(FeedStep::Value(50.1)).unwrap();
    wait_for(&ctrl, |n| {
        matches!(n, SessionNotice::SampleAccepted { seq: 1, .. })
    });
    let summary = ctrl.stop().unwrap();

    // nothing sent after the cutover can reach the bank
    let _ = tx.send(FeedStep::Value(70.2));
    assert_eq!(summary.session, id);
    assert_eq!(summary.accepted_total(), 2);
    assert_eq!(ctrl.last_summary().unwrap().accepted_total(), 2);
    assert_eq!(sink.samples().len(), 2);
    assert_eq!(sink.summaries()[0].2, summary.rows);
}

#[test]
fn feed_cancel_is_invoked_on_stop() {
    let mut ctrl = SessionController::builder().build();
    let feed = ScriptedFeed::values(&[]).hold_open();
    let cancelled = feed.cancel_flag();
    ctrl.start(bench_profile(), Some(Box::new(feed))).unwrap();
    ctrl.stop();
    assert!(cancelled.load(Ordering::Relaxed));
}

#[test]
fn disconnect_finalizes_and_reports() {
    let mut ctrl = SessionController::builder().build();
    let feed = ScriptedFeed::new([
        FeedStep::Value(70.0),
        FeedStep::Garbage("ERR".to_string()),
        FeedStep::Disconnect("port closed".to_string()),
    ]);
    let id = ctrl.start(bench_profile(), Some(Box::new(feed))).unwrap();
    let mut seen = Vec::new();
    let summary = run_session(&mut ctrl, id, &RunOpts::default(), |n| seen.push(n.clone())).unwrap();
    assert_eq!(
        summary.reason,
        StopReason::FeedDisconnected("port closed".to_string())
    );
    assert!(seen.iter().any(|n| matches!(n, SessionNotice::DecodeSkip { raw, .. } if raw == "ERR")));
    assert!(seen.iter().any(|n| matches!(n, SessionNotice::FeedDisconnected { .. })));
    assert!(seen.iter().any(|n| matches!(n, SessionNotice::Stopped { .. })));
    // stop after a disconnect is a no-op
    assert!(ctrl.stop().is_none());
    assert_eq!(ctrl.last_summary().unwrap().session, id);
}

#[test]
fn new_session_gets_fresh_bank_and_id() {
    let mut ctrl = SessionController::builder().build();
    let a = ctrl
        .start(bench_profile(), Some(Box::new(ScriptedFeed::values(&[70.0]))))
        .unwrap();
    let first = run_session(&mut ctrl, a, &RunOpts::default(), |_| {}).unwrap();
    let b = ctrl
        .start(bench_profile(), Some(Box::new(ScriptedFeed::values(&[50.0]))))
        .unwrap();
    let second = run_session(&mut ctrl, b, &RunOpts::default(), |_| {}).unwrap();
    assert_ne!(a, b);
    assert_eq!(first.rows[0].samples_so_far, 1);
    assert_eq!(second.rows[0].samples_so_far, 0);
    assert_eq!(second.rows[1].samples_so_far, 1);
}

#[test]
fn stop_when_complete_ends_session_with_pass() {
    let mut ctrl = SessionController::builder()
        .with_session_cfg(SessionCfg {
            capacity_per_range: 1,
        })
        .build();
    let feed = ScriptedFeed::values(&[70.0, 50.0, 30.0]).hold_open();
    let id = ctrl.start(bench_profile(), Some(Box::new(feed))).unwrap();
    let opts = RunOpts {
        stop_when_complete: true,
        ..RunOpts::default()
    };
    let summary = run_session(&mut ctrl, id, &opts, |_| {}).unwrap();
    assert!(summary.passed);
    assert_eq!(summary.reason, StopReason::Operator);
}

#[test]
fn max_run_caps_an_idle_feed() {
    let mut ctrl = SessionController::builder().build();
    let feed = ScriptedFeed::values(&[]).hold_open();
    let id = ctrl.start(bench_profile(), Some(Box::new(feed))).unwrap();
    let opts = RunOpts {
        max_run_ms: Some(50),
        ..RunOpts::default()
    };
    let summary = run_session(&mut ctrl, id, &opts, |_| {}).unwrap();
    assert_eq!(summary.accepted_total(), 0);
    assert_eq!(summary.reason, StopReason::Operator);
}

#[test]
fn preview_and_live_summary() {
    let mut ctrl = SessionController::builder().build();
    assert!(ctrl.preview().is_none());
    ctrl.select_profile(bench_profile()).unwrap();
    let preview = ctrl.preview().unwrap();
    assert_eq!(preview.len(), 3);
    assert!(preview.iter().all(|r| r.samples_so_far == 0 && r.samples.len() == 5));

    let feed = ScriptedFeed::values(&[70.0]).hold_open();
    ctrl.start_selected(Some(Box::new(feed))).unwrap();
    wait_for(&ctrl, |n| matches!(n, SessionNotice::SampleAccepted { .. }));
    let live = ctrl.live_summary().unwrap();
    assert_eq!(live[0].samples_so_far, 1);
    assert!(ctrl.summary_handle().is_some());
    ctrl.stop();
    assert!(ctrl.summary_handle().is_none());
}

#[test]
fn start_selected_without_selection_is_invalid() {
    let mut ctrl = SessionController::builder().build();
    let err = ctrl
        .start_selected(Some(Box::new(ScriptedFeed::values(&[]))))
        .unwrap_err();
    assert!(matches!(session_error(&err), SessionError::InvalidProfile(_)));
}

#[test]
fn overlapping_ranges_each_keep_the_reading() {
    let sink = Arc::new(MemoryPersistence::new());
    let mut ctrl = SessionController::builder()
        .with_persistence(sink.clone())
        .with_session_cfg(SessionCfg {
            capacity_per_range: 1,
        })
        .build();
    let profile = ToleranceProfile::new(
        60.0,
        ToolKind::Wrench,
        "ft/lbs",
        vec![
            ToleranceRange::new(50.0, 48.0, 52.0),
            ToleranceRange::new(51.0, 49.0, 53.0),
        ],
    );
    let feed = ScriptedFeed::values(&[50.7, 50.8]);
    let id = ctrl.start(profile, Some(Box::new(feed))).unwrap();
    let mut accepted = Vec::new();
    let mut full = 0;
    let summary = run_session(&mut ctrl, id, &RunOpts::default(), |n| match n {
        SessionNotice::SampleAccepted { range, seq, .. } => accepted.push((*range, *seq)),
        SessionNotice::RangesFull { .. } => full += 1,
        _ => {}
    })
    .unwrap();

    let values: Vec<Vec<f64>> = summary.rows.iter().map(|r| r.values().collect()).collect();
    assert_eq!(values, vec![vec![50.7], vec![50.7]]);
    assert!(summary.passed);
    // closest center first
    assert_eq!(accepted, vec![(RangeId(1), 0), (RangeId(0), 0)]);
    assert_eq!(full, 1);
    let recs = sink.samples();
    assert_eq!(recs.len(), 2);
    assert!(recs.iter().all(|r| r.seq == 0 && r.value == 50.7));
}

#[test]
fn samples_carry_arrival_time_from_controller_clock() {
    let clock = ManualClock::new();
    let sink = Arc::new(MemoryPersistence::new());
    let mut ctrl = SessionController::builder()
        .with_persistence(sink.clone())
        .with_clock(Arc::new(clock.clone()))
        .build();
    let (tx, feed) = ChannelFeed::pair();
    ctrl.start(bench_profile(), Some(Box::new(feed))).unwrap();

    tx.send(FeedStep::Value(70.0)).unwrap();
    wait_for(&ctrl, |n| matches!(n, SessionNotice::SampleAccepted { seq: 0, .. }));
    clock.advance(Duration::from_millis(250));
    tx.send(FeedStep::Value(50.0)).unwrap();
    wait_for(&ctrl, |n| matches!(n, SessionNotice::SampleAccepted { seq: 1, .. }));
    ctrl.stop().unwrap();

    let elapsed: Vec<Duration> = sink.samples().iter().map(|r| r.elapsed).collect();
    assert_eq!(elapsed, vec![Duration::ZERO, Duration::from_millis(250)]);
}

#[test]
fn commands_while_stopping_report_busy() {
    // Three writes at 200 ms hold the worker in Stopping after the disconnect.
    let sink = Arc::new(MemoryPersistence::slow(Duration::from_millis(200)));
    let mut ctrl = controller_with(sink);
    let feed = ScriptedFeed::values(&[70.0, 50.0, 30.0]);
    let id = ctrl.start(bench_profile(), Some(Box::new(feed))).unwrap();
    wait_for(&ctrl, |n| matches!(n, SessionNotice::FeedDisconnected { .. }));
    assert_eq!(ctrl.state(), SessionState::Stopping);

    let err = ctrl
        .start(bench_profile(), Some(Box::new(ScriptedFeed::values(&[]))))
        .unwrap_err();
    assert!(matches!(
        session_error(&err),
        SessionError::SessionBusy {
            command: "start",
            state: SessionState::Stopping,
        }
    ));
    let err = ctrl.select_profile(bench_profile()).unwrap_err();
    assert!(matches!(
        session_error(&err),
        SessionError::SessionBusy {
            state: SessionState::Stopping,
            ..
        }
    ));
    assert!(ctrl.stop().is_none());

    wait_for(&ctrl, |n| matches!(n, SessionNotice::Stopped { .. }));
    assert_eq!(ctrl.state(), SessionState::Idle);
    let last = ctrl.last_summary().unwrap();
    assert_eq!(last.session, id);
    assert_eq!(
        last.reason,
        StopReason::FeedDisconnected("script exhausted".to_string())
    );
    assert_eq!(last.accepted_total(), 3);
}

#[test]
fn run_cap_during_disconnect_finalize_still_returns_summary() {
    let sink = Arc::new(MemoryPersistence::slow(Duration::from_millis(100)));
    let mut ctrl = controller_with(sink.clone());
    let feed = ScriptedFeed::new([
        FeedStep::Value(70.0),
        FeedStep::Value(50.0),
        FeedStep::Value(30.0),
        FeedStep::Disconnect("port closed".to_string()),
    ]);
    let id = ctrl.start(bench_profile(), Some(Box::new(feed))).unwrap();
    wait_for(&ctrl, |n| matches!(n, SessionNotice::FeedDisconnected { .. }));

    // the cap fires at once, while the worker is still draining persistence
    let opts = RunOpts {
        max_run_ms: Some(0),
        ..RunOpts::default()
    };
    let summary = run_session(&mut ctrl, id, &opts, |_| {}).unwrap();
    assert_eq!(summary.session, id);
    assert_eq!(
        summary.reason,
        StopReason::FeedDisconnected("port closed".to_string())
    );
    assert_eq!(summary.accepted_total(), 3);
    assert_eq!(ctrl.state(), SessionState::Idle);
    assert_eq!(sink.summaries().len(), 1);
}
