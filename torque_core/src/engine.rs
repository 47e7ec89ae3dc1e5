//! Feed worker: the single consumer of a session's sensor feed.
//!
//! Spawns a thread that owns the feed, classifies each reading, records it in
//! the bank and enqueues persistence events. The cancel flag is checked after
//! every reading is taken and before anything is accepted, so once the
//! controller flips it no further reading reaches the bank. The thread
//! finalizes the session itself (projection, summary forwarding, state back to
//! `Idle`) and returns the `Summary` through its join handle.
use crossbeam_channel as xch;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};
use torque_traits::clock::Clock;
use torque_traits::{FeedFault, Reading, SensorFeed};

use crate::bank::SampleBank;
use crate::forwarder::{Forwarder, PersistEvent};
use crate::matcher::classify;
use crate::persist::SampleRecord;
use crate::profile::ToleranceProfile;
use crate::status::{SessionNotice, SessionState, StopReason};
use crate::summary::{Summary, project};
use crate::types::SessionId;

/// State shared between the controller and the worker of the current session.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) state: Mutex<SessionState>,
    pub(crate) last_summary: Mutex<Option<Summary>>,
}

impl Shared {
    pub(crate) fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, next: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// `Running -> Stopping`; returns false if the session was not running.
    pub(crate) fn begin_stop(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SessionState::Running {
            *state = SessionState::Stopping;
            true
        } else {
            false
        }
    }

    pub(crate) fn last_summary(&self) -> Option<Summary> {
        self.last_summary
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, summary: Summary) {
        *self
            .last_summary
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(summary);
    }
}

pub(crate) struct WorkerCtx {
    pub(crate) session: SessionId,
    pub(crate) profile: Arc<ToleranceProfile>,
    pub(crate) bank: Arc<SampleBank>,
    pub(crate) feed: Box<dyn SensorFeed + Send>,
    pub(crate) forwarder: Forwarder,
    pub(crate) shared: Arc<Shared>,
    pub(crate) notices: xch::Sender<SessionNotice>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) poll: Duration,
}

pub(crate) struct FeedWorker {
    cancel: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<Summary>>,
}

impl FeedWorker {
    pub(crate) fn spawn(ctx: WorkerCtx) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_clone = cancel.clone();
        let join_handle = std::thread::spawn(move || run(ctx, &cancel_clone));
        Self {
            cancel,
            join_handle: Some(join_handle),
        }
    }

    /// Cutover: no reading taken after this returns is accepted.
    pub(crate) fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Waits for the worker to finalize and returns its summary.
    pub(crate) fn join(mut self) -> Option<Summary> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Option<Summary> {
        match self.join_handle.take()?.join() {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(?e, "feed worker panicked");
                None
            }
        }
    }
}

impl Drop for FeedWorker {
    fn drop(&mut self) {
        self.cancel();
        let _ = self.join_inner();
    }
}

fn run(ctx: WorkerCtx, cancel: &AtomicBool) -> Summary {
    let WorkerCtx {
        session,
        profile,
        bank,
        mut feed,
        forwarder,
        shared,
        notices,
        clock,
        poll,
    } = ctx;
    let notify = |n: SessionNotice| {
        // Advisory: a full notice queue drops the notice, never the sample.
        let _ = notices.try_send(n);
    };

    let epoch = clock.now();
    let mut seq: u64 = 0;
    let reason = loop {
        if cancel.load(Ordering::Acquire) {
            tracing::debug!(%session, "feed worker received stop");
            break StopReason::Operator;
        }
        match feed.poll_value(poll) {
            Ok(None) => {}
            Ok(Some(value)) => {
                let reading = Reading {
                    value,
                    seq,
                    at: clock.now(),
                };
                seq += 1;
                if cancel.load(Ordering::Acquire) {
                    tracing::debug!(%session, seq = reading.seq, "reading after cutover discarded");
                    break StopReason::Operator;
                }
                accept(&reading, epoch, session, &profile, &bank, &forwarder, &notify);
            }
            Err(FeedFault::Undecodable(raw)) => {
                tracing::debug!(%session, %raw, "undecodable line skipped");
                notify(SessionNotice::DecodeSkip { session, raw });
            }
            Err(FeedFault::Disconnected(why)) => {
                if shared.begin_stop() {
                    tracing::warn!(%session, reason = %why, "feed disconnected; finalizing session");
                    notify(SessionNotice::FeedDisconnected {
                        session,
                        reason: why.clone(),
                    });
                    break StopReason::FeedDisconnected(why);
                }
                // Operator stop raced the disconnect; the operator wins.
                break StopReason::Operator;
            }
        }
    };
    feed.cancel();
    drop(feed);

    let rows = project(&profile, &bank);
    forwarder.enqueue(PersistEvent::Summary {
        profile: profile.display_name(),
        rows: rows.clone(),
    });
    let stats = forwarder.finish();
    let summary = Summary::new(session, &profile, rows, reason);
    tracing::info!(
        %session,
        profile = %summary.profile,
        accepted = summary.accepted_total(),
        passed = summary.passed,
        reason = %summary.reason,
        delivered = stats.delivered,
        failed = stats.failed,
        dropped = stats.dropped,
        "session finalized"
    );

    shared.publish(summary.clone());
    shared.set_state(SessionState::Idle);
    notify(SessionNotice::Stopped {
        session,
        reason: summary.reason.clone(),
        passed: summary.passed,
    });
    summary
}

/// Offers `reading` to every range that contains it; each range with room keeps a copy.
fn accept(
    reading: &Reading,
    epoch: Instant,
    session: SessionId,
    profile: &ToleranceProfile,
    bank: &SampleBank,
    forwarder: &Forwarder,
    notify: &impl Fn(SessionNotice),
) {
    let fits = classify(reading.value, &profile.ranges);
    if fits.is_empty() {
        tracing::debug!(%session, value = reading.value, "reading outside every range");
        notify(SessionNotice::Unmatched {
            session,
            value: reading.value,
            seq: reading.seq,
        });
        return;
    }
    let elapsed = reading.at.saturating_duration_since(epoch);
    let mut accepted = 0usize;
    for hit in &fits {
        if !bank.try_accept(hit.range, reading.value) {
            continue;
        }
        accepted += 1;
        tracing::debug!(%session, range = %hit.range, value = reading.value, "sample accepted");
        forwarder.enqueue(PersistEvent::Sample(SampleRecord {
            session,
            range: hit.range,
            label: hit.label.to_string(),
            value: reading.value,
            seq: reading.seq,
            elapsed,
            recorded_at: SystemTime::now(),
        }));
        notify(SessionNotice::SampleAccepted {
            session,
            range: hit.range,
            value: reading.value,
            seq: reading.seq,
        });
    }
    if accepted == 0 {
        tracing::debug!(%session, value = reading.value, "every matching range is full");
        notify(SessionNotice::RangesFull {
            session,
            value: reading.value,
            seq: reading.seq,
        });
    }
}
