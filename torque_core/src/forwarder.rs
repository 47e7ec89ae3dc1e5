//! Background persistence forwarding.
//!
//! The feed worker enqueues events and never blocks on persistence I/O. A
//! dedicated thread drains the queue in order and calls into `Persistence`.
//! Failures are logged and surfaced as `PersistenceDegraded`; they never
//! touch session data.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::ForwardCfg;
use crate::persist::{Persistence, SampleRecord};
use crate::status::SessionNotice;
use crate::summary::SummaryRow;
use crate::types::SessionId;

#[derive(Debug, Clone)]
pub(crate) enum PersistEvent {
    Sample(SampleRecord),
    Summary { profile: String, rows: Vec<SummaryRow> },
}

/// Counters reported once the forwarding thread has drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    pub delivered: u64,
    pub failed: u64,
    /// Events evicted by a full bounded queue.
    pub dropped: u64,
}

pub(crate) struct Forwarder {
    session: SessionId,
    tx: Option<xch::Sender<PersistEvent>>,
    /// Second handle on the queue so the producer can evict the oldest event.
    evict_rx: Option<xch::Receiver<PersistEvent>>,
    enqueue_timeout: Duration,
    dropped: Arc<AtomicU64>,
    notices: xch::Sender<SessionNotice>,
    join_handle: Option<JoinHandle<ForwardStats>>,
}

impl Forwarder {
    pub(crate) fn spawn(
        persistence: Arc<dyn Persistence>,
        cfg: &ForwardCfg,
        session: SessionId,
        notices: xch::Sender<SessionNotice>,
    ) -> Self {
        let (tx, rx) = match cfg.queue_capacity {
            Some(cap) => xch::bounded(cap.max(1)),
            None => xch::unbounded(),
        };
        let evict_rx = cfg.queue_capacity.map(|_| rx.clone());
        let worker_notices = notices.clone();

        let join_handle = std::thread::spawn(move || {
            let mut stats = ForwardStats::default();
            for event in rx.iter() {
                let outcome = match &event {
                    PersistEvent::Sample(rec) => persistence.record_sample(rec),
                    PersistEvent::Summary { profile, rows } => {
                        persistence.record_summary(session, profile, rows)
                    }
                };
                match outcome {
                    Ok(()) => stats.delivered += 1,
                    Err(e) => {
                        stats.failed += 1;
                        tracing::warn!(%session, error = %e, "persistence write failed");
                        let _ = worker_notices.try_send(SessionNotice::PersistenceDegraded {
                            session,
                            detail: e.to_string(),
                        });
                    }
                }
            }
            tracing::debug!(%session, ?stats, "forwarder drained");
            stats
        });

        Self {
            session,
            tx: Some(tx),
            evict_rx,
            enqueue_timeout: cfg.enqueue_timeout,
            dropped: Arc::new(AtomicU64::new(0)),
            notices,
            join_handle: Some(join_handle),
        }
    }

    pub(crate) fn enqueue(&self, event: PersistEvent) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        let Some(evict_rx) = self.evict_rx.as_ref() else {
            // Unbounded: send only fails when the worker is gone.
            if tx.send(event).is_err() {
                tracing::warn!(session = %self.session, "forwarder gone; event lost");
            }
            return;
        };

        let event = match tx.send_timeout(event, self.enqueue_timeout) {
            Ok(()) => return,
            Err(xch::SendTimeoutError::Timeout(ev)) => ev,
            Err(xch::SendTimeoutError::Disconnected(_)) => {
                tracing::warn!(session = %self.session, "forwarder gone; event lost");
                return;
            }
        };

        // Queue still full: evict the oldest pending event to make room.
        if evict_rx.try_recv().is_ok() {
            self.note_drop();
        }
        if tx.try_send(event).is_err() {
            self.note_drop();
        }
    }

    fn note_drop(&self) {
        let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(session = %self.session, dropped = n, "persistence queue full; dropped oldest event");
        let _ = self.notices.try_send(SessionNotice::PersistenceDegraded {
            session: self.session,
            detail: format!("persistence queue full; {n} event(s) dropped"),
        });
    }

    /// Closes the queue and waits for every pending event to be handed to persistence.
    pub(crate) fn finish(mut self) -> ForwardStats {
        self.shutdown()
    }

    fn shutdown(&mut self) -> ForwardStats {
        self.tx.take();
        self.evict_rx.take();
        let mut stats = match self.join_handle.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(e)) => {
                tracing::warn!(?e, "forwarder thread panicked");
                ForwardStats::default()
            }
            None => ForwardStats::default(),
        };
        stats.dropped = self.dropped.load(Ordering::Relaxed);
        stats
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        if self.join_handle.is_some() {
            let _ = self.shutdown();
        }
    }
}
