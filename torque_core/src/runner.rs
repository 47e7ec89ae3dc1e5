//! Drive a started session to its end from a single caller thread.
//!
//! Used by the CLI and by tests: forwards notices to a callback and issues the
//! operator stop on shutdown, on a runtime cap, or once every range is full.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::session::SessionController;
use crate::status::{SessionNotice, SessionState};
use crate::summary::Summary;
use crate::types::SessionId;

#[derive(Debug, Clone)]
pub struct RunOpts {
    /// Operator stop after this long. `None` waits for the feed to end.
    pub max_run_ms: Option<u64>,
    /// Stop as soon as every range holds its full quota.
    pub stop_when_complete: bool,
    /// External stop request (Ctrl-C).
    pub shutdown: Option<Arc<AtomicBool>>,
    /// How long to wait for a notice between checks.
    pub tick: Duration,
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            max_run_ms: None,
            stop_when_complete: false,
            shutdown: None,
            tick: Duration::from_millis(10),
        }
    }
}

/// Runs `session` (as returned by `start`) until it is finalized and returns its summary.
pub fn run_session<F>(
    controller: &mut SessionController,
    session: SessionId,
    opts: &RunOpts,
    mut on_notice: F,
) -> Result<Summary>
where
    F: FnMut(&SessionNotice),
{
    let notices = controller.notices();
    let start = Instant::now();

    let mut stop_sent = false;
    let stopped = loop {
        if let Ok(n) = notices.recv_timeout(opts.tick) {
            on_notice(&n);
            for n in notices.try_iter() {
                on_notice(&n);
            }
        }

        if controller.state() == SessionState::Idle {
            // Finalized by the worker (feed ended).
            break None;
        }
        if stop_sent {
            // The worker is already finalizing; wait for it to publish.
            continue;
        }
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        if opts
            .shutdown
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
        {
            tracing::info!(%session, "shutdown requested; stopping session");
        } else if opts.max_run_ms.is_some_and(|cap| elapsed_ms >= cap) {
            tracing::info!(%session, elapsed_ms, "run time cap reached; stopping session");
        } else if opts.stop_when_complete
            && controller
                .summary_handle()
                .is_some_and(|h| h.is_complete())
        {
            tracing::info!(%session, "all ranges full; stopping session");
        } else {
            continue;
        }
        stop_sent = true;
        if let Some(summary) = controller.stop() {
            break Some(summary);
        }
        tracing::debug!(%session, "session already stopping; waiting for finalize");
    };

    for n in notices.try_iter() {
        on_notice(&n);
    }

    let summary = stopped.or_else(|| controller.last_summary());
    match summary {
        Some(s) if s.session == session => Ok(s),
        _ => eyre::bail!("session {session} ended without a summary"),
    }
}
