//! The `run` subcommand: one session from start to summary.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use torque_core::{
    ProfileCatalog, Report, RunOpts, SessionController, SessionError, SessionNotice, Summary,
    run_session,
};
use torque_feed::{SerialConnector, SimulatedFeed};

use crate::persist::{JsonlSink, summary_json};

pub struct RunArgs {
    pub profile: usize,
    pub input: Option<String>,
    pub baud: Option<u32>,
    pub out: Option<PathBuf>,
    pub summary_out: Option<PathBuf>,
    pub max_run_ms: Option<u64>,
    pub until_complete: bool,
    pub simulate: bool,
    pub live: bool,
}

pub fn run(
    cfg: &torque_config::Config,
    catalog: &ProfileCatalog,
    args: RunArgs,
    json: bool,
) -> eyre::Result<Summary> {
    let profile = catalog.get(args.profile).cloned().ok_or_else(|| {
        Report::new(SessionError::InvalidProfile(format!(
            "no profile at index {} ({} available)",
            args.profile,
            catalog.len()
        )))
    })?;

    let mut builder = SessionController::builder()
        .with_session_cfg((&cfg.session).into())
        .with_feed_cfg((&cfg.feed).into())
        .with_forward_cfg((&cfg.forwarding).into())
        .with_connector(Arc::new(SerialConnector::new(Duration::from_millis(
            cfg.feed.read_timeout_ms,
        ))));
    if let Some(path) = &args.out {
        let sink = JsonlSink::open(path)
            .wrap_err_with(|| format!("open sample log {}", path.display()))?;
        builder = builder.with_persistence(Arc::new(sink));
    }
    let mut controller = builder.build();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let mut stop_when_complete = args.until_complete;
    let session = if args.simulate {
        if args.max_run_ms.is_none() && !stop_when_complete {
            tracing::info!("simulated feed never ends; stopping once every range is full");
            stop_when_complete = true;
        }
        let targets = profile.ranges.iter().map(|r| r.center()).collect();
        let feed = SimulatedFeed::new(targets, 0x5EED_1234);
        controller.start(profile, Some(Box::new(feed)))?
    } else {
        let connection = args.input.as_deref().unwrap_or(&cfg.feed.connection);
        let baud = args.baud.unwrap_or(cfg.feed.baud);
        controller.open_and_start(profile, connection, baud)?
    };

    let live = match controller.summary_handle() {
        Some(handle) if args.live => Some(torque_ui::LiveView::spawn(
            handle,
            Duration::from_millis(cfg.display.refresh_ms),
            |table| {
                let mut err = std::io::stderr().lock();
                let _ = write!(err, "\x1b[2J\x1b[H{table}");
                let _ = err.flush();
            },
        )),
        _ => None,
    };

    let opts = RunOpts {
        max_run_ms: args.max_run_ms,
        stop_when_complete,
        shutdown: Some(shutdown),
        ..RunOpts::default()
    };
    let summary = run_session(&mut controller, session, &opts, log_notice)?;
    drop(live);

    if let Some(path) = &args.summary_out {
        let body = serde_json::to_vec_pretty(&summary_json(&summary))?;
        torque_core::atomic::write_atomic(path, &body)
            .wrap_err_with(|| format!("write summary {}", path.display()))?;
    }

    if json {
        println!("{}", summary_json(&summary));
    } else {
        print!("{}", torque_ui::render_summary(&summary));
    }
    Ok(summary)
}

fn log_notice(notice: &SessionNotice) {
    match notice {
        SessionNotice::SampleAccepted {
            range, value, seq, ..
        } => tracing::debug!(%range, value, seq, "sample accepted"),
        SessionNotice::Unmatched { .. } | SessionNotice::RangesFull { .. } => {
            tracing::debug!(?notice, "reading discarded");
        }
        SessionNotice::DecodeSkip { raw, .. } => tracing::debug!(%raw, "undecodable line skipped"),
        SessionNotice::PersistenceDegraded { detail, .. } => {
            tracing::warn!(%detail, "persistence degraded");
        }
        SessionNotice::FeedDisconnected { reason, .. } => {
            tracing::info!(%reason, "feed disconnected");
        }
        SessionNotice::Started { .. } | SessionNotice::Stopped { .. } => {
            tracing::trace!(?notice, "session notice");
        }
    }
}
