//! Session controller: the operator-facing command surface.
//!
//! Owns at most one active session. Commands are synchronous and return typed
//! errors (`SessionError` wrapped in `eyre::Report`); everything that happens
//! on the feed worker is reported through `SessionNotice`s.

use crossbeam_channel as xch;
use std::sync::Arc;
use torque_traits::clock::{Clock, MonotonicClock};
use torque_traits::{FeedConnector, SensorFeed};

use crate::bank::{BankSnapshot, SampleBank};
use crate::config::{FeedCfg, ForwardCfg, SessionCfg};
use crate::engine::{FeedWorker, Shared, WorkerCtx};
use crate::error::{Report, Result, SessionError};
use crate::forwarder::Forwarder;
use crate::persist::{NullPersistence, Persistence};
use crate::profile::ToleranceProfile;
use crate::status::{SessionNotice, SessionState};
use crate::summary::{Summary, SummaryHandle, SummaryRow, project_snapshot};
use crate::types::SessionId;

/// Notices beyond this many undrained are dropped.
const NOTICE_CAPACITY: usize = 1024;

struct Active {
    id: SessionId,
    handle: SummaryHandle,
    worker: FeedWorker,
}

pub struct SessionController {
    session_cfg: SessionCfg,
    feed_cfg: FeedCfg,
    forward_cfg: ForwardCfg,
    persistence: Arc<dyn Persistence>,
    clock: Arc<dyn Clock + Send + Sync>,
    connector: Option<Arc<dyn FeedConnector + Send + Sync>>,
    shared: Arc<Shared>,
    selected: Option<ToleranceProfile>,
    active: Option<Active>,
    next_session: u64,
    notices_tx: xch::Sender<SessionNotice>,
    notices_rx: xch::Receiver<SessionNotice>,
}

impl core::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .field("session", &self.active.as_ref().map(|a| a.id))
            .field(
                "selected",
                &self.selected.as_ref().map(ToleranceProfile::display_name),
            )
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct SessionControllerBuilder {
    session_cfg: Option<SessionCfg>,
    feed_cfg: Option<FeedCfg>,
    forward_cfg: Option<ForwardCfg>,
    persistence: Option<Arc<dyn Persistence>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    connector: Option<Arc<dyn FeedConnector + Send + Sync>>,
}

impl SessionControllerBuilder {
    #[must_use]
    pub fn with_session_cfg(mut self, cfg: SessionCfg) -> Self {
        self.session_cfg = Some(cfg);
        self
    }

    #[must_use]
    pub fn with_feed_cfg(mut self, cfg: FeedCfg) -> Self {
        self.feed_cfg = Some(cfg);
        self
    }

    #[must_use]
    pub fn with_forward_cfg(mut self, cfg: ForwardCfg) -> Self {
        self.forward_cfg = Some(cfg);
        self
    }

    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Used by `open_and_start` to turn a connection string into a feed.
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn FeedConnector + Send + Sync>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn build(self) -> SessionController {
        let (notices_tx, notices_rx) = xch::bounded(NOTICE_CAPACITY);
        SessionController {
            session_cfg: self.session_cfg.unwrap_or_default(),
            feed_cfg: self.feed_cfg.unwrap_or_default(),
            forward_cfg: self.forward_cfg.unwrap_or_default(),
            persistence: self.persistence.unwrap_or_else(|| Arc::new(NullPersistence)),
            clock: self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            connector: self.connector,
            shared: Arc::new(Shared::default()),
            selected: None,
            active: None,
            next_session: 1,
            notices_tx,
            notices_rx,
        }
    }
}

impl SessionController {
    pub fn builder() -> SessionControllerBuilder {
        SessionControllerBuilder::default()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Id of the session currently running or stopping.
    pub fn session_id(&self) -> Option<SessionId> {
        if self.state() == SessionState::Idle {
            return None;
        }
        self.active.as_ref().map(|a| a.id)
    }

    pub fn session_cfg(&self) -> &SessionCfg {
        &self.session_cfg
    }

    /// Receiver for advisory notices. Every clone competes for the same queue.
    pub fn notices(&self) -> xch::Receiver<SessionNotice> {
        self.notices_rx.clone()
    }

    fn ensure_idle(&mut self, command: &'static str) -> Result<()> {
        self.reap();
        match self.state() {
            SessionState::Idle => Ok(()),
            state => Err(Report::new(SessionError::SessionBusy { command, state })),
        }
    }

    /// Joins a worker that finalized on its own (feed disconnect).
    fn reap(&mut self) {
        if self.state() == SessionState::Idle
            && let Some(active) = self.active.take()
        {
            let _ = active.worker.join();
        }
    }

    /// Makes `profile` the one `start_selected` and `preview` use.
    pub fn select_profile(&mut self, profile: ToleranceProfile) -> Result<()> {
        self.ensure_idle("select a profile")?;
        profile.validate().map_err(Report::new)?;
        tracing::debug!(profile = %profile.display_name(), "profile selected");
        self.selected = Some(profile);
        Ok(())
    }

    pub fn selected_profile(&self) -> Option<&ToleranceProfile> {
        self.selected.as_ref()
    }

    /// Empty table for the selected profile, shown before a session starts.
    pub fn preview(&self) -> Option<Vec<SummaryRow>> {
        let profile = self.selected.as_ref()?;
        let empty = BankSnapshot::empty(profile.ranges.len(), self.session_cfg.capacity_per_range);
        Some(project_snapshot(profile, &empty))
    }

    /// Begins a session against `profile`, consuming `feed`.
    ///
    /// Checks, in order: no session active (`SessionBusy`), profile has ranges
    /// (`InvalidProfile`), feed present (`NoFeed`). Nothing changes on error.
    pub fn start(
        &mut self,
        profile: ToleranceProfile,
        feed: Option<Box<dyn SensorFeed + Send>>,
    ) -> Result<SessionId> {
        self.ensure_idle("start")?;
        profile.validate().map_err(Report::new)?;
        let feed = feed.ok_or_else(|| {
            Report::new(SessionError::NoFeed("no sensor feed attached".to_string()))
        })?;

        let id = SessionId(self.next_session);
        self.next_session += 1;
        let profile = Arc::new(profile);
        let bank = Arc::new(SampleBank::new(
            profile.ranges.len(),
            self.session_cfg.capacity_per_range,
        ));
        let forwarder = Forwarder::spawn(
            Arc::clone(&self.persistence),
            &self.forward_cfg,
            id,
            self.notices_tx.clone(),
        );

        self.shared.set_state(SessionState::Running);
        let name = profile.display_name();
        tracing::info!(session = %id, profile = %name, "session started");
        let _ = self.notices_tx.try_send(SessionNotice::Started {
            session: id,
            profile: name,
        });

        let worker = FeedWorker::spawn(WorkerCtx {
            session: id,
            profile: Arc::clone(&profile),
            bank: Arc::clone(&bank),
            feed,
            forwarder,
            shared: Arc::clone(&self.shared),
            notices: self.notices_tx.clone(),
            clock: Arc::clone(&self.clock),
            poll: self.feed_cfg.poll(),
        });
        self.active = Some(Active {
            id,
            handle: SummaryHandle::new(profile, bank),
            worker,
        });
        Ok(id)
    }

    pub fn start_selected(&mut self, feed: Option<Box<dyn SensorFeed + Send>>) -> Result<SessionId> {
        let profile = self.selected.clone().ok_or_else(|| {
            Report::new(SessionError::InvalidProfile(
                "no profile selected".to_string(),
            ))
        })?;
        self.start(profile, feed)
    }

    /// Opens `connection` through the configured connector, then starts.
    pub fn open_and_start(
        &mut self,
        profile: ToleranceProfile,
        connection: &str,
        baud: u32,
    ) -> Result<SessionId> {
        self.ensure_idle("start")?;
        profile.validate().map_err(Report::new)?;
        let connector = self.connector.as_ref().ok_or_else(|| {
            Report::new(SessionError::NoFeed(
                "no feed connector configured".to_string(),
            ))
        })?;
        let feed = connector.open(connection, baud).map_err(|e| {
            tracing::warn!(%connection, baud, error = %e, "failed to open feed");
            Report::new(SessionError::NoFeed(format!("{connection}: {e}")))
        })?;
        self.start(profile, Some(feed))
    }

    /// Cutover and finalize. Returns the summary of the session it stopped.
    ///
    /// A no-op returning `None` when idle or already stopping.
    ///
    /// Returns only after the persistence queue has drained and the summary
    /// record has been handed over, so with a slow sink the wait grows with the
    /// backlog. A bounded `ForwardCfg::queue_capacity` caps that backlog.
    pub fn stop(&mut self) -> Option<Summary> {
        self.reap();
        let active = self.active.take()?;
        if !self.shared.begin_stop() {
            self.active = Some(active);
            return None;
        }
        active.worker.cancel();
        tracing::debug!(session = %active.id, "stop requested");
        let summary = active.worker.join();
        if summary.is_none() {
            self.shared.set_state(SessionState::Idle);
        }
        summary
    }

    /// Most recently finalized summary, from any stop cause.
    pub fn last_summary(&self) -> Option<Summary> {
        self.shared.last_summary()
    }

    /// Read-only view of the running session's bank.
    pub fn summary_handle(&self) -> Option<SummaryHandle> {
        if self.state() == SessionState::Idle {
            return None;
        }
        self.active.as_ref().map(|a| a.handle.clone())
    }

    /// Current table: the running session if any, else the selected profile's preview.
    pub fn live_summary(&self) -> Option<Vec<SummaryRow>> {
        match self.summary_handle() {
            Some(handle) => Some(handle.project()),
            None => self.preview(),
        }
    }
}
