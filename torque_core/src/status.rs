//! Session lifecycle state and the advisory notices the engine emits.

use std::fmt;

use crate::types::{RangeId, SessionId};

/// Lifecycle of the single active session.
///
/// `Idle -> Running -> Stopping -> Idle`. `Stopping` is transient: it covers the
/// window between the cutover and the finalized summary becoming available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Stopping,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Operator,
    FeedDisconnected(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Operator => f.write_str("operator"),
            StopReason::FeedDisconnected(reason) => write!(f, "feed disconnected: {reason}"),
        }
    }
}

/// Asynchronous, advisory events. Losing one never changes session data.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Started {
        session: SessionId,
        profile: String,
    },
    SampleAccepted {
        session: SessionId,
        range: RangeId,
        value: f64,
        seq: u64,
    },
    /// Every matching range was already full.
    RangesFull {
        session: SessionId,
        value: f64,
        seq: u64,
    },
    /// The reading fell outside every range.
    Unmatched {
        session: SessionId,
        value: f64,
        seq: u64,
    },
    DecodeSkip {
        session: SessionId,
        raw: String,
    },
    PersistenceDegraded {
        session: SessionId,
        detail: String,
    },
    FeedDisconnected {
        session: SessionId,
        reason: String,
    },
    Stopped {
        session: SessionId,
        reason: StopReason,
        passed: bool,
    },
}

impl SessionNotice {
    pub fn session(&self) -> SessionId {
        match self {
            SessionNotice::Started { session, .. }
            | SessionNotice::SampleAccepted { session, .. }
            | SessionNotice::RangesFull { session, .. }
            | SessionNotice::Unmatched { session, .. }
            | SessionNotice::DecodeSkip { session, .. }
            | SessionNotice::PersistenceDegraded { session, .. }
            | SessionNotice::FeedDisconnected { session, .. }
            | SessionNotice::Stopped { session, .. } => *session,
        }
    }
}
