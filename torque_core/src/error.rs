use thiserror::Error;

use crate::status::SessionState;

/// Synchronous command rejections. The session state is unchanged when returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    #[error("no sensor feed: {0}")]
    NoFeed(String),
    #[error("session busy: cannot {command} while {state}")]
    SessionBusy {
        command: &'static str,
        state: SessionState,
    },
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
