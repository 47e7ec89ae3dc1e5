#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Torque bench session engine (transport-agnostic).
//!
//! All sensor I/O goes through `torque_traits::SensorFeed`; all storage goes
//! through `persist::Persistence`.
//!
//! ## Architecture
//!
//! - **Profiles**: tolerance ranges per tool rating (`profile` module)
//! - **Matching**: pure reading → range classification (`matcher` module)
//! - **Bank**: capped per-range sample buckets (`bank` module)
//! - **Summary**: tabular projection with absent-slot padding (`summary` module)
//! - **Controller**: start/stop/select with a clean cutover (`session` module)
//! - **Forwarding**: ordered, non-blocking persistence hand-off (`forwarder` module)
//!
//! One feed worker thread per session is the only writer to the bank. The
//! controller flips a cancel flag and joins the worker on stop; the worker
//! checks the flag before accepting each reading.

pub mod atomic;
pub mod bank;
pub mod config;
pub mod conversions;
mod engine;
pub mod error;
mod forwarder;
pub mod matcher;
pub mod mocks;
pub mod persist;
pub mod profile;
pub mod runner;
pub mod session;
pub mod status;
pub mod summary;
pub mod types;

pub use bank::{BankSnapshot, SampleBank};
pub use config::{FeedCfg, ForwardCfg, SessionCfg};
pub use error::{Report, Result, SessionError};
pub use forwarder::ForwardStats;
pub use matcher::{MatchResult, classify};
pub use persist::{NullPersistence, Persistence, SampleRecord};
pub use profile::{ProfileCatalog, ToleranceProfile, ToleranceRange, ToolKind};
pub use runner::{RunOpts, run_session};
pub use session::{SessionController, SessionControllerBuilder};
pub use status::{SessionNotice, SessionState, StopReason};
pub use summary::{SampleSlot, Summary, SummaryHandle, SummaryRow, project, project_snapshot};
pub use types::{RangeId, SessionId};

pub use torque_traits::clock::{Clock, ManualClock, MonotonicClock};
