//! Sensor feeds for the torque bench.
//!
//! - `LineFeed`: any line-oriented source (stdin, file replay, serial tty)
//! - `SimulatedFeed`: synthetic readings around a set of targets
//! - `SerialConnector`: `FeedConnector` opening connections by id
pub mod connector;
pub mod decode;
pub mod error;
pub mod line_feed;
pub mod sim;

pub use connector::{STDIN, SerialConnector};
pub use decode::parse_torque_value;
pub use error::FeedError;
pub use line_feed::LineFeed;
pub use sim::SimulatedFeed;
