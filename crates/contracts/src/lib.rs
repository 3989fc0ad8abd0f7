//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Flow
//! - `TaskEvent` is produced by ingestion and consumed by dispatcher sinks
//! - `QueueMetricsSnapshot` is produced by ingestion and consumed by observability

mod blueprint;
mod error;
mod event;
mod queue;
mod sink;

pub use blueprint::*;
pub use error::*;
pub use event::*;
pub use queue::*;
pub use sink::*;
