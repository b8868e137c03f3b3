//! vitalsync - offline mutation queue for the student health client
//!
//! Mutations made while a device is offline are persisted in a durable queue
//! and replayed against the remote API, in order, once connectivity returns.
//! The crate also ships a small CLI for inspecting and maintaining a queue
//! stored on disk.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod storage;
pub mod sync;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::VitalSyncError;
pub use sync::{DrainOutcome, MutationApplier, QueueEngine, QueueSettings};
