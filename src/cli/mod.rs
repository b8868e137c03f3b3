//! Command-line interface for vitalsync.

pub mod args;
pub mod commands;
