//! Configuration management for vitalsync.
//!
//! This module handles loading and saving configuration from the data root.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::{Config, GeneralConfig, LogConfig, QueueConfig};
