//! Storage layer for vitalsync.
//!
//! This module provides the durable key-value surface the queue engine
//! persists into:
//! - `SqliteStore`: `kv_store` table in the vitalsync database
//! - `MemoryStore`: process-local map, used by tests

mod database;
mod kv;
mod migrations;

pub use database::Database;
pub use kv::{KeyValueStore, MemoryStore, SqliteStore};
