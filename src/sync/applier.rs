//! Applier contract between the queue engine and the remote API.
//!
//! One method per mutation kind. An applier reports success, a retryable
//! failure or a conflict; it never decides what happens to the queue item.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use super::item::ConflictResolution;
use super::mutation::{
    AlertAcknowledgement, DeviceRegistration, Mutation, NewStudent, ProfileUpdate, StudentUpdate,
    VitalReading,
};

/// HTTP status the server uses for optimistic-concurrency rejections.
const HTTP_CONFLICT: u16 = 409;

/// Failure reported by an applier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// Transient failure (timeout, 5xx, offline). Retried up to the ceiling.
    #[error("{0}")]
    Retryable(String),
    /// The server's state diverged from what the mutation assumed.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl ApplyError {
    /// Create a retryable error.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable(message.into())
    }

    /// Create a conflict error.
    pub fn conflict(details: impl Into<String>) -> Self {
        Self::Conflict(details.into())
    }

    /// Classify a failed HTTP exchange.
    ///
    /// A 409 status, or a message mentioning a conflict, is a conflict;
    /// anything else is treated as retryable.
    #[must_use]
    pub fn from_response(status: Option<u16>, message: &str) -> Self {
        if status == Some(HTTP_CONFLICT) || message.to_lowercase().contains("conflict") {
            Self::Conflict(message.to_string())
        } else {
            match status {
                Some(code) => Self::Retryable(format!("{message} (HTTP {code})")),
                None => Self::Retryable(message.to_string()),
            }
        }
    }

    /// Whether this is a conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Outcome of a single apply call.
pub type ApplyResult = Result<(), ApplyError>;

/// Per-call information handed to the applier alongside the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyContext {
    /// Queue item ID. Stable across retries, usable as an idempotency key.
    pub item_id: String,
    /// 1-based attempt number since the last reset.
    pub attempt: u32,
    /// Conflict policy chosen for the item, if any.
    pub conflict_resolution: Option<ConflictResolution>,
}

impl ApplyContext {
    /// Whether the applier should take its force-overwrite path.
    #[must_use]
    pub const fn force_overwrite(&self) -> bool {
        matches!(self.conflict_resolution, Some(ConflictResolution::ClientWins))
    }
}

/// Remote operations the queue replays, one per mutation kind.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MutationApplier: Send + Sync {
    /// Upload a vitals reading.
    async fn upload_vitals(&self, ctx: &ApplyContext, reading: &VitalReading) -> ApplyResult;

    /// Update a user profile.
    async fn update_profile(&self, ctx: &ApplyContext, update: &ProfileUpdate) -> ApplyResult;

    /// Acknowledge an alert.
    async fn acknowledge_alert(&self, ctx: &ApplyContext, ack: &AlertAcknowledgement)
        -> ApplyResult;

    /// Register a device.
    async fn register_device(&self, ctx: &ApplyContext, device: &DeviceRegistration)
        -> ApplyResult;

    /// Create a student.
    async fn create_student(&self, ctx: &ApplyContext, student: &NewStudent) -> ApplyResult;

    /// Update a student.
    async fn update_student(&self, ctx: &ApplyContext, update: &StudentUpdate) -> ApplyResult;
}

/// Dispatch a mutation to the matching applier method.
pub async fn apply(
    applier: &dyn MutationApplier,
    ctx: &ApplyContext,
    mutation: &Mutation,
) -> ApplyResult {
    match mutation {
        Mutation::VitalUpload(reading) => applier.upload_vitals(ctx, reading).await,
        Mutation::ProfileUpdate(update) => applier.update_profile(ctx, update).await,
        Mutation::AlertAcknowledge(ack) => applier.acknowledge_alert(ctx, ack).await,
        Mutation::DeviceRegister(device) => applier.register_device(ctx, device).await,
        Mutation::StudentCreate(student) => applier.create_student(ctx, student).await,
        Mutation::StudentUpdate(update) => applier.update_student(ctx, update).await,
    }
}
