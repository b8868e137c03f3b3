//! Mutation kinds for the offline queue.
//!
//! Defines the client-side mutations that can be queued and their payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VitalSyncError;

/// Kinds of mutation that can be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Upload a vitals reading
    VitalUpload,
    /// Update a user profile
    ProfileUpdate,
    /// Acknowledge an alert
    AlertAcknowledge,
    /// Register a monitoring device
    DeviceRegister,
    /// Create a student record
    StudentCreate,
    /// Update a student record
    StudentUpdate,
}

impl MutationKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::VitalUpload,
        Self::ProfileUpdate,
        Self::AlertAcknowledge,
        Self::DeviceRegister,
        Self::StudentCreate,
        Self::StudentUpdate,
    ];

    /// Get the display name for this kind.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::VitalUpload => "Vital Upload",
            Self::ProfileUpdate => "Profile Update",
            Self::AlertAcknowledge => "Alert Acknowledge",
            Self::DeviceRegister => "Device Register",
            Self::StudentCreate => "Student Create",
            Self::StudentUpdate => "Student Update",
        }
    }

    /// Get the stable identifier used in storage and on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::VitalUpload => "vital_upload",
            Self::ProfileUpdate => "profile_update",
            Self::AlertAcknowledge => "alert_acknowledge",
            Self::DeviceRegister => "device_register",
            Self::StudentCreate => "student_create",
            Self::StudentUpdate => "student_update",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for MutationKind {
    type Err = VitalSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| VitalSyncError::InvalidInput(format!("Unknown mutation kind: {s}")))
    }
}

/// Payload for a vitals upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalReading {
    pub student_id: String,
    pub device_id: Option<String>,
    pub heart_rate: Option<u32>,
    pub temperature_c: Option<f64>,
    pub spo2: Option<u32>,
    pub systolic: Option<u32>,
    pub diastolic: Option<u32>,
    pub respiratory_rate: Option<u32>,
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Payload for a profile update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub emergency_contact: Option<String>,
}

/// Payload for acknowledging an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertAcknowledgement {
    pub alert_id: String,
    pub acknowledged_by: Option<String>,
    pub note: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// Payload for registering a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    pub device_id: String,
    pub device_type: String,
    pub student_id: Option<String>,
    pub firmware_version: Option<String>,
}

/// Payload for creating a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudent {
    pub student_id: String,
    pub name: String,
    pub grade: Option<String>,
    pub date_of_birth: Option<String>,
    pub guardian_contact: Option<String>,
}

/// Payload for updating a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentUpdate {
    pub student_id: String,
    pub name: Option<String>,
    pub grade: Option<String>,
    pub guardian_contact: Option<String>,
    pub medical_notes: Option<String>,
}

/// A client-side mutation together with its typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Mutation {
    VitalUpload(VitalReading),
    ProfileUpdate(ProfileUpdate),
    AlertAcknowledge(AlertAcknowledgement),
    DeviceRegister(DeviceRegistration),
    StudentCreate(NewStudent),
    StudentUpdate(StudentUpdate),
}

impl Mutation {
    /// Get the kind of this mutation.
    #[must_use]
    pub const fn kind(&self) -> MutationKind {
        match self {
            Self::VitalUpload(_) => MutationKind::VitalUpload,
            Self::ProfileUpdate(_) => MutationKind::ProfileUpdate,
            Self::AlertAcknowledge(_) => MutationKind::AlertAcknowledge,
            Self::DeviceRegister(_) => MutationKind::DeviceRegister,
            Self::StudentCreate(_) => MutationKind::StudentCreate,
            Self::StudentUpdate(_) => MutationKind::StudentUpdate,
        }
    }

    /// Build a mutation from a kind and a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match the kind's shape.
    pub fn from_json(kind: MutationKind, payload: &str) -> Result<Self, VitalSyncError> {
        let invalid = |e: serde_json::Error| {
            VitalSyncError::InvalidInput(format!("Invalid {kind} payload: {e}"))
        };

        Ok(match kind {
            MutationKind::VitalUpload => {
                Self::VitalUpload(serde_json::from_str(payload).map_err(invalid)?)
            },
            MutationKind::ProfileUpdate => {
                Self::ProfileUpdate(serde_json::from_str(payload).map_err(invalid)?)
            },
            MutationKind::AlertAcknowledge => {
                Self::AlertAcknowledge(serde_json::from_str(payload).map_err(invalid)?)
            },
            MutationKind::DeviceRegister => {
                Self::DeviceRegister(serde_json::from_str(payload).map_err(invalid)?)
            },
            MutationKind::StudentCreate => {
                Self::StudentCreate(serde_json::from_str(payload).map_err(invalid)?)
            },
            MutationKind::StudentUpdate => {
                Self::StudentUpdate(serde_json::from_str(payload).map_err(invalid)?)
            },
        })
    }

    /// Get the remote entity this mutation targets.
    #[must_use]
    pub fn target_id(&self) -> &str {
        match self {
            Self::VitalUpload(p) => &p.student_id,
            Self::ProfileUpdate(p) => &p.user_id,
            Self::AlertAcknowledge(p) => &p.alert_id,
            Self::DeviceRegister(p) => &p.device_id,
            Self::StudentCreate(p) => &p.student_id,
            Self::StudentUpdate(p) => &p.student_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(MutationKind::VitalUpload.display_name(), "Vital Upload");
        assert_eq!(MutationKind::StudentUpdate.to_string(), "Student Update");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(
            "vital_upload".parse::<MutationKind>().unwrap(),
            MutationKind::VitalUpload
        );
        assert_eq!(
            "Alert-Acknowledge".parse::<MutationKind>().unwrap(),
            MutationKind::AlertAcknowledge
        );
        assert!("teleport".parse::<MutationKind>().is_err());
    }

    #[test]
    fn test_mutation_kind_matches_variant() {
        let m = Mutation::from_json(
            MutationKind::StudentCreate,
            r#"{"student_id": "S-1", "name": "Ada"}"#,
        )
        .unwrap();
        assert_eq!(m.kind(), MutationKind::StudentCreate);
        assert_eq!(m.target_id(), "S-1");
    }

    #[test]
    fn test_from_json_minimal_vitals() {
        let m = Mutation::from_json(
            MutationKind::VitalUpload,
            r#"{"student_id": "S-9", "heart_rate": 180}"#,
        )
        .unwrap();

        let Mutation::VitalUpload(reading) = m else {
            panic!("Expected vital upload");
        };
        assert_eq!(reading.heart_rate, Some(180));
        assert!(reading.temperature_c.is_none());
        assert!(reading.recorded_at.is_none());
    }

    #[test]
    fn test_from_json_rejects_wrong_shape() {
        let err = Mutation::from_json(MutationKind::DeviceRegister, r#"{"student_id": "S-1"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Device Register"));
    }

    #[test]
    fn test_serialized_form_is_tagged() {
        let m = Mutation::AlertAcknowledge(AlertAcknowledgement {
            alert_id: "A-7".to_string(),
            acknowledged_by: Some("nurse".to_string()),
            note: None,
            acknowledged_at: None,
        });

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["kind"], "alert_acknowledge");
        assert_eq!(json["payload"]["alert_id"], "A-7");
    }
}
