//! Data models for the clinic scheduling system.
//!
//! This module defines the records the engine works with:
//! - `UserId` / `AppointmentId`: opaque identifiers
//! - `Role`: what a person is allowed to do at the front desk
//! - `Person`: an entry in the identity directory
//! - `AppointmentStatus`: the appointment state value
//! - `Appointment`: a booked visit between a patient and a doctor

use crate::error::{ScheduleError, ScheduleResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Accepted input formats for scheduled times, most specific first.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                $name(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = ScheduleError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(value.trim()).map($name).map_err(|_| {
                    ScheduleError::Validation(format!("Invalid {}: '{}'", $label, value))
                })
            }
        }
    };
}

uuid_id!(
    /// Identifier of a person in the identity directory.
    UserId,
    "user id"
);

uuid_id!(
    /// Identifier of an appointment, assigned at booking and never changed.
    AppointmentId,
    "appointment id"
);

/// Parse a scheduled time such as `2024-01-10T09:00:00`.
pub fn parse_timestamp(value: &str) -> ScheduleResult<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| {
            ScheduleError::Validation(format!(
                "Invalid date-time: '{}'. Expected YYYY-MM-DDTHH:MM:SS",
                value
            ))
        })
}

/// Role of a person, as resolved by the authorization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Patient => "PATIENT",
            Role::Doctor => "DOCTOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = ScheduleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            _ => Err(ScheduleError::Validation(format!(
                "Invalid role: '{}'. Must be one of: patient, doctor, admin",
                value
            ))),
        }
    }
}

/// A person known to the identity directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: UserId,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
}

impl Person {
    /// Create a new person with a fresh id.
    pub fn new(role: Role, first_name: &str, last_name: &str) -> ScheduleResult<Self> {
        let first_name = first_name.trim();
        let last_name = last_name.trim();
        if first_name.is_empty() {
            return Err(ScheduleError::Validation(
                "First name cannot be empty".to_string(),
            ));
        }
        if last_name.is_empty() {
            return Err(ScheduleError::Validation(
                "Last name cannot be empty".to_string(),
            ));
        }

        Ok(Person {
            id: UserId::new(),
            role,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            specialization: None,
        })
    }

    pub fn with_specialization(mut self, specialization: impl Into<String>) -> Self {
        self.specialization = Some(specialization.into());
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Appointment state.
///
/// The engine stores whatever status it is given; changes that
/// `can_transition_to` rejects are only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
        }
    }

    /// Scheduled or confirmed, i.e. still expected to happen.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Scheduled | AppointmentStatus::Confirmed
        )
    }

    /// Nominal flow: SCHEDULED -> CONFIRMED -> COMPLETED, CANCELLED from anywhere.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        match (self, next) {
            (_, Cancelled) => true,
            (Scheduled, Confirmed) | (Confirmed, Completed) => true,
            (current, next) => *current == next,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AppointmentStatus {
    type Err = ScheduleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        if wanted.is_empty() {
            return Err(ScheduleError::Validation("Status is required".to_string()));
        }
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ScheduleError::Validation(format!(
                    "Invalid status: '{}'. Must be one of: SCHEDULED, CONFIRMED, COMPLETED, CANCELLED",
                    value
                ))
            })
    }
}

/// A booked visit between a patient and a doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_id: UserId,
    pub doctor_id: UserId,
    pub scheduled_at: NaiveDateTime,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    /// Create a new appointment in the `SCHEDULED` state.
    pub fn new(
        patient_id: UserId,
        doctor_id: UserId,
        scheduled_at: NaiveDateTime,
        reason: Option<String>,
        now: NaiveDateTime,
    ) -> Self {
        Appointment {
            id: AppointmentId::new(),
            patient_id,
            doctor_id,
            scheduled_at,
            status: AppointmentStatus::Scheduled,
            reason,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a new time. Any earlier confirmation or cancellation is dropped.
    pub fn reschedule_to(&mut self, scheduled_at: NaiveDateTime, now: NaiveDateTime) {
        self.scheduled_at = scheduled_at;
        self.status = AppointmentStatus::Scheduled;
        self.updated_at = now;
    }

    pub fn set_status(&mut self, status: AppointmentStatus, now: NaiveDateTime) {
        self.status = status;
        self.updated_at = now;
    }

    /// Replace the notes wholesale; an empty string clears them.
    pub fn set_notes(&mut self, notes: &str, now: NaiveDateTime) {
        self.notes = if notes.is_empty() {
            None
        } else {
            Some(notes.to_string())
        };
        self.updated_at = now;
    }
}
