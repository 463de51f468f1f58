//! Error type shared by the scheduling engine, its collaborators and the front desk.
//!
//! Messages are written to be shown to the end user verbatim.

use crate::models::{Role, UserId};
use chrono::NaiveDateTime;
use std::fmt;
use std::sync::PoisonError;

/// The kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Patient,
    Doctor,
    Person,
    Appointment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Patient => "Patient",
            EntityKind::Doctor => "Doctor",
            EntityKind::Person => "Person",
            EntityKind::Appointment => "Appointment",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("{kind} not found with id: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Doctor is not available at the requested time")]
    SchedulingConflict {
        doctor_id: UserId,
        requested: NaiveDateTime,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{role} is not permitted to {action}")]
    Forbidden { role: Role, action: &'static str },

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("failed to read snapshot file: {0}")]
    SnapshotRead(std::io::Error),
    #[error("failed to write snapshot file: {0}")]
    SnapshotWrite(std::io::Error),
    #[error("malformed snapshot file: {0}")]
    SnapshotFormat(serde_json::Error),
    #[error("failed to lock snapshot file: {0}")]
    SnapshotLock(std::io::Error),
}

impl ScheduleError {
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        ScheduleError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ScheduleError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ScheduleError::SchedulingConflict { .. })
    }
}

impl<T> From<PoisonError<T>> for ScheduleError {
    fn from(err: PoisonError<T>) -> Self {
        ScheduleError::Storage(format!("lock poisoned: {err}"))
    }
}

pub type ScheduleResult<T> = std::result::Result<T, ScheduleError>;
