//! Double-booking detection.
//!
//! A doctor is busy at `t` when any of their appointments is scheduled in
//! `[t - 30min, t + 30min]`, both ends inclusive. Appointments have no
//! duration; the window stands in for one. Every status counts, including
//! `CANCELLED`.

use crate::error::ScheduleResult;
use crate::models::{Appointment, AppointmentId, UserId};
use crate::store::AppointmentStore;
use chrono::{Duration, NaiveDateTime};
use tracing::debug;

/// Half-width of the protection window around a scheduled time.
pub const PROTECTION_WINDOW_MINUTES: i64 = 30;

pub fn protection_window() -> Duration {
    Duration::minutes(PROTECTION_WINDOW_MINUTES)
}

/// Bounds of the protection window around `candidate`, clamped to the
/// representable range.
pub fn window_around(candidate: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let half = protection_window();
    let start = candidate
        .checked_sub_signed(half)
        .unwrap_or(NaiveDateTime::MIN);
    let end = candidate
        .checked_add_signed(half)
        .unwrap_or(NaiveDateTime::MAX);
    (start, end)
}

/// Read-only view over a store that answers "is this doctor free?".
pub struct ConflictDetector<'a, S: AppointmentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: AppointmentStore + ?Sized> ConflictDetector<'a, S> {
    pub fn new(store: &'a S) -> Self {
        ConflictDetector { store }
    }

    /// Appointments that block `doctor_id` at `candidate`, minus `exclude`.
    pub fn conflicts(
        &self,
        doctor_id: UserId,
        candidate: NaiveDateTime,
        exclude: Option<AppointmentId>,
    ) -> ScheduleResult<Vec<Appointment>> {
        let (start, end) = window_around(candidate);
        let mut found = self.store.find_by_doctor_between(doctor_id, start, end)?;
        if let Some(excluded) = exclude {
            found.retain(|a| a.id != excluded);
        }

        debug!(
            doctor_id = %doctor_id,
            candidate = %candidate,
            window_start = %start,
            window_end = %end,
            blocking = found.len(),
            "checked protection window"
        );
        Ok(found)
    }

    pub fn has_conflict(
        &self,
        doctor_id: UserId,
        candidate: NaiveDateTime,
        exclude: Option<AppointmentId>,
    ) -> ScheduleResult<bool> {
        Ok(!self.conflicts(doctor_id, candidate, exclude)?.is_empty())
    }
}
