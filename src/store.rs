//! Appointment storage.
//!
//! `AppointmentStore` is the seam to whatever durable engine holds the
//! records. `InMemoryAppointmentStore` keeps them in a map and is what the
//! CLI snapshots to disk.

use crate::error::{ScheduleError, ScheduleResult};
use crate::models::{Appointment, AppointmentId, AppointmentStatus, UserId};
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

pub trait AppointmentStore: Send + Sync {
    /// Persist a new record. Fails if the id is already taken.
    fn insert(&self, appointment: Appointment) -> ScheduleResult<Appointment>;

    fn find_by_id(&self, id: AppointmentId) -> ScheduleResult<Option<Appointment>>;

    /// Appointments of `doctor_id` with `start <= scheduled_at <= end`.
    fn find_by_doctor_between(
        &self,
        doctor_id: UserId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> ScheduleResult<Vec<Appointment>>;

    /// Latest scheduled time first.
    fn find_by_patient(&self, patient_id: UserId) -> ScheduleResult<Vec<Appointment>>;

    /// Latest scheduled time first.
    fn find_by_doctor(&self, doctor_id: UserId) -> ScheduleResult<Vec<Appointment>>;

    fn find_by_status(&self, status: AppointmentStatus) -> ScheduleResult<Vec<Appointment>>;

    fn find_all(&self) -> ScheduleResult<Vec<Appointment>>;

    /// Insert or overwrite by id.
    fn save(&self, appointment: &Appointment) -> ScheduleResult<Appointment>;

    fn delete(&self, id: AppointmentId) -> ScheduleResult<Option<Appointment>>;
}

/// Latest scheduled time first; ties broken by id so listings are stable.
fn latest_first(a: &Appointment, b: &Appointment) -> Ordering {
    b.scheduled_at
        .cmp(&a.scheduled_at)
        .then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug, Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<AppointmentId, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_appointments(appointments: impl IntoIterator<Item = Appointment>) -> Self {
        InMemoryAppointmentStore {
            appointments: RwLock::new(appointments.into_iter().map(|a| (a.id, a)).collect()),
        }
    }

    fn select<F>(&self, keep: F) -> ScheduleResult<Vec<Appointment>>
    where
        F: Fn(&Appointment) -> bool,
    {
        let mut found: Vec<Appointment> = self
            .appointments
            .read()?
            .values()
            .filter(|a| keep(a))
            .cloned()
            .collect();
        found.sort_by(latest_first);
        Ok(found)
    }
}

impl AppointmentStore for InMemoryAppointmentStore {
    fn insert(&self, appointment: Appointment) -> ScheduleResult<Appointment> {
        let mut appointments = self.appointments.write()?;
        if appointments.contains_key(&appointment.id) {
            return Err(ScheduleError::Storage(format!(
                "appointment id already exists: {}",
                appointment.id
            )));
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    fn find_by_id(&self, id: AppointmentId) -> ScheduleResult<Option<Appointment>> {
        Ok(self.appointments.read()?.get(&id).cloned())
    }

    fn find_by_doctor_between(
        &self,
        doctor_id: UserId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> ScheduleResult<Vec<Appointment>> {
        self.select(|a| a.doctor_id == doctor_id && a.scheduled_at >= start && a.scheduled_at <= end)
    }

    fn find_by_patient(&self, patient_id: UserId) -> ScheduleResult<Vec<Appointment>> {
        self.select(|a| a.patient_id == patient_id)
    }

    fn find_by_doctor(&self, doctor_id: UserId) -> ScheduleResult<Vec<Appointment>> {
        self.select(|a| a.doctor_id == doctor_id)
    }

    fn find_by_status(&self, status: AppointmentStatus) -> ScheduleResult<Vec<Appointment>> {
        self.select(|a| a.status == status)
    }

    fn find_all(&self) -> ScheduleResult<Vec<Appointment>> {
        self.select(|_| true)
    }

    fn save(&self, appointment: &Appointment) -> ScheduleResult<Appointment> {
        self.appointments
            .write()?
            .insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    fn delete(&self, id: AppointmentId) -> ScheduleResult<Option<Appointment>> {
        Ok(self.appointments.write()?.remove(&id))
    }
}
