//! Appointment scheduling engine.
//!
//! `AppointmentScheduler` books, reschedules and updates appointments on top
//! of an `AppointmentStore` and an `IdentityDirectory`. Every write for a
//! doctor runs inside that doctor's critical section, so the conflict check
//! and the write that follows it cannot interleave with another booking for
//! the same doctor.

use crate::clock::{Clock, SystemClock};
use crate::conflict::ConflictDetector;
use crate::directory::IdentityDirectory;
use crate::error::{EntityKind, ScheduleError, ScheduleResult};
use crate::models::{Appointment, AppointmentId, AppointmentStatus, UserId};
use crate::store::AppointmentStore;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// One mutex per doctor, created on first use.
#[derive(Debug, Default)]
struct DoctorLocks {
    table: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl DoctorLocks {
    fn handle(&self, doctor_id: UserId) -> ScheduleResult<Arc<Mutex<()>>> {
        let mut table = self.table.lock()?;
        Ok(Arc::clone(table.entry(doctor_id).or_default()))
    }
}

pub struct AppointmentScheduler<S, D> {
    store: S,
    directory: D,
    clock: Arc<dyn Clock>,
    locks: DoctorLocks,
}

impl<S, D> AppointmentScheduler<S, D>
where
    S: AppointmentStore,
    D: IdentityDirectory,
{
    /// Initialize the scheduler with the wall clock.
    pub fn new(store: S, directory: D) -> Self {
        Self::with_clock(store, directory, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, directory: D, clock: Arc<dyn Clock>) -> Self {
        AppointmentScheduler {
            store,
            directory,
            clock,
            locks: DoctorLocks::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Run `f` while holding `doctor_id`'s lock.
    fn exclusive<T>(
        &self,
        doctor_id: UserId,
        f: impl FnOnce() -> ScheduleResult<T>,
    ) -> ScheduleResult<T> {
        let handle = self.locks.handle(doctor_id)?;
        let _guard = handle.lock()?;
        f()
    }

    fn require_free(
        &self,
        doctor_id: UserId,
        time: NaiveDateTime,
        exclude: Option<AppointmentId>,
    ) -> ScheduleResult<()> {
        if ConflictDetector::new(&self.store).has_conflict(doctor_id, time, exclude)? {
            warn!(
                doctor_id = %doctor_id,
                requested = %time,
                "doctor is not available"
            );
            return Err(ScheduleError::SchedulingConflict {
                doctor_id,
                requested: time,
            });
        }
        Ok(())
    }

    fn load(&self, id: AppointmentId) -> ScheduleResult<Appointment> {
        self.store
            .find_by_id(id)?
            .ok_or_else(|| ScheduleError::not_found(EntityKind::Appointment, id))
    }

    /// Load `id`, then re-read and mutate it inside its doctor's lock.
    fn modify<F>(&self, id: AppointmentId, f: F) -> ScheduleResult<Appointment>
    where
        F: FnOnce(&mut Appointment) -> ScheduleResult<()>,
    {
        let doctor_id = self.load(id)?.doctor_id;
        self.exclusive(doctor_id, || {
            let mut appointment = self.load(id)?;
            f(&mut appointment)?;
            self.store.save(&appointment)
        })
    }

    /// Book a new appointment for `patient_id` with `doctor_id` at `time`.
    pub fn book_appointment(
        &self,
        patient_id: UserId,
        doctor_id: UserId,
        time: NaiveDateTime,
        reason: Option<String>,
    ) -> ScheduleResult<Appointment> {
        self.directory.resolve(patient_id, EntityKind::Patient)?;
        self.directory.resolve(doctor_id, EntityKind::Doctor)?;

        let appointment = self.exclusive(doctor_id, || {
            self.require_free(doctor_id, time, None)?;
            let appointment = Appointment::new(patient_id, doctor_id, time, reason, self.now());
            self.store.insert(appointment)
        })?;

        info!(
            appointment_id = %appointment.id,
            patient_id = %patient_id,
            doctor_id = %doctor_id,
            scheduled_at = %time,
            "appointment booked"
        );
        Ok(appointment)
    }

    /// Move an appointment to `new_time`. The status always goes back to
    /// `SCHEDULED`, whatever it was before.
    pub fn reschedule_appointment(
        &self,
        id: AppointmentId,
        new_time: NaiveDateTime,
    ) -> ScheduleResult<Appointment> {
        let appointment = self.modify(id, |appointment| {
            self.require_free(appointment.doctor_id, new_time, Some(id))?;
            appointment.reschedule_to(new_time, self.now());
            Ok(())
        })?;

        info!(
            appointment_id = %id,
            doctor_id = %appointment.doctor_id,
            scheduled_at = %new_time,
            "appointment rescheduled"
        );
        Ok(appointment)
    }

    /// Overwrite the status. Changes off the usual lifecycle are logged but
    /// never refused.
    pub fn update_appointment_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> ScheduleResult<Appointment> {
        let mut previous = status;
        let appointment = self.modify(id, |appointment| {
            previous = appointment.status;
            appointment.set_status(status, self.now());
            Ok(())
        })?;

        if !previous.can_transition_to(status) {
            warn!(
                appointment_id = %id,
                from = %previous,
                to = %status,
                "status change outside the usual lifecycle"
            );
        }
        info!(
            appointment_id = %id,
            from = %previous,
            to = %status,
            "appointment status updated"
        );
        Ok(appointment)
    }

    pub fn cancel_appointment(&self, id: AppointmentId) -> ScheduleResult<Appointment> {
        self.update_appointment_status(id, AppointmentStatus::Cancelled)
    }

    /// Replace the doctor's notes on an appointment.
    pub fn update_appointment_notes(
        &self,
        id: AppointmentId,
        notes: &str,
    ) -> ScheduleResult<Appointment> {
        let appointment = self.modify(id, |appointment| {
            appointment.set_notes(notes, self.now());
            Ok(())
        })?;

        info!(appointment_id = %id, "appointment notes updated");
        Ok(appointment)
    }

    /// Remove the record outright. This is an administrative action, not a
    /// status change.
    pub fn delete_appointment(&self, id: AppointmentId) -> ScheduleResult<Appointment> {
        let doctor_id = self.load(id)?.doctor_id;
        let removed = self.exclusive(doctor_id, || {
            self.store
                .delete(id)?
                .ok_or_else(|| ScheduleError::not_found(EntityKind::Appointment, id))
        })?;

        info!(appointment_id = %id, doctor_id = %doctor_id, "appointment deleted");
        Ok(removed)
    }

    pub fn get_appointment(&self, id: AppointmentId) -> ScheduleResult<Option<Appointment>> {
        self.store.find_by_id(id)
    }

    pub fn appointments_for_patient(&self, patient_id: UserId) -> ScheduleResult<Vec<Appointment>> {
        self.store.find_by_patient(patient_id)
    }

    pub fn appointments_for_doctor(&self, doctor_id: UserId) -> ScheduleResult<Vec<Appointment>> {
        self.store.find_by_doctor(doctor_id)
    }

    pub fn appointments_with_status(
        &self,
        status: AppointmentStatus,
    ) -> ScheduleResult<Vec<Appointment>> {
        self.store.find_by_status(status)
    }

    pub fn all_appointments(&self) -> ScheduleResult<Vec<Appointment>> {
        self.store.find_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::conflict::PROTECTION_WINDOW_MINUTES;
    use crate::directory::InMemoryDirectory;
    use crate::models::{Person, Role};
    use crate::store::InMemoryAppointmentStore;
    use chrono::{Duration, NaiveDate};
    use std::thread;

    type Scheduler = AppointmentScheduler<InMemoryAppointmentStore, InMemoryDirectory>;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    struct Clinic {
        scheduler: Scheduler,
        clock: Arc<FixedClock>,
        doctor: UserId,
        patient: UserId,
        other_patient: UserId,
    }

    fn clinic() -> Clinic {
        let directory = InMemoryDirectory::new();
        let doctor = directory
            .register(Person::new(Role::Doctor, "John", "Smith").unwrap())
            .unwrap()
            .id;
        let patient = directory
            .register(Person::new(Role::Patient, "Jane", "Doe").unwrap())
            .unwrap()
            .id;
        let other_patient = directory
            .register(Person::new(Role::Patient, "Bob", "Wilson").unwrap())
            .unwrap()
            .id;
        let clock = Arc::new(FixedClock::new(at(7, 0)));
        let scheduler = AppointmentScheduler::with_clock(
            InMemoryAppointmentStore::new(),
            directory,
            clock.clone(),
        );
        Clinic {
            scheduler,
            clock,
            doctor,
            patient,
            other_patient,
        }
    }

    #[test]
    fn booking_creates_a_scheduled_appointment() {
        let c = clinic();
        let apt = c
            .scheduler
            .book_appointment(c.patient, c.doctor, at(9, 0), Some("Annual checkup".into()))
            .unwrap();

        assert_eq!(apt.status, AppointmentStatus::Scheduled);
        assert_eq!(apt.reason.as_deref(), Some("Annual checkup"));
        assert_eq!(apt.created_at, at(7, 0));
        assert_eq!(apt.updated_at, at(7, 0));
        assert_eq!(c.scheduler.get_appointment(apt.id).unwrap(), Some(apt));
    }

    #[test]
    fn booking_unknown_people_fails_and_persists_nothing() {
        let c = clinic();

        let err = c
            .scheduler
            .book_appointment(UserId::new(), c.doctor, at(9, 0), None)
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::NotFound {
                kind: EntityKind::Patient,
                ..
            }
        ));

        let err = c
            .scheduler
            .book_appointment(c.patient, UserId::new(), at(9, 0), None)
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::NotFound {
                kind: EntityKind::Doctor,
                ..
            }
        ));

        assert!(c.scheduler.all_appointments().unwrap().is_empty());
    }

    #[test]
    fn twenty_minutes_apart_conflicts_thirty_one_does_not() {
        let c = clinic();
        c.scheduler
            .book_appointment(c.patient, c.doctor, at(9, 0), None)
            .unwrap();

        let err = c
            .scheduler
            .book_appointment(c.other_patient, c.doctor, at(9, 20), None)
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Doctor is not available at the requested time");

        let err = c
            .scheduler
            .book_appointment(c.other_patient, c.doctor, at(9, 30), None)
            .unwrap_err();
        assert!(err.is_conflict());

        c.scheduler
            .book_appointment(c.other_patient, c.doctor, at(9, 31), None)
            .unwrap();
        assert_eq!(c.scheduler.all_appointments().unwrap().len(), 2);
    }

    #[test]
    fn cancelled_appointment_still_blocks_its_slot() {
        let c = clinic();
        let x = c
            .scheduler
            .book_appointment(c.patient, c.doctor, at(10, 0), None)
            .unwrap();
        c.scheduler.cancel_appointment(x.id).unwrap();

        let err = c
            .scheduler
            .book_appointment(c.other_patient, c.doctor, at(10, 5), None)
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn reschedule_resets_confirmed_to_scheduled() {
        let c = clinic();
        let x = c
            .scheduler
            .book_appointment(c.patient, c.doctor, at(10, 0), None)
            .unwrap();
        c.scheduler
            .update_appointment_status(x.id, AppointmentStatus::Confirmed)
            .unwrap();

        c.clock.advance(Duration::minutes(10));
        let moved = c.scheduler.reschedule_appointment(x.id, at(14, 0)).unwrap();

        assert_eq!(moved.status, AppointmentStatus::Scheduled);
        assert_eq!(moved.scheduled_at, at(14, 0));
        assert_eq!(moved.created_at, at(7, 0));
        assert_eq!(moved.updated_at, at(7, 10));
    }

    #[test]
    fn reschedule_uncancels() {
        let c = clinic();
        let x = c
            .scheduler
            .book_appointment(c.patient, c.doctor, at(10, 0), None)
            .unwrap();
        c.scheduler.cancel_appointment(x.id).unwrap();

        let moved = c.scheduler.reschedule_appointment(x.id, at(16, 0)).unwrap();
        assert_eq!(moved.status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn reschedule_to_own_time_or_nearby_does_not_self_conflict() {
        let c = clinic();
        let x = c
            .scheduler
            .book_appointment(c.patient, c.doctor, at(10, 0), None)
            .unwrap();

        c.scheduler.reschedule_appointment(x.id, at(10, 0)).unwrap();
        c.scheduler.reschedule_appointment(x.id, at(10, 15)).unwrap();
    }

    #[test]
    fn reschedule_into_another_window_fails_without_changes() {
        let c = clinic();
        let x = c
            .scheduler
            .book_appointment(c.patient, c.doctor, at(10, 0), None)
            .unwrap();
        c.scheduler
            .book_appointment(c.other_patient, c.doctor, at(12, 0), None)
            .unwrap();
        c.scheduler
            .update_appointment_status(x.id, AppointmentStatus::Confirmed)
            .unwrap();

        let err = c
            .scheduler
            .reschedule_appointment(x.id, at(11, 45))
            .unwrap_err();
        assert!(err.is_conflict());

        let unchanged = c.scheduler.get_appointment(x.id).unwrap().unwrap();
        assert_eq!(unchanged.scheduled_at, at(10, 0));
        assert_eq!(unchanged.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn reschedule_unknown_appointment_is_not_found() {
        let c = clinic();
        let err = c
            .scheduler
            .reschedule_appointment(AppointmentId::new(), at(10, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::NotFound {
                kind: EntityKind::Appointment,
                ..
            }
        ));
    }

    #[test]
    fn status_and_notes_on_unknown_appointment_are_not_found() {
        let c = clinic();

        let err = c
            .scheduler
            .update_appointment_status(AppointmentId::new(), AppointmentStatus::Confirmed)
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::NotFound {
                kind: EntityKind::Appointment,
                ..
            }
        ));

        let err = c
            .scheduler
            .update_appointment_notes(AppointmentId::new(), "Fasting required")
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::NotFound {
                kind: EntityKind::Appointment,
                ..
            }
        ));

        let err = c.scheduler.cancel_appointment(AppointmentId::new()).unwrap_err();
        assert!(err.is_not_found());
        assert!(c.scheduler.all_appointments().unwrap().is_empty());
    }

    #[test]
    fn status_writes_are_unconstrained() {
        let c = clinic();
        let x = c
            .scheduler
            .book_appointment(c.patient, c.doctor, at(10, 0), None)
            .unwrap();

        for status in [
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
            AppointmentStatus::Scheduled,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Completed,
        ] {
            let updated = c.scheduler.update_appointment_status(x.id, status).unwrap();
            assert_eq!(updated.status, status);
        }
    }

    #[test]
    fn notes_touch_nothing_else() {
        let c = clinic();
        let x = c
            .scheduler
            .book_appointment(c.patient, c.doctor, at(10, 0), Some("Follow-up".into()))
            .unwrap();
        c.scheduler
            .update_appointment_status(x.id, AppointmentStatus::Confirmed)
            .unwrap();

        c.clock.advance(Duration::minutes(1));
        let noted = c
            .scheduler
            .update_appointment_notes(x.id, "Bring previous results")
            .unwrap();

        assert_eq!(noted.notes.as_deref(), Some("Bring previous results"));
        assert_eq!(noted.scheduled_at, x.scheduled_at);
        assert_eq!(noted.status, AppointmentStatus::Confirmed);
        assert_eq!(noted.patient_id, x.patient_id);
        assert_eq!(noted.doctor_id, x.doctor_id);
        assert_eq!(noted.reason, x.reason);
        assert_eq!(noted.updated_at, at(7, 1));
    }

    #[test]
    fn delete_removes_the_record_and_frees_the_slot() {
        let c = clinic();
        let x = c
            .scheduler
            .book_appointment(c.patient, c.doctor, at(10, 0), None)
            .unwrap();

        c.scheduler.delete_appointment(x.id).unwrap();
        assert!(c.scheduler.get_appointment(x.id).unwrap().is_none());
        assert!(c.scheduler.delete_appointment(x.id).unwrap_err().is_not_found());

        c.scheduler
            .book_appointment(c.other_patient, c.doctor, at(10, 5), None)
            .unwrap();
    }

    #[test]
    fn queries_pass_through() {
        let c = clinic();
        let a = c
            .scheduler
            .book_appointment(c.patient, c.doctor, at(9, 0), None)
            .unwrap();
        let b = c
            .scheduler
            .book_appointment(c.other_patient, c.doctor, at(11, 0), None)
            .unwrap();
        c.scheduler
            .update_appointment_status(b.id, AppointmentStatus::Confirmed)
            .unwrap();

        let for_doctor: Vec<_> = c
            .scheduler
            .appointments_for_doctor(c.doctor)
            .unwrap()
            .into_iter()
            .map(|x| x.id)
            .collect();
        assert_eq!(for_doctor, vec![b.id, a.id]);

        let for_patient = c.scheduler.appointments_for_patient(c.patient).unwrap();
        assert_eq!(for_patient.len(), 1);
        assert_eq!(for_patient[0].id, a.id);

        let confirmed = c
            .scheduler
            .appointments_with_status(AppointmentStatus::Confirmed)
            .unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, b.id);
    }

    #[test]
    fn no_two_appointments_of_a_doctor_share_a_window() {
        let c = clinic();
        let mut minute = 0;
        while minute < 8 * 60 {
            let time = at(8, 0) + Duration::minutes(minute);
            let _ = c
                .scheduler
                .book_appointment(c.patient, c.doctor, time, None);
            minute += 7;
        }

        let booked = c.scheduler.appointments_for_doctor(c.doctor).unwrap();
        assert!(booked.len() > 1);
        for (i, a) in booked.iter().enumerate() {
            for b in &booked[i + 1..] {
                let gap = (a.scheduled_at - b.scheduled_at).num_minutes().abs();
                assert!(gap > PROTECTION_WINDOW_MINUTES);
            }
        }
    }

    #[test]
    fn concurrent_bookings_for_one_slot_admit_exactly_one() {
        let c = clinic();
        let scheduler = Arc::new(c.scheduler);
        let (patient, doctor) = (c.patient, c.doctor);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let scheduler = Arc::clone(&scheduler);
                thread::spawn(move || {
                    scheduler.book_appointment(patient, doctor, at(9, i % 4), None)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let booked = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.is_conflict()))
            .count();

        assert_eq!(booked, 1);
        assert_eq!(conflicts, 15);
        assert_eq!(scheduler.all_appointments().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_reschedules_cannot_collide() {
        let c = clinic();
        let first = c
            .scheduler
            .book_appointment(c.patient, c.doctor, at(8, 0), None)
            .unwrap();
        let second = c
            .scheduler
            .book_appointment(c.other_patient, c.doctor, at(16, 0), None)
            .unwrap();
        let scheduler = Arc::new(c.scheduler);

        let handles: Vec<_> = [first.id, second.id]
            .into_iter()
            .map(|id| {
                let scheduler = Arc::clone(&scheduler);
                thread::spawn(move || scheduler.reschedule_appointment(id, at(12, 0)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let at_noon = scheduler
            .appointments_for_doctor(c.doctor)
            .unwrap()
            .into_iter()
            .filter(|a| a.scheduled_at == at(12, 0))
            .count();
        assert_eq!(at_noon, 1);
    }
}
