//! Role-gated front door to the scheduler.
//!
//! Every call names its `Caller` explicitly. The desk decides which role may
//! invoke which operation and then hands off to `AppointmentScheduler`, which
//! itself knows nothing about roles. Ownership of an appointment is not
//! checked here: a patient may reschedule or cancel any appointment id they
//! present.

use crate::dashboard::{self, Dashboard};
use crate::directory::IdentityDirectory;
use crate::error::{EntityKind, ScheduleError, ScheduleResult};
use crate::models::{Appointment, AppointmentId, AppointmentStatus, Person, Role, UserId};
use crate::scheduler::AppointmentScheduler;
use crate::store::AppointmentStore;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::warn;

/// The already-authenticated actor behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(id: UserId, role: Role) -> Self {
        Caller { id, role }
    }

    /// Build a caller from a directory entry.
    pub fn from_person(person: &Person) -> Self {
        Caller::new(person.id, person.role)
    }

    /// Resolve `id` in `directory` and adopt its role.
    pub fn resolve<D: IdentityDirectory + ?Sized>(directory: &D, id: UserId) -> ScheduleResult<Self> {
        let person = directory.resolve(id, EntityKind::Person)?;
        Ok(Caller::from_person(&person))
    }
}

pub struct FrontDesk<S, D> {
    scheduler: Arc<AppointmentScheduler<S, D>>,
}

impl<S, D> Clone for FrontDesk<S, D> {
    fn clone(&self) -> Self {
        FrontDesk {
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<S, D> FrontDesk<S, D>
where
    S: AppointmentStore,
    D: IdentityDirectory,
{
    pub fn new(scheduler: Arc<AppointmentScheduler<S, D>>) -> Self {
        FrontDesk { scheduler }
    }

    pub fn scheduler(&self) -> &AppointmentScheduler<S, D> {
        &self.scheduler
    }

    fn deny<T>(caller: &Caller, action: &'static str) -> ScheduleResult<T> {
        warn!(caller_id = %caller.id, role = %caller.role, action, "request rejected");
        Err(ScheduleError::Forbidden {
            role: caller.role,
            action,
        })
    }

    fn require(caller: &Caller, allowed: &[Role], action: &'static str) -> ScheduleResult<()> {
        if allowed.contains(&caller.role) {
            Ok(())
        } else {
            Self::deny(caller, action)
        }
    }

    /// A patient books for themselves.
    pub fn book(
        &self,
        caller: &Caller,
        doctor_id: UserId,
        time: NaiveDateTime,
        reason: Option<String>,
    ) -> ScheduleResult<Appointment> {
        Self::require(caller, &[Role::Patient], "book appointments")?;
        self.scheduler
            .book_appointment(caller.id, doctor_id, time, reason)
    }

    pub fn reschedule(
        &self,
        caller: &Caller,
        id: AppointmentId,
        new_time: NaiveDateTime,
    ) -> ScheduleResult<Appointment> {
        Self::require(caller, &[Role::Patient], "reschedule appointments")?;
        self.scheduler.reschedule_appointment(id, new_time)
    }

    pub fn cancel(&self, caller: &Caller, id: AppointmentId) -> ScheduleResult<Appointment> {
        Self::require(caller, &[Role::Patient], "cancel appointments")?;
        self.scheduler.cancel_appointment(id)
    }

    /// Doctors set status from free text, e.g. `"CONFIRMED"`.
    pub fn set_status(
        &self,
        caller: &Caller,
        id: AppointmentId,
        status: &str,
    ) -> ScheduleResult<Appointment> {
        Self::require(caller, &[Role::Doctor], "update appointment status")?;
        let status: AppointmentStatus = status.parse()?;
        self.scheduler.update_appointment_status(id, status)
    }

    pub fn set_notes(
        &self,
        caller: &Caller,
        id: AppointmentId,
        notes: &str,
    ) -> ScheduleResult<Appointment> {
        Self::require(caller, &[Role::Doctor], "update appointment notes")?;
        self.scheduler.update_appointment_notes(id, notes)
    }

    pub fn delete(&self, caller: &Caller, id: AppointmentId) -> ScheduleResult<Appointment> {
        Self::require(caller, &[Role::Admin], "delete appointments")?;
        self.scheduler.delete_appointment(id)
    }

    /// The caller's own appointments; everything for admins.
    pub fn my_appointments(&self, caller: &Caller) -> ScheduleResult<Vec<Appointment>> {
        match caller.role {
            Role::Patient => self.scheduler.appointments_for_patient(caller.id),
            Role::Doctor => self.scheduler.appointments_for_doctor(caller.id),
            Role::Admin => self.scheduler.all_appointments(),
        }
    }

    pub fn appointments_with_status(
        &self,
        caller: &Caller,
        status: AppointmentStatus,
    ) -> ScheduleResult<Vec<Appointment>> {
        Self::require(caller, &[Role::Admin], "list appointments by status")?;
        self.scheduler.appointments_with_status(status)
    }

    /// Patients may browse doctors, doctors may browse patients, admins see all.
    pub fn people(&self, caller: &Caller, role: Role) -> ScheduleResult<Vec<Person>> {
        let permitted = match (caller.role, role) {
            (Role::Admin, _) => true,
            (Role::Patient, Role::Doctor) => true,
            (Role::Doctor, Role::Patient) => true,
            _ => false,
        };
        if !permitted {
            return Self::deny(caller, "list people with that role");
        }
        self.scheduler.directory().people_with_role(role)
    }

    pub fn dashboard(&self, caller: &Caller) -> ScheduleResult<Dashboard> {
        let appointments = self.my_appointments(caller)?;
        let board = match caller.role {
            Role::Patient => Dashboard::Patient(dashboard::patient_dashboard(
                &appointments,
                self.scheduler.now(),
            )),
            Role::Doctor => Dashboard::Doctor(dashboard::doctor_dashboard(&appointments)),
            Role::Admin => {
                let directory = self.scheduler.directory();
                Dashboard::Admin(dashboard::admin_dashboard(
                    directory.people_with_role(Role::Patient)?.len(),
                    directory.people_with_role(Role::Doctor)?.len(),
                    &appointments,
                ))
            }
        };
        Ok(board)
    }
}
