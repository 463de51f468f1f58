//! Per-role summaries of appointment activity.

use crate::models::Appointment;
use chrono::NaiveDateTime;
use serde::Serialize;

/// How many entries the recent/upcoming lists carry.
pub const DASHBOARD_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientDashboard {
    pub total_appointments: usize,
    pub recent_appointments: Vec<Appointment>,
    pub upcoming_appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorDashboard {
    pub total_appointments: usize,
    pub recent_appointments: Vec<Appointment>,
    pub upcoming_appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminDashboard {
    pub total_patients: usize,
    pub total_doctors: usize,
    pub total_appointments: usize,
    pub recent_appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dashboard {
    Patient(PatientDashboard),
    Doctor(DoctorDashboard),
    Admin(AdminDashboard),
}

fn first(appointments: &[Appointment]) -> Vec<Appointment> {
    appointments.iter().take(DASHBOARD_LIMIT).cloned().collect()
}

/// `appointments` must already be latest-first.
pub fn patient_dashboard(appointments: &[Appointment], now: NaiveDateTime) -> PatientDashboard {
    PatientDashboard {
        total_appointments: appointments.len(),
        recent_appointments: first(appointments),
        upcoming_appointments: appointments
            .iter()
            .filter(|a| a.scheduled_at > now && a.status.is_active())
            .take(DASHBOARD_LIMIT)
            .cloned()
            .collect(),
    }
}

/// Doctors see every active appointment as upcoming, past or not.
pub fn doctor_dashboard(appointments: &[Appointment]) -> DoctorDashboard {
    DoctorDashboard {
        total_appointments: appointments.len(),
        recent_appointments: first(appointments),
        upcoming_appointments: appointments
            .iter()
            .filter(|a| a.status.is_active())
            .take(DASHBOARD_LIMIT)
            .cloned()
            .collect(),
    }
}

/// Admins see the most recently created appointments, whenever they are scheduled.
pub fn admin_dashboard(
    total_patients: usize,
    total_doctors: usize,
    appointments: &[Appointment],
) -> AdminDashboard {
    let mut newest: Vec<&Appointment> = appointments.iter().collect();
    newest.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    AdminDashboard {
        total_patients,
        total_doctors,
        total_appointments: appointments.len(),
        recent_appointments: newest.into_iter().take(DASHBOARD_LIMIT).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, UserId};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn history() -> Vec<Appointment> {
        let (patient, doctor) = (UserId::new(), UserId::new());
        let mut list: Vec<Appointment> = (1..=8)
            .rev()
            .map(|d| Appointment::new(patient, doctor, day(d), None, day(1)))
            .collect();
        list[0].set_status(AppointmentStatus::Cancelled, day(1));
        list[1].set_status(AppointmentStatus::Confirmed, day(1));
        list
    }

    #[test]
    fn patient_upcoming_excludes_past_and_inactive() {
        let list = history();
        let board = patient_dashboard(&list, day(5));

        assert_eq!(board.total_appointments, 8);
        assert_eq!(board.recent_appointments.len(), DASHBOARD_LIMIT);
        let upcoming: Vec<_> = board
            .upcoming_appointments
            .iter()
            .map(|a| a.scheduled_at)
            .collect();
        assert_eq!(upcoming, vec![day(7), day(6)]);
    }

    #[test]
    fn doctor_upcoming_ignores_time() {
        let list = history();
        let board = doctor_dashboard(&list);

        assert_eq!(board.total_appointments, 8);
        assert_eq!(board.upcoming_appointments.len(), DASHBOARD_LIMIT);
        assert!(board
            .upcoming_appointments
            .iter()
            .all(|a| a.status != AppointmentStatus::Cancelled));
        assert_eq!(board.upcoming_appointments[0].scheduled_at, day(7));
    }

    #[test]
    fn admin_counts() {
        let list = history();
        let board = admin_dashboard(3, 2, &list);
        assert_eq!(board.total_patients, 3);
        assert_eq!(board.total_doctors, 2);
        assert_eq!(board.total_appointments, 8);
        assert_eq!(board.recent_appointments.len(), DASHBOARD_LIMIT);
    }

    #[test]
    fn admin_recent_is_by_creation_not_schedule() {
        let (patient, doctor) = (UserId::new(), UserId::new());
        let far_future = Appointment::new(patient, doctor, day(28), None, day(1));
        let latest = Appointment::new(patient, doctor, day(3), None, day(2));
        let list = vec![far_future.clone(), latest.clone()];

        let board = admin_dashboard(1, 1, &list);
        let recent: Vec<_> = board.recent_appointments.iter().map(|a| a.id).collect();
        assert_eq!(recent, vec![latest.id, far_future.id]);
    }
}
