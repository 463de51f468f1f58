//! # Clinic Scheduler
//!
//! Appointment booking for a clinic with patients, doctors and administrators.
//!
//! The heart of the crate is [`AppointmentScheduler`]: it books, reschedules
//! and updates appointments while guaranteeing that no doctor has two
//! appointments within 30 minutes of each other. Storage and identity are
//! reached through the [`AppointmentStore`] and [`IdentityDirectory`] traits;
//! in-memory implementations of both are included.
//!
//! [`FrontDesk`] layers role checks on top for callers that arrive with an
//! authenticated [`Caller`].

pub mod clock;
pub mod config;
pub mod conflict;
pub mod dashboard;
pub mod desk;
pub mod directory;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ClinicConfig;
pub use conflict::{ConflictDetector, PROTECTION_WINDOW_MINUTES};
pub use dashboard::Dashboard;
pub use desk::{Caller, FrontDesk};
pub use directory::{IdentityDirectory, InMemoryDirectory};
pub use error::{EntityKind, ScheduleError, ScheduleResult};
pub use models::{parse_timestamp, Appointment, AppointmentId, AppointmentStatus, Person, Role, UserId};
pub use scheduler::AppointmentScheduler;
pub use snapshot::{ClinicSnapshot, SnapshotLock};
pub use store::{AppointmentStore, InMemoryAppointmentStore};
