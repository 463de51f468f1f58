//! Command-line interface for the clinic scheduler.
//!
//! Each invocation loads the clinic snapshot, runs one command as the caller
//! named by `--as`, and writes the snapshot back if anything changed. The
//! snapshot's lock file is held for the whole run.

use anyhow::Context;
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use clinic_scheduler::{
    parse_timestamp, Appointment, AppointmentId, AppointmentScheduler, AppointmentStatus, Caller,
    ClinicConfig, ClinicSnapshot, Dashboard, FrontDesk, IdentityDirectory, InMemoryAppointmentStore,
    InMemoryDirectory, Person, Role, ScheduleError, SnapshotLock, UserId,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type Desk = FrontDesk<InMemoryAppointmentStore, InMemoryDirectory>;

#[derive(Parser)]
#[command(name = "clinic-scheduler")]
#[command(about = "Clinic appointment scheduling")]
struct Cli {
    /// Snapshot file (default: $CLINIC_DATA_FILE or clinic.json)
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the default admin, doctor and patient if they are missing
    Seed,
    /// Register a person
    AddPerson {
        /// patient, doctor or admin
        role: Role,
        first_name: String,
        last_name: String,
        #[arg(long)]
        specialization: Option<String>,
    },
    /// List people with a role
    People {
        #[arg(long = "as")]
        caller: UserId,
        role: Role,
    },
    /// Book an appointment (patients)
    Book {
        #[arg(long = "as")]
        caller: UserId,
        #[arg(long)]
        doctor: UserId,
        /// e.g. 2024-01-10T09:00:00
        #[arg(long, value_parser = parse_timestamp)]
        at: NaiveDateTime,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Move an appointment to a new time (patients)
    Reschedule {
        #[arg(long = "as")]
        caller: UserId,
        id: AppointmentId,
        #[arg(long, value_parser = parse_timestamp)]
        at: NaiveDateTime,
    },
    /// Set an appointment's status (doctors)
    Status {
        #[arg(long = "as")]
        caller: UserId,
        id: AppointmentId,
        /// SCHEDULED, CONFIRMED, COMPLETED or CANCELLED
        status: String,
    },
    /// Replace an appointment's notes (doctors)
    Notes {
        #[arg(long = "as")]
        caller: UserId,
        id: AppointmentId,
        notes: String,
    },
    /// Cancel an appointment (patients)
    Cancel {
        #[arg(long = "as")]
        caller: UserId,
        id: AppointmentId,
    },
    /// Remove an appointment record (admins)
    Delete {
        #[arg(long = "as")]
        caller: UserId,
        id: AppointmentId,
    },
    /// List the caller's appointments
    List {
        #[arg(long = "as")]
        caller: UserId,
        /// Only this status (admins)
        #[arg(long)]
        status: Option<AppointmentStatus>,
    },
    /// Show the caller's dashboard
    Dashboard {
        #[arg(long = "as")]
        caller: UserId,
    },
    /// Walk through the booking rules on a throwaway clinic
    Demo,
}

impl Commands {
    fn mutates(&self) -> bool {
        !matches!(
            self,
            Commands::People { .. }
                | Commands::List { .. }
                | Commands::Dashboard { .. }
                | Commands::Demo
        )
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let cfg = ClinicConfig::from_env(cli.data.clone())?;

    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(cfg.log_filter()))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Commands::Demo = cli.command {
        return run_demo();
    }

    let mut lock = SnapshotLock::open(cfg.data_file())
        .with_context(|| format!("locking {}", cfg.data_file().display()))?;
    lock.exclusive(|| execute(&cfg, cli.command, cli.json))?
}

/// Load, run one command and save. Called with the snapshot lock held.
fn execute(cfg: &ClinicConfig, command: Commands, json: bool) -> anyhow::Result<()> {
    let snapshot = ClinicSnapshot::load(cfg.data_file())
        .with_context(|| format!("loading {}", cfg.data_file().display()))?;
    let (directory, store) = snapshot.restore();
    let scheduler = Arc::new(AppointmentScheduler::new(store, directory));
    let desk = FrontDesk::new(Arc::clone(&scheduler));

    let mutates = command.mutates();
    run(&desk, command, json)?;

    if mutates {
        ClinicSnapshot::capture(scheduler.directory(), scheduler.store())?
            .save(cfg.data_file())
            .with_context(|| format!("saving {}", cfg.data_file().display()))?;
        tracing::debug!(path = %cfg.data_file().display(), "snapshot saved");
    }
    Ok(())
}

fn caller(desk: &Desk, id: UserId) -> Result<Caller, ScheduleError> {
    Caller::resolve(desk.scheduler().directory(), id)
}

fn run(desk: &Desk, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Seed => {
            let people = seed(desk.scheduler().directory())?;
            print_people(&people, json)?;
        }
        Commands::AddPerson {
            role,
            first_name,
            last_name,
            specialization,
        } => {
            let mut person = Person::new(role, &first_name, &last_name)?;
            if let Some(specialization) = specialization {
                person = person.with_specialization(specialization);
            }
            let person = desk.scheduler().directory().register(person)?;
            print_people(std::slice::from_ref(&person), json)?;
        }
        Commands::People { caller: id, role } => {
            let people = desk.people(&caller(desk, id)?, role)?;
            print_people(&people, json)?;
        }
        Commands::Book {
            caller: id,
            doctor,
            at,
            reason,
        } => {
            let apt = desk.book(&caller(desk, id)?, doctor, at, reason)?;
            print_appointment("Booked", &apt, json)?;
        }
        Commands::Reschedule { caller: id, id: apt_id, at } => {
            let apt = desk.reschedule(&caller(desk, id)?, apt_id, at)?;
            print_appointment("Rescheduled", &apt, json)?;
        }
        Commands::Status {
            caller: id,
            id: apt_id,
            status,
        } => {
            let apt = desk.set_status(&caller(desk, id)?, apt_id, &status)?;
            print_appointment("Updated", &apt, json)?;
        }
        Commands::Notes {
            caller: id,
            id: apt_id,
            notes,
        } => {
            let apt = desk.set_notes(&caller(desk, id)?, apt_id, &notes)?;
            print_appointment("Updated", &apt, json)?;
        }
        Commands::Cancel { caller: id, id: apt_id } => {
            let apt = desk.cancel(&caller(desk, id)?, apt_id)?;
            print_appointment("Appointment cancelled successfully", &apt, json)?;
        }
        Commands::Delete { caller: id, id: apt_id } => {
            let apt = desk.delete(&caller(desk, id)?, apt_id)?;
            print_appointment("Deleted", &apt, json)?;
        }
        Commands::List { caller: id, status } => {
            let who = caller(desk, id)?;
            let appointments = match status {
                Some(status) => desk.appointments_with_status(&who, status)?,
                None => desk.my_appointments(&who)?,
            };
            print_appointments(&appointments, json)?;
        }
        Commands::Dashboard { caller: id } => {
            let board = desk.dashboard(&caller(desk, id)?)?;
            print_dashboard(&board, json)?;
        }
        Commands::Demo => run_demo()?,
    }
    Ok(())
}

/// Default people, added only when no one with the same role and name exists.
fn seed(directory: &InMemoryDirectory) -> Result<Vec<Person>, ScheduleError> {
    let defaults = [
        Person::new(Role::Admin, "Admin", "User")?,
        Person::new(Role::Doctor, "John", "Smith")?.with_specialization("Cardiology"),
        Person::new(Role::Patient, "Jane", "Doe")?,
    ];

    let mut people = Vec::new();
    for person in defaults {
        let existing = directory
            .people_with_role(person.role)?
            .into_iter()
            .find(|p| p.first_name == person.first_name && p.last_name == person.last_name);
        match existing {
            Some(existing) => people.push(existing),
            None => people.push(directory.register(person)?),
        }
    }
    Ok(people)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_people(people: &[Person], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(people);
    }
    if people.is_empty() {
        println!("No people found.");
    }
    for person in people {
        match &person.specialization {
            Some(specialization) => println!(
                "{}  {:8} {} ({})",
                person.id,
                person.role.name(),
                person.full_name(),
                specialization
            ),
            None => println!("{}  {:8} {}", person.id, person.role.name(), person.full_name()),
        }
    }
    Ok(())
}

fn appointment_line(apt: &Appointment) -> String {
    let mut line = format!(
        "{}  {}  {:9}  patient={} doctor={}",
        apt.id,
        apt.scheduled_at.format("%Y-%m-%d %H:%M"),
        apt.status.name(),
        apt.patient_id,
        apt.doctor_id
    );
    if let Some(reason) = &apt.reason {
        line.push_str(&format!("  reason: {reason}"));
    }
    if let Some(notes) = &apt.notes {
        line.push_str(&format!("  notes: {notes}"));
    }
    line
}

fn print_appointment(label: &str, apt: &Appointment, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(apt);
    }
    println!("{label}: {}", appointment_line(apt));
    Ok(())
}

fn print_appointments(appointments: &[Appointment], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(appointments);
    }
    if appointments.is_empty() {
        println!("No appointments.");
    }
    for apt in appointments {
        println!("{}", appointment_line(apt));
    }
    Ok(())
}

fn print_section(title: &str, appointments: &[Appointment]) {
    println!("\n{title} ({}):", appointments.len());
    for apt in appointments {
        println!("  {}", appointment_line(apt));
    }
}

fn print_dashboard(board: &Dashboard, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(board);
    }
    match board {
        Dashboard::Patient(b) => {
            println!("Total appointments: {}", b.total_appointments);
            print_section("Recent", &b.recent_appointments);
            print_section("Upcoming", &b.upcoming_appointments);
        }
        Dashboard::Doctor(b) => {
            println!("Total appointments: {}", b.total_appointments);
            print_section("Recent", &b.recent_appointments);
            print_section("Upcoming", &b.upcoming_appointments);
        }
        Dashboard::Admin(b) => {
            println!("Patients: {}", b.total_patients);
            println!("Doctors: {}", b.total_doctors);
            println!("Total appointments: {}", b.total_appointments);
            print_section("Recent", &b.recent_appointments);
        }
    }
    Ok(())
}

fn run_demo() -> anyhow::Result<()> {
    println!("\n{}", "=".repeat(60));
    println!("       CLINIC SCHEDULER DEMO");
    println!("{}", "=".repeat(60));

    let directory = InMemoryDirectory::new();
    let people = seed(&directory)?;
    let (doctor, patient) = (&people[1], &people[2]);
    let second = directory.register(Person::new(Role::Patient, "Bob", "Wilson")?)?;
    let desk = FrontDesk::new(Arc::new(AppointmentScheduler::new(
        InMemoryAppointmentStore::new(),
        directory,
    )));
    let (doc, p1, p2) = (
        Caller::from_person(doctor),
        Caller::from_person(patient),
        Caller::from_person(&second),
    );

    let attempt = |label: &str, result: Result<Appointment, ScheduleError>| match result {
        Ok(apt) => {
            println!("  [ok]   {label:38} -> {}", apt.status.name());
            Some(apt)
        }
        Err(e) => {
            println!("  [fail] {label:38} -> {e}");
            None
        }
    };

    println!("\n{} with {}", doctor.full_name(), patient.full_name());
    let first = attempt(
        "Jane books 09:00",
        desk.book(&p1, doc.id, parse_timestamp("2024-01-10T09:00:00")?, Some("Annual checkup".into())),
    );
    attempt(
        "Bob books 09:20 (20 min away)",
        desk.book(&p2, doc.id, parse_timestamp("2024-01-10T09:20:00")?, None),
    );
    attempt(
        "Bob books 09:31 (31 min away)",
        desk.book(&p2, doc.id, parse_timestamp("2024-01-10T09:31:00")?, None),
    );

    if let Some(first) = first {
        attempt("Doctor confirms Jane", desk.set_status(&doc, first.id, "CONFIRMED"));
        attempt(
            "Jane moves to 14:00",
            desk.reschedule(&p1, first.id, parse_timestamp("2024-01-10T14:00:00")?),
        );
        attempt("Jane cancels", desk.cancel(&p1, first.id));
        attempt(
            "Bob books 14:05 (cancelled slot)",
            desk.book(&p2, doc.id, parse_timestamp("2024-01-10T14:05:00")?, None),
        );
    }

    println!("\nNote: cancelled appointments still hold their slot.");
    print_dashboard(&desk.dashboard(&doc)?, false)
}
