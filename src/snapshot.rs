//! JSON snapshot of the in-memory directory and store.
//!
//! The CLI loads a snapshot, runs one command against the in-memory
//! collaborators and writes the result back. Runs that overlap are
//! serialised through [`SnapshotLock`], so each one sees the previous one's
//! writes before checking for conflicts.

use crate::directory::InMemoryDirectory;
use crate::error::{ScheduleError, ScheduleResult};
use crate::models::{Appointment, Person};
use crate::store::{AppointmentStore, InMemoryAppointmentStore};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicSnapshot {
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
}

impl ClinicSnapshot {
    /// Read a snapshot. A missing file is an empty clinic.
    pub fn load(path: &Path) -> ScheduleResult<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ScheduleError::SnapshotRead(e)),
        };
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&contents).map_err(ScheduleError::SnapshotFormat)
    }

    /// Write the snapshot next to `path` and move it into place.
    pub fn save(&self, path: &Path) -> ScheduleResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(ScheduleError::SnapshotWrite)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(ScheduleError::SnapshotFormat)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(ScheduleError::SnapshotWrite)?;
        fs::rename(&staging, path).map_err(ScheduleError::SnapshotWrite)
    }

    pub fn capture(
        directory: &InMemoryDirectory,
        store: &InMemoryAppointmentStore,
    ) -> ScheduleResult<Self> {
        Ok(ClinicSnapshot {
            people: directory.people()?,
            appointments: store.find_all()?,
        })
    }

    pub fn restore(self) -> (InMemoryDirectory, InMemoryAppointmentStore) {
        (
            InMemoryDirectory::from_people(self.people),
            InMemoryAppointmentStore::from_appointments(self.appointments),
        )
    }
}

/// `clinic.json` is guarded by `clinic.json.lock`.
pub fn lock_path(data_file: &Path) -> PathBuf {
    let mut name = OsString::from(data_file.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Advisory lock on the file next to a snapshot, held from load to save.
pub struct SnapshotLock {
    lock: fd_lock::RwLock<File>,
}

impl SnapshotLock {
    pub fn open(data_file: &Path) -> ScheduleResult<Self> {
        let path = lock_path(data_file);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(ScheduleError::SnapshotLock)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(ScheduleError::SnapshotLock)?;
        Ok(SnapshotLock {
            lock: fd_lock::RwLock::new(file),
        })
    }

    /// Run `f` holding the lock exclusively. Blocks while another run holds it.
    pub fn exclusive<T>(&mut self, f: impl FnOnce() -> T) -> ScheduleResult<T> {
        let _guard = self.lock.write().map_err(ScheduleError::SnapshotLock)?;
        Ok(f())
    }
}
