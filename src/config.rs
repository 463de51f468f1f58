//! Runtime configuration.
//!
//! Resolved once at startup and passed down; nothing reads the environment
//! while a command is running.

use crate::error::{ScheduleError, ScheduleResult};
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_FILE: &str = "clinic.json";
pub const DEFAULT_LOG_FILTER: &str = "clinic_scheduler=info";

pub const DATA_FILE_ENV: &str = "CLINIC_DATA_FILE";
pub const LOG_FILTER_ENV: &str = "CLINIC_LOG";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClinicConfig {
    data_file: PathBuf,
    log_filter: String,
}

impl ClinicConfig {
    pub fn new(data_file: PathBuf, log_filter: String) -> ScheduleResult<Self> {
        if data_file.as_os_str().is_empty() {
            return Err(ScheduleError::Validation(
                "Data file path cannot be empty".into(),
            ));
        }
        if log_filter.trim().is_empty() {
            return Err(ScheduleError::Validation(
                "Log filter cannot be empty".into(),
            ));
        }
        Ok(Self {
            data_file,
            log_filter,
        })
    }

    /// Build from already-read values. `override_file` (a CLI flag) wins over
    /// `env_file`; blank values fall back to the defaults.
    pub fn from_values(
        override_file: Option<PathBuf>,
        env_file: Option<String>,
        env_log_filter: Option<String>,
    ) -> ScheduleResult<Self> {
        fn non_blank(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        let data_file = override_file
            .or_else(|| non_blank(env_file).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));
        let log_filter =
            non_blank(env_log_filter).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Self::new(data_file, log_filter)
    }

    /// Read `CLINIC_DATA_FILE` and `CLINIC_LOG` from the process environment.
    pub fn from_env(override_file: Option<PathBuf>) -> ScheduleResult<Self> {
        Self::from_values(
            override_file,
            std::env::var(DATA_FILE_ENV).ok(),
            std::env::var(LOG_FILTER_ENV).ok(),
        )
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }
}
