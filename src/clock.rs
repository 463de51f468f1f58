//! Source of "now" for audit timestamps and dashboards.

use chrono::{Duration, Local, NaiveDateTime, SubsecRound};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in local time, truncated to whole seconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local().trunc_subsecs(0)
    }
}

/// A clock that only moves when told to. Used by tests and the demo.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(start: NaiveDateTime) -> Self {
        FixedClock {
            current: Mutex::new(start),
        }
    }

    pub fn set(&self, value: NaiveDateTime) {
        *self.current.lock().unwrap_or_else(|p| p.into_inner()) = value;
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        *current += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.current.lock().unwrap_or_else(|p| p.into_inner())
    }
}
