//! Identity directory: resolves user ids to people and their roles.
//!
//! Credential storage lives elsewhere. The engine only needs to know that an
//! id exists and what role it carries.

use crate::error::{EntityKind, ScheduleError, ScheduleResult};
use crate::models::{Person, Role, UserId};
use std::collections::HashMap;
use std::sync::RwLock;

pub trait IdentityDirectory: Send + Sync {
    fn find(&self, id: UserId) -> ScheduleResult<Option<Person>>;

    fn people_with_role(&self, role: Role) -> ScheduleResult<Vec<Person>>;

    /// Look up `id`, reporting a miss as `NotFound` for the given kind.
    fn resolve(&self, id: UserId, kind: EntityKind) -> ScheduleResult<Person> {
        self.find(id)?
            .ok_or_else(|| ScheduleError::not_found(kind, id))
    }
}

/// Directory held in memory, keyed by user id.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    people: RwLock<HashMap<UserId, Person>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_people(people: impl IntoIterator<Item = Person>) -> Self {
        InMemoryDirectory {
            people: RwLock::new(people.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    /// Add or replace a person.
    pub fn register(&self, person: Person) -> ScheduleResult<Person> {
        self.people.write()?.insert(person.id, person.clone());
        Ok(person)
    }

    /// Everyone, sorted by role then last name.
    pub fn people(&self) -> ScheduleResult<Vec<Person>> {
        let mut people: Vec<Person> = self.people.read()?.values().cloned().collect();
        people.sort_by(|a, b| {
            a.role
                .name()
                .cmp(b.role.name())
                .then_with(|| a.last_name.cmp(&b.last_name))
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
        Ok(people)
    }
}

impl IdentityDirectory for InMemoryDirectory {
    fn find(&self, id: UserId) -> ScheduleResult<Option<Person>> {
        Ok(self.people.read()?.get(&id).cloned())
    }

    fn people_with_role(&self, role: Role) -> ScheduleResult<Vec<Person>> {
        Ok(self
            .people()?
            .into_iter()
            .filter(|p| p.role == role)
            .collect())
    }
}
