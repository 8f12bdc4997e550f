//! Management capability checks.

use crate::model::actor::{Actor, PersonId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

/// Answers whether an actor may act as manager for a subject.
pub trait AuthorizationOracle: Send + Sync {
    fn can_manage(&self, actor: &Actor, subject_id: PersonId) -> bool;
}

/// In-memory manager -> direct report directory.
#[derive(Debug, Default)]
pub struct ManagerDirectory {
    reports: RwLock<BTreeMap<PersonId, BTreeSet<PersonId>>>,
}

impl ManagerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `manager_id` management capability over `subject_id`.
    pub fn assign(&self, manager_id: PersonId, subject_id: PersonId) {
        let mut reports = self
            .reports
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reports.entry(manager_id).or_default().insert(subject_id);
    }

    /// Removes one management relationship. Returns whether it existed.
    pub fn revoke(&self, manager_id: PersonId, subject_id: PersonId) -> bool {
        let mut reports = self
            .reports
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reports
            .get_mut(&manager_id)
            .is_some_and(|subjects| subjects.remove(&subject_id))
    }
}

impl AuthorizationOracle for ManagerDirectory {
    fn can_manage(&self, actor: &Actor, subject_id: PersonId) -> bool {
        let reports = self
            .reports
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reports
            .get(&actor.person_id)
            .is_some_and(|subjects| subjects.contains(&subject_id))
    }
}
