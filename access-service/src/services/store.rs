//! Assignment store seam.
//!
//! The store is the only owner of assignment state. Uniqueness of live grants
//! is enforced by the store itself at write time, so two racing inserts of the
//! same grant always produce one success and one [`StoreError::Duplicate`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

use super::error::StoreError;
use crate::models::{Assignment, ContextKind};

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Insert a new assignment.
    async fn insert(&self, assignment: &Assignment) -> Result<(), StoreError>;

    /// Insert all assignments or none of them.
    async fn insert_all(&self, assignments: &[Assignment]) -> Result<(), StoreError>;

    /// Find an assignment by id within a tenant, deleted rows included.
    async fn find_by_id(
        &self,
        tenant_id: i64,
        assignment_id: Uuid,
    ) -> Result<Option<Assignment>, StoreError>;

    async fn list_for_user(
        &self,
        tenant_id: i64,
        user_id: i64,
        include_deleted: bool,
    ) -> Result<Vec<Assignment>, StoreError>;

    /// Persist the mutable fields of a live assignment.
    async fn update(&self, assignment: &Assignment) -> Result<(), StoreError>;

    /// Mark an assignment deleted. Returns `false` if it was already deleted.
    async fn soft_delete(
        &self,
        tenant_id: i64,
        assignment_id: Uuid,
        deleted_by: i64,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Distinct context ids of the user's live assignments of `kind` on `as_of`.
    async fn live_context_ids(
        &self,
        tenant_id: i64,
        user_id: i64,
        kind: &ContextKind,
        as_of: NaiveDate,
    ) -> Result<BTreeSet<i64>, StoreError>;
}

/// In-process store with the same semantics as the Postgres store.
#[derive(Default)]
pub struct InMemoryAssignmentStore {
    rows: Mutex<HashMap<Uuid, Assignment>>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Assignment>>, StoreError> {
        self.rows
            .lock()
            .map_err(|e| StoreError::Unavailable(anyhow::anyhow!("Store mutex poisoned: {}", e)))
    }

    fn conflicts(rows: &HashMap<Uuid, Assignment>, candidate: &Assignment) -> bool {
        let key = candidate.grant_key();
        rows.values().any(|row| {
            !row.is_deleted && row.assignment_id != candidate.assignment_id && row.grant_key() == key
        })
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    async fn insert(&self, assignment: &Assignment) -> Result<(), StoreError> {
        let mut rows = self.lock()?;
        if rows.contains_key(&assignment.assignment_id) || Self::conflicts(&rows, assignment) {
            return Err(StoreError::Duplicate);
        }
        rows.insert(assignment.assignment_id, assignment.clone());
        Ok(())
    }

    async fn insert_all(&self, assignments: &[Assignment]) -> Result<(), StoreError> {
        let mut rows = self.lock()?;
        let mut staged = rows.clone();
        for assignment in assignments {
            if staged.contains_key(&assignment.assignment_id)
                || Self::conflicts(&staged, assignment)
            {
                return Err(StoreError::Duplicate);
            }
            staged.insert(assignment.assignment_id, assignment.clone());
        }
        *rows = staged;
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant_id: i64,
        assignment_id: Uuid,
    ) -> Result<Option<Assignment>, StoreError> {
        Ok(self
            .lock()?
            .get(&assignment_id)
            .filter(|a| a.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_for_user(
        &self,
        tenant_id: i64,
        user_id: i64,
        include_deleted: bool,
    ) -> Result<Vec<Assignment>, StoreError> {
        let mut found: Vec<Assignment> = self
            .lock()?
            .values()
            .filter(|a| a.tenant_id == tenant_id && a.user_id == user_id)
            .filter(|a| include_deleted || !a.is_deleted)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.created_utc, a.assignment_id));
        Ok(found)
    }

    async fn update(&self, assignment: &Assignment) -> Result<(), StoreError> {
        let mut rows = self.lock()?;
        match rows.get(&assignment.assignment_id) {
            Some(row) if !row.is_deleted && row.tenant_id == assignment.tenant_id => {}
            _ => return Err(StoreError::NotFound),
        }
        if Self::conflicts(&rows, assignment) {
            return Err(StoreError::Duplicate);
        }
        if let Some(row) = rows.get_mut(&assignment.assignment_id) {
            row.role_id = assignment.role_id;
            row.trade_specialization = assignment.trade_specialization.clone();
            row.is_primary = assignment.is_primary;
            row.validity = assignment.validity;
            row.updated_utc = assignment.updated_utc;
            row.updated_by = assignment.updated_by;
        }
        Ok(())
    }

    async fn soft_delete(
        &self,
        tenant_id: i64,
        assignment_id: Uuid,
        deleted_by: i64,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut rows = self.lock()?;
        match rows.get_mut(&assignment_id) {
            Some(row) if row.tenant_id == tenant_id => {
                if row.is_deleted {
                    return Ok(false);
                }
                row.is_deleted = true;
                row.updated_by = deleted_by;
                row.updated_utc = at;
                Ok(true)
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn live_context_ids(
        &self,
        tenant_id: i64,
        user_id: i64,
        kind: &ContextKind,
        as_of: NaiveDate,
    ) -> Result<BTreeSet<i64>, StoreError> {
        Ok(self
            .lock()?
            .values()
            .filter(|a| a.tenant_id == tenant_id && a.user_id == user_id)
            .filter(|a| &a.context_kind == kind && a.is_live_on(as_of))
            .map(|a| a.context_id)
            .collect())
    }
}
