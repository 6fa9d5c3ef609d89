//! Assignment lifecycle: create, bulk create, update, soft delete.
//!
//! Key principles:
//! - Identity (user, context kind, context id) never changes; re-targeting is
//!   a delete followed by a create
//! - Rows are soft-deleted, never removed
//! - Uniqueness of live grants is left to the store's constraint

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::error::{AccessError, StoreError};
use super::metrics::ASSIGNMENT_OPERATIONS_TOTAL;
use super::registry::UserDirectory;
use super::store::AssignmentStore;
use super::validator::ContextValidator;
use crate::models::assignment::parse_date;
use crate::models::{
    Assignment, ContextKind, CreateAssignmentRequest, NewAssignment, UpdateAssignmentRequest,
    UserContext, ValidityWindow,
};

#[derive(Clone)]
pub struct AssignmentManager {
    store: Arc<dyn AssignmentStore>,
    validator: ContextValidator,
    users: Arc<dyn UserDirectory>,
}

fn record<T>(operation: &str, result: &Result<T, AccessError>) {
    let status = match result {
        Ok(_) => "ok",
        Err(AccessError::DuplicateAssignment) => "duplicate",
        Err(e) if e.is_infrastructure() => "error",
        Err(_) => "rejected",
    };
    ASSIGNMENT_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

fn normalize_trade(trade: Option<String>) -> Option<String> {
    trade
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl AssignmentManager {
    pub fn new(
        store: Arc<dyn AssignmentStore>,
        validator: ContextValidator,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            store,
            validator,
            users,
        }
    }

    /// Validate a create request against the actor's tenant.
    async fn prepare(
        &self,
        actor: &UserContext,
        req: CreateAssignmentRequest,
    ) -> Result<NewAssignment, AccessError> {
        req.validate()?;
        let context_kind = ContextKind::parse(&req.context_kind)?;
        let validity =
            ValidityWindow::parse(req.valid_from.as_deref(), req.valid_until.as_deref())?;

        let user = self
            .users
            .find_user(req.user_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, user_id = req.user_id, "User lookup failed");
                AccessError::ResolutionFailed(e)
            })?
            .filter(|u| !u.is_deleted)
            .ok_or(AccessError::UserNotFound(req.user_id))?;
        if user.tenant_id != actor.tenant_id {
            return Err(AccessError::WrongTenant {
                entity: format!("user {}", req.user_id),
            });
        }

        self.validator
            .validate(&context_kind, req.context_id, actor.tenant_id)
            .await?;

        Ok(NewAssignment {
            tenant_id: actor.tenant_id,
            user_id: req.user_id,
            role_id: req.role_id,
            context_kind,
            context_id: req.context_id,
            trade_specialization: normalize_trade(req.trade_specialization),
            is_primary: req.is_primary,
            validity,
        })
    }

    /// Grant a user a role on a context.
    #[tracing::instrument(
        skip(self, actor, req),
        fields(actor_id = actor.user_id, tenant_id = actor.tenant_id, user_id = req.user_id)
    )]
    pub async fn create(
        &self,
        actor: &UserContext,
        req: CreateAssignmentRequest,
    ) -> Result<Assignment, AccessError> {
        let result = async {
            let new = self.prepare(actor, req).await?;
            let assignment = Assignment::new(new, actor.user_id, Utc::now());
            self.store.insert(&assignment).await?;
            Ok::<_, AccessError>(assignment)
        }
        .await;

        record("create", &result);
        if let Ok(assignment) = &result {
            tracing::info!(
                assignment_id = %assignment.assignment_id,
                context_kind = %assignment.context_kind,
                context_id = assignment.context_id,
                "Assignment created"
            );
        }
        result
    }

    /// Create several assignments. Either every request is valid and every
    /// row is committed, or nothing is.
    #[tracing::instrument(
        skip(self, actor, reqs),
        fields(actor_id = actor.user_id, tenant_id = actor.tenant_id, count = reqs.len())
    )]
    pub async fn bulk_create(
        &self,
        actor: &UserContext,
        reqs: Vec<CreateAssignmentRequest>,
    ) -> Result<Vec<Assignment>, AccessError> {
        let result = async {
            let now = Utc::now();
            let mut assignments = Vec::with_capacity(reqs.len());
            for req in reqs {
                let new = self.prepare(actor, req).await?;
                assignments.push(Assignment::new(new, actor.user_id, now));
            }
            if !assignments.is_empty() {
                self.store.insert_all(&assignments).await?;
            }
            Ok::<_, AccessError>(assignments)
        }
        .await;

        record("bulk_create", &result);
        if let Ok(assignments) = &result {
            tracing::info!(count = assignments.len(), "Assignments created");
        }
        result
    }

    /// Change the mutable fields of a live assignment.
    #[tracing::instrument(
        skip(self, actor, req),
        fields(actor_id = actor.user_id, tenant_id = actor.tenant_id, assignment_id = %assignment_id)
    )]
    pub async fn update(
        &self,
        actor: &UserContext,
        assignment_id: Uuid,
        req: UpdateAssignmentRequest,
    ) -> Result<Assignment, AccessError> {
        let result = self.apply_update(actor, assignment_id, req).await;
        record("update", &result);
        if result.is_ok() {
            tracing::info!("Assignment updated");
        }
        result
    }

    async fn apply_update(
        &self,
        actor: &UserContext,
        assignment_id: Uuid,
        req: UpdateAssignmentRequest,
    ) -> Result<Assignment, AccessError> {
        req.validate()?;

        let mut assignment = self
            .store
            .find_by_id(actor.tenant_id, assignment_id)
            .await?
            .filter(|a| !a.is_deleted)
            .ok_or(AccessError::AssignmentNotFound(assignment_id))?;

        if req.user_id.is_some_and(|id| id != assignment.user_id) {
            return Err(AccessError::ImmutableField("user_id"));
        }
        if let Some(kind) = req.context_kind.as_deref() {
            if ContextKind::parse(kind)? != assignment.context_kind {
                return Err(AccessError::ImmutableField("context_kind"));
            }
        }
        if req.context_id.is_some_and(|id| id != assignment.context_id) {
            return Err(AccessError::ImmutableField("context_id"));
        }

        let valid_from = match req.valid_from.as_deref() {
            Some(raw) => parse_date("valid_from", Some(raw))?,
            None => assignment.validity.valid_from,
        };
        let valid_until = match req.valid_until.as_deref() {
            Some(raw) => parse_date("valid_until", Some(raw))?,
            None => assignment.validity.valid_until,
        };
        assignment.validity = ValidityWindow::new(valid_from, valid_until)?;

        if let Some(role_id) = req.role_id {
            assignment.role_id = role_id;
        }
        if req.trade_specialization.is_some() {
            assignment.trade_specialization = normalize_trade(req.trade_specialization);
        }
        if let Some(is_primary) = req.is_primary {
            assignment.is_primary = is_primary;
        }
        assignment.updated_utc = Utc::now();
        assignment.updated_by = actor.user_id;

        self.store
            .update(&assignment)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AccessError::AssignmentNotFound(assignment_id),
                other => AccessError::from(other),
            })?;
        Ok(assignment)
    }

    /// Soft-delete an assignment. Deleting an already deleted assignment
    /// succeeds without changing it.
    #[tracing::instrument(
        skip(self, actor),
        fields(actor_id = actor.user_id, tenant_id = actor.tenant_id, assignment_id = %assignment_id)
    )]
    pub async fn delete(&self, actor: &UserContext, assignment_id: Uuid) -> Result<(), AccessError> {
        let result = self
            .store
            .soft_delete(actor.tenant_id, assignment_id, actor.user_id, Utc::now())
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AccessError::AssignmentNotFound(assignment_id),
                other => AccessError::from(other),
            });

        record("delete", &result);
        match result? {
            true => tracing::info!("Assignment deleted"),
            false => tracing::debug!("Assignment already deleted"),
        }
        Ok(())
    }

    /// Fetch one assignment of the actor's tenant, deleted or not.
    pub async fn get(
        &self,
        actor: &UserContext,
        assignment_id: Uuid,
    ) -> Result<Assignment, AccessError> {
        self.store
            .find_by_id(actor.tenant_id, assignment_id)
            .await?
            .ok_or(AccessError::AssignmentNotFound(assignment_id))
    }

    pub async fn list_for_user(
        &self,
        actor: &UserContext,
        user_id: i64,
        include_deleted: bool,
    ) -> Result<Vec<Assignment>, AccessError> {
        Ok(self
            .store
            .list_for_user(actor.tenant_id, user_id, include_deleted)
            .await?)
    }
}
