//! PostgreSQL assignment store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPool;
use std::collections::BTreeSet;
use tracing::{info, instrument};
use uuid::Uuid;

use super::error::StoreError;
use super::metrics::DB_QUERY_DURATION;
use super::store::AssignmentStore;
use crate::models::{Assignment, AssignmentRow, ContextKind};

const ASSIGNMENT_COLUMNS: &str = "assignment_id, tenant_id, user_id, role_id, context_kind, \
     context_id, trade_specialization, is_primary, valid_from, valid_until, created_utc, \
     created_by, updated_utc, updated_by, is_deleted";

/// Assignment store backed by the `context_assignments` table.
#[derive(Clone)]
pub struct PgAssignmentStore {
    pool: PgPool,
}

impl PgAssignmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn into_assignment(row: AssignmentRow) -> Result<Assignment, StoreError> {
        Assignment::try_from(row).map_err(StoreError::CorruptRow)
    }

    async fn insert_with<'e, E>(executor: E, a: &Assignment) -> Result<(), StoreError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO context_assignments (
                assignment_id, tenant_id, user_id, role_id, context_kind, context_id,
                trade_specialization, is_primary, valid_from, valid_until,
                created_utc, created_by, updated_utc, updated_by, is_deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(a.assignment_id)
        .bind(a.tenant_id)
        .bind(a.user_id)
        .bind(a.role_id)
        .bind(a.context_kind.as_str())
        .bind(a.context_id)
        .bind(&a.trade_specialization)
        .bind(a.is_primary)
        .bind(a.validity.valid_from)
        .bind(a.validity.valid_until)
        .bind(a.created_utc)
        .bind(a.created_by)
        .bind(a.updated_utc)
        .bind(a.updated_by)
        .bind(a.is_deleted)
        .execute(executor)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }
}

#[async_trait]
impl AssignmentStore for PgAssignmentStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                StoreError::from_sqlx(e)
            })?;
        Ok(())
    }

    #[instrument(skip(self, assignment), fields(
        tenant_id = assignment.tenant_id,
        user_id = assignment.user_id,
        context_kind = %assignment.context_kind,
        context_id = assignment.context_id
    ))]
    async fn insert(&self, assignment: &Assignment) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_assignment"])
            .start_timer();

        Self::insert_with(&self.pool, assignment).await?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self, assignments), fields(count = assignments.len()))]
    async fn insert_all(&self, assignments: &[Assignment]) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_assignments"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        for assignment in assignments {
            // Dropping the transaction on error rolls it back.
            Self::insert_with(&mut *tx, assignment).await?;
        }
        tx.commit().await.map_err(StoreError::from_sqlx)?;

        timer.observe_duration();
        info!(count = assignments.len(), "Assignments inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(
        &self,
        tenant_id: i64,
        assignment_id: Uuid,
    ) -> Result<Option<Assignment>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_assignment"])
            .start_timer();

        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {} FROM context_assignments WHERE tenant_id = $1 AND assignment_id = $2",
            ASSIGNMENT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(assignment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        timer.observe_duration();
        row.map(Self::into_assignment).transpose()
    }

    #[instrument(skip(self))]
    async fn list_for_user(
        &self,
        tenant_id: i64,
        user_id: i64,
        include_deleted: bool,
    ) -> Result<Vec<Assignment>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_assignments"])
            .start_timer();

        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            r#"
            SELECT {} FROM context_assignments
            WHERE tenant_id = $1 AND user_id = $2 AND ($3 OR is_deleted = FALSE)
            ORDER BY created_utc, assignment_id
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        timer.observe_duration();
        rows.into_iter().map(Self::into_assignment).collect()
    }

    #[instrument(skip(self, assignment), fields(assignment_id = %assignment.assignment_id))]
    async fn update(&self, assignment: &Assignment) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_assignment"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE context_assignments
            SET role_id = $3, trade_specialization = $4, is_primary = $5,
                valid_from = $6, valid_until = $7, updated_utc = $8, updated_by = $9
            WHERE tenant_id = $1 AND assignment_id = $2 AND is_deleted = FALSE
            "#,
        )
        .bind(assignment.tenant_id)
        .bind(assignment.assignment_id)
        .bind(assignment.role_id)
        .bind(&assignment.trade_specialization)
        .bind(assignment.is_primary)
        .bind(assignment.validity.valid_from)
        .bind(assignment.validity.valid_until)
        .bind(assignment.updated_utc)
        .bind(assignment.updated_by)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        timer.observe_duration();
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn soft_delete(
        &self,
        tenant_id: i64,
        assignment_id: Uuid,
        deleted_by: i64,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_assignment"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE context_assignments
            SET is_deleted = TRUE, updated_utc = $3, updated_by = $4
            WHERE tenant_id = $1 AND assignment_id = $2 AND is_deleted = FALSE
            "#,
        )
        .bind(tenant_id)
        .bind(assignment_id)
        .bind(at)
        .bind(deleted_by)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 1 {
            timer.observe_duration();
            return Ok(true);
        }

        let exists: Option<(bool,)> = sqlx::query_as(
            "SELECT is_deleted FROM context_assignments WHERE tenant_id = $1 AND assignment_id = $2",
        )
        .bind(tenant_id)
        .bind(assignment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        timer.observe_duration();
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound),
        }
    }

    #[instrument(skip(self), fields(context_kind = %kind))]
    async fn live_context_ids(
        &self,
        tenant_id: i64,
        user_id: i64,
        kind: &ContextKind,
        as_of: NaiveDate,
    ) -> Result<BTreeSet<i64>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["live_context_ids"])
            .start_timer();

        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT context_id FROM context_assignments
            WHERE tenant_id = $1
              AND user_id = $2
              AND context_kind = $3
              AND is_deleted = FALSE
              AND (valid_from IS NULL OR valid_from <= $4)
              AND (valid_until IS NULL OR valid_until >= $4)
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(kind.as_str())
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Context resolution query failed");
            StoreError::from_sqlx(e)
        })?;

        timer.observe_duration();
        Ok(ids.into_iter().collect())
    }
}
