pub mod config;
pub mod db;
pub mod models;
pub mod services;

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::AccessConfig;
use crate::models::{ContextKind, Decision, UserContext};
use crate::services::{
    AccessDecider, AccessError, AssignmentManager, AssignmentStore, ContextResolver,
    ContextValidator, PgAssignmentStore, PgEntityRegistry, ScopeLocator, UserDirectory,
};
use service_core::error::AppError;

/// Wired access resolution: validator, resolver, decider and lifecycle
/// manager sharing one assignment store.
#[derive(Clone)]
pub struct AccessService {
    pub store: Arc<dyn AssignmentStore>,
    pub validator: ContextValidator,
    pub resolver: ContextResolver,
    pub decider: AccessDecider,
    pub assignments: AssignmentManager,
}

impl AccessService {
    pub fn new(
        store: Arc<dyn AssignmentStore>,
        users: Arc<dyn UserDirectory>,
        locator: Arc<dyn ScopeLocator>,
        validator: ContextValidator,
    ) -> Self {
        let resolver = ContextResolver::new(store.clone());
        let decider = AccessDecider::new(resolver.clone(), locator);
        let assignments = AssignmentManager::new(store.clone(), validator.clone(), users);
        Self {
            store,
            validator,
            resolver,
            decider,
            assignments,
        }
    }

    /// Connect to PostgreSQL, apply migrations and wire the Postgres-backed
    /// store and registries for the organization, location and project kinds.
    pub async fn connect(config: &AccessConfig) -> Result<Self, AppError> {
        let pool = db::create_pool(&config.database)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;
        db::run_migrations(&pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;

        let registry = Arc::new(PgEntityRegistry::new(pool.clone()));
        let mut validator = ContextValidator::new();
        for kind in [
            ContextKind::Organization,
            ContextKind::Location,
            ContextKind::Project,
        ] {
            if let Some(lookup) = registry.context_lookup(&kind) {
                validator.register(kind, lookup);
            }
        }

        Ok(Self::new(
            Arc::new(PgAssignmentStore::new(pool)),
            registry.clone(),
            registry,
            validator,
        ))
    }

    pub async fn resolve_contexts(
        &self,
        user_id: i64,
        kind: &ContextKind,
        tenant_id: i64,
    ) -> Result<BTreeSet<i64>, AccessError> {
        self.resolver.resolve_contexts(user_id, kind, tenant_id).await
    }

    pub async fn decide(
        &self,
        user: &UserContext,
        tenant_id: i64,
        requested_kind: &ContextKind,
        scope: Option<i64>,
    ) -> Result<Decision, AccessError> {
        self.decider
            .decide(user, tenant_id, requested_kind, scope)
            .await
    }

    pub async fn decide_as_of(
        &self,
        user: &UserContext,
        tenant_id: i64,
        requested_kind: &ContextKind,
        scope: Option<i64>,
        as_of: NaiveDate,
    ) -> Result<Decision, AccessError> {
        self.decider
            .decide_as_of(user, tenant_id, requested_kind, scope, as_of)
            .await
    }

    pub async fn health_check(&self) -> Result<(), AccessError> {
        Ok(self.store.health_check().await?)
    }
}
