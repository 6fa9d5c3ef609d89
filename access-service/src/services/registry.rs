//! External registries consulted by access resolution.
//!
//! Users, organizations, locations and projects are owned by other parts of
//! the platform. These traits are the read-only views this crate needs.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::models::{ContextKind, UserRecord};

/// Ownership and deletion state of a context entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextRecord {
    pub tenant_id: i64,
    pub is_deleted: bool,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, anyhow::Error>;
}

/// Existence lookup for one context kind.
#[async_trait]
pub trait ContextLookup: Send + Sync {
    async fn find_context(&self, context_id: i64) -> Result<Option<ContextRecord>, anyhow::Error>;
}

/// Resolves which projects live under a location.
#[async_trait]
pub trait ScopeLocator: Send + Sync {
    async fn projects_in_location(
        &self,
        tenant_id: i64,
        location_id: i64,
    ) -> Result<BTreeSet<i64>, anyhow::Error>;
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// Registry views over the platform's entity tables.
#[derive(Clone)]
pub struct PgEntityRegistry {
    pool: PgPool,
}

impl PgEntityRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lookup for one of the active context kinds. Extension kinds have no
    /// table here and must be registered by the embedder.
    pub fn context_lookup(&self, kind: &ContextKind) -> Option<Arc<dyn ContextLookup>> {
        let table = match kind {
            ContextKind::Organization => "organizations",
            ContextKind::Location => "locations",
            ContextKind::Project => "projects",
            ContextKind::Extension(_) => return None,
        };
        Some(Arc::new(PgContextTable {
            pool: self.pool.clone(),
            table,
        }))
    }
}

#[async_trait]
impl UserDirectory for PgEntityRegistry {
    async fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, anyhow::Error> {
        let row: Option<(i64, i64, bool, bool)> = sqlx::query_as(
            "SELECT id, tenant_id, is_super_admin, is_deleted FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(user_id, tenant_id, is_super_admin, is_deleted)| UserRecord {
                user_id,
                tenant_id,
                is_super_admin,
                is_deleted,
            },
        ))
    }
}

#[async_trait]
impl ScopeLocator for PgEntityRegistry {
    async fn projects_in_location(
        &self,
        tenant_id: i64,
        location_id: i64,
    ) -> Result<BTreeSet<i64>, anyhow::Error> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM projects
            WHERE tenant_id = $1 AND location_id = $2 AND is_deleted = FALSE
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }
}

struct PgContextTable {
    pool: PgPool,
    table: &'static str,
}

#[async_trait]
impl ContextLookup for PgContextTable {
    async fn find_context(&self, context_id: i64) -> Result<Option<ContextRecord>, anyhow::Error> {
        let row: Option<(i64, bool)> = sqlx::query_as(&format!(
            "SELECT tenant_id, is_deleted FROM {} WHERE id = $1",
            self.table
        ))
        .bind(context_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(tenant_id, is_deleted)| ContextRecord {
            tenant_id,
            is_deleted,
        }))
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Default)]
struct RegistryState {
    users: HashMap<i64, UserRecord>,
    contexts: HashMap<(ContextKind, i64), ContextRecord>,
    project_locations: HashMap<i64, (i64, i64)>,
}

/// In-process registry for tests and embedders without a database.
#[derive(Default, Clone)]
pub struct InMemoryRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RegistryState) -> T) -> Result<T, anyhow::Error> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| anyhow::anyhow!("Registry mutex poisoned: {}", e))?;
        Ok(f(&mut state))
    }

    pub fn add_user(&self, user: UserRecord) -> Result<(), anyhow::Error> {
        self.with_state(|s| {
            s.users.insert(user.user_id, user);
        })
    }

    pub fn add_context(
        &self,
        kind: ContextKind,
        context_id: i64,
        record: ContextRecord,
    ) -> Result<(), anyhow::Error> {
        self.with_state(|s| {
            s.contexts.insert((kind, context_id), record);
        })
    }

    /// Register a project under a location. Also records the project as a
    /// live context of the given tenant.
    pub fn add_project(
        &self,
        tenant_id: i64,
        project_id: i64,
        location_id: i64,
    ) -> Result<(), anyhow::Error> {
        self.with_state(|s| {
            s.project_locations
                .insert(project_id, (tenant_id, location_id));
            s.contexts.insert(
                (ContextKind::Project, project_id),
                ContextRecord {
                    tenant_id,
                    is_deleted: false,
                },
            );
        })
    }

    /// Lookup for `kind` backed by this registry.
    pub fn context_lookup(&self, kind: ContextKind) -> Arc<dyn ContextLookup> {
        Arc::new(InMemoryContextLookup {
            registry: self.clone(),
            kind,
        })
    }
}

#[async_trait]
impl UserDirectory for InMemoryRegistry {
    async fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, anyhow::Error> {
        self.with_state(|s| s.users.get(&user_id).copied())
    }
}

#[async_trait]
impl ScopeLocator for InMemoryRegistry {
    async fn projects_in_location(
        &self,
        tenant_id: i64,
        location_id: i64,
    ) -> Result<BTreeSet<i64>, anyhow::Error> {
        self.with_state(|s| {
            s.project_locations
                .iter()
                .filter(|(_, owner)| **owner == (tenant_id, location_id))
                .filter(|(id, _)| {
                    s.contexts
                        .get(&(ContextKind::Project, **id))
                        .is_some_and(|c| !c.is_deleted)
                })
                .map(|(id, _)| *id)
                .collect()
        })
    }
}

struct InMemoryContextLookup {
    registry: InMemoryRegistry,
    kind: ContextKind,
}

#[async_trait]
impl ContextLookup for InMemoryContextLookup {
    async fn find_context(&self, context_id: i64) -> Result<Option<ContextRecord>, anyhow::Error> {
        self.registry
            .with_state(|s| s.contexts.get(&(self.kind.clone(), context_id)).copied())
    }
}
