//! Test helpers for access-service integration tests.
//!
//! Wires the in-memory store and registry so decision, resolver and
//! lifecycle behaviour can be exercised without a database.

#![allow(dead_code)]

use access_service::models::{
    Assignment, ContextKind, NewAssignment, UserContext, UserRecord, ValidityWindow,
};
use access_service::services::{
    AssignmentStore, ContextLookup, ContextRecord, ContextValidator, InMemoryAssignmentStore,
    InMemoryRegistry, ScopeLocator, UserDirectory,
};
use access_service::AccessService;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const TENANT: i64 = 1;
pub const OTHER_TENANT: i64 = 2;
pub const ADMIN_ID: i64 = 900;
pub const ROLE_MANAGER: i64 = 2;
pub const ROLE_VIEWER: i64 = 3;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn caller(user_id: i64) -> UserContext {
    UserContext {
        user_id,
        tenant_id: TENANT,
        is_super_admin: false,
    }
}

pub fn admin() -> UserContext {
    UserContext {
        user_id: ADMIN_ID,
        tenant_id: TENANT,
        is_super_admin: true,
    }
}

/// Access service over in-memory state with a seeded registry.
pub struct TestApp {
    pub store: Arc<InMemoryAssignmentStore>,
    pub registry: InMemoryRegistry,
    pub service: AccessService,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryAssignmentStore::new());
        let registry = InMemoryRegistry::new();

        let service = AccessService::new(
            store.clone(),
            Arc::new(registry.clone()),
            Arc::new(registry.clone()),
            validator_for(&registry),
        );

        let app = Self {
            store,
            registry,
            service,
        };
        app.seed();
        app
    }

    /// Tenant 1: organization 1, locations 6 and 7, projects 30 and 31 in
    /// location 6, project 45 in location 7, users 11 to 15.
    /// Tenant 2: organization 2, location 8, project 50, user 21.
    fn seed(&self) {
        self.add_context(ContextKind::Organization, 1, TENANT);
        self.add_context(ContextKind::Location, 6, TENANT);
        self.add_context(ContextKind::Location, 7, TENANT);
        self.add_project(30, 6, TENANT);
        self.add_project(31, 6, TENANT);
        self.add_project(45, 7, TENANT);

        self.add_context(ContextKind::Organization, 2, OTHER_TENANT);
        self.add_context(ContextKind::Location, 8, OTHER_TENANT);
        self.add_project(50, 8, OTHER_TENANT);

        for user_id in [11, 12, 13, 14, 15, ADMIN_ID] {
            self.add_user(user_id, TENANT);
        }
        self.add_user(21, OTHER_TENANT);
    }

    pub fn add_user(&self, user_id: i64, tenant_id: i64) {
        self.registry.add_user(UserRecord {
            user_id,
            tenant_id,
            is_super_admin: false,
            is_deleted: false,
        })
        .expect("Failed to seed user");
    }

    pub fn add_context(&self, kind: ContextKind, context_id: i64, tenant_id: i64) {
        self.registry.add_context(
            kind,
            context_id,
            ContextRecord {
                tenant_id,
                is_deleted: false,
            },
        )
        .expect("Failed to seed context");
    }

    pub fn add_project(&self, project_id: i64, location_id: i64, tenant_id: i64) {
        self.registry
            .add_project(tenant_id, project_id, location_id)
            .expect("Failed to seed project");
    }

    /// Insert an assignment straight into the store, bypassing validation.
    pub async fn grant(
        &self,
        user_id: i64,
        kind: ContextKind,
        context_id: i64,
        validity: ValidityWindow,
    ) -> Assignment {
        self.grant_in(TENANT, user_id, kind, context_id, validity)
            .await
    }

    pub async fn grant_in(
        &self,
        tenant_id: i64,
        user_id: i64,
        kind: ContextKind,
        context_id: i64,
        validity: ValidityWindow,
    ) -> Assignment {
        let assignment = Assignment::new(
            NewAssignment {
                tenant_id,
                user_id,
                role_id: ROLE_MANAGER,
                context_kind: kind,
                context_id,
                trade_specialization: None,
                is_primary: false,
                validity,
            },
            ADMIN_ID,
            Utc::now(),
        );
        self.store
            .insert(&assignment)
            .await
            .expect("Failed to seed assignment");
        assignment
    }
}

/// Validator with the three active kinds backed by `registry`.
pub fn validator_for(registry: &InMemoryRegistry) -> ContextValidator {
    ContextValidator::new()
        .with_lookup(
            ContextKind::Organization,
            registry.context_lookup(ContextKind::Organization),
        )
        .with_lookup(
            ContextKind::Location,
            registry.context_lookup(ContextKind::Location),
        )
        .with_lookup(
            ContextKind::Project,
            registry.context_lookup(ContextKind::Project),
        )
}

/// Registry whose every lookup fails, as when the backing database is down.
pub struct UnavailableRegistry;

#[async_trait]
impl UserDirectory for UnavailableRegistry {
    async fn find_user(&self, _: i64) -> Result<Option<UserRecord>, anyhow::Error> {
        Err(anyhow::anyhow!("registry unreachable"))
    }
}

#[async_trait]
impl ContextLookup for UnavailableRegistry {
    async fn find_context(&self, _: i64) -> Result<Option<ContextRecord>, anyhow::Error> {
        Err(anyhow::anyhow!("registry unreachable"))
    }
}

#[async_trait]
impl ScopeLocator for UnavailableRegistry {
    async fn projects_in_location(&self, _: i64, _: i64) -> Result<BTreeSet<i64>, anyhow::Error> {
        Err(anyhow::anyhow!("registry unreachable"))
    }
}

pub fn window(from: Option<&str>, until: Option<&str>) -> ValidityWindow {
    ValidityWindow::new(from.map(date), until.map(date)).expect("valid test window")
}
