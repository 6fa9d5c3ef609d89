//! Access decision procedure.
//!
//! Grants are evaluated in a fixed order and the first level that yields
//! anything wins:
//!
//! 1. super-admin: everything in the caller's own tenant
//! 2. organization grants: everything in the tenant
//! 3. location grants: the requested location, or a prompt to choose one
//! 4. project grants: the granted projects, narrowed to a location if given
//!
//! Lower levels are never merged into a higher one.

use chrono::{NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::error::AccessError;
use super::metrics::DECISIONS_TOTAL;
use super::registry::ScopeLocator;
use super::resolver::ContextResolver;
use crate::models::{ContextKind, Decision, UserContext};

#[derive(Clone)]
pub struct AccessDecider {
    resolver: ContextResolver,
    locator: Arc<dyn ScopeLocator>,
}

impl AccessDecider {
    pub fn new(resolver: ContextResolver, locator: Arc<dyn ScopeLocator>) -> Self {
        Self { resolver, locator }
    }

    /// Decide what `user` may see of `requested_kind` in `tenant_id` today.
    ///
    /// `scope` is an optional location id chosen by the caller.
    pub async fn decide(
        &self,
        user: &UserContext,
        tenant_id: i64,
        requested_kind: &ContextKind,
        scope: Option<i64>,
    ) -> Result<Decision, AccessError> {
        self.decide_as_of(
            user,
            tenant_id,
            requested_kind,
            scope,
            Utc::now().date_naive(),
        )
        .await
    }

    #[tracing::instrument(
        skip(self, user),
        fields(user_id = user.user_id, requested_kind = %requested_kind, scope = ?scope)
    )]
    pub async fn decide_as_of(
        &self,
        user: &UserContext,
        tenant_id: i64,
        requested_kind: &ContextKind,
        scope: Option<i64>,
        as_of: NaiveDate,
    ) -> Result<Decision, AccessError> {
        let decision = self
            .evaluate(user, tenant_id, requested_kind, scope, as_of)
            .await?;

        DECISIONS_TOTAL
            .with_label_values(&[decision.as_str()])
            .inc();
        tracing::debug!(decision = decision.as_str(), "Access decided");
        Ok(decision)
    }

    async fn evaluate(
        &self,
        user: &UserContext,
        tenant_id: i64,
        requested_kind: &ContextKind,
        scope: Option<i64>,
        as_of: NaiveDate,
    ) -> Result<Decision, AccessError> {
        // Grants never reach across tenants, super-admin included.
        if user.tenant_id != tenant_id {
            tracing::warn!(
                user_tenant_id = user.tenant_id,
                tenant_id,
                "Access requested outside the caller's tenant"
            );
            return Ok(Decision::Forbidden);
        }

        if user.is_super_admin {
            return Ok(match scope {
                Some(location_id) if requested_kind.supports_location_scope() => {
                    Decision::AllInScope(BTreeSet::from([location_id]))
                }
                _ => Decision::AllInTenant,
            });
        }

        let organizations = self
            .resolver
            .resolve_contexts_as_of(user.user_id, &ContextKind::Organization, tenant_id, as_of)
            .await?;
        if !organizations.is_empty() {
            return Ok(Decision::AllInTenant);
        }

        let locations = self
            .resolver
            .resolve_contexts_as_of(user.user_id, &ContextKind::Location, tenant_id, as_of)
            .await?;
        if !locations.is_empty() {
            return Ok(match scope {
                Some(location_id) if locations.contains(&location_id) => {
                    Decision::AllInScope(BTreeSet::from([location_id]))
                }
                Some(_) => Decision::Forbidden,
                None => Decision::RequiresScopeSelection,
            });
        }

        let projects = self
            .resolver
            .resolve_contexts_as_of(user.user_id, &ContextKind::Project, tenant_id, as_of)
            .await?;
        if !projects.is_empty() {
            let Some(location_id) = scope else {
                return Ok(Decision::Subset(projects));
            };
            let in_location = self
                .locator
                .projects_in_location(tenant_id, location_id)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, location_id, "Scope lookup failed");
                    AccessError::ResolutionFailed(e)
                })?;
            return Ok(Decision::Subset(
                projects.intersection(&in_location).copied().collect(),
            ));
        }

        Ok(Decision::NoAccess)
    }
}
