//! Context resolution: which contexts of a kind a user currently holds.

use chrono::{NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::error::AccessError;
use super::store::AssignmentStore;
use crate::models::ContextKind;

/// Read-only view over live assignments.
#[derive(Clone)]
pub struct ContextResolver {
    store: Arc<dyn AssignmentStore>,
}

impl ContextResolver {
    pub fn new(store: Arc<dyn AssignmentStore>) -> Self {
        Self { store }
    }

    /// Context ids granted to `user_id` for `kind` in `tenant_id`, today (UTC).
    pub async fn resolve_contexts(
        &self,
        user_id: i64,
        kind: &ContextKind,
        tenant_id: i64,
    ) -> Result<BTreeSet<i64>, AccessError> {
        self.resolve_contexts_as_of(user_id, kind, tenant_id, Utc::now().date_naive())
            .await
    }

    /// Context ids granted on `as_of`. An empty set means no access.
    #[tracing::instrument(skip(self), fields(context_kind = %kind))]
    pub async fn resolve_contexts_as_of(
        &self,
        user_id: i64,
        kind: &ContextKind,
        tenant_id: i64,
        as_of: NaiveDate,
    ) -> Result<BTreeSet<i64>, AccessError> {
        let ids = self
            .store
            .live_context_ids(tenant_id, user_id, kind, as_of)
            .await
            .map_err(|e| AccessError::ResolutionFailed(anyhow::Error::new(e)))?;

        tracing::debug!(count = ids.len(), "Contexts resolved");
        Ok(ids)
    }
}
