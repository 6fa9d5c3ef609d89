//! Context validation at assignment-creation time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::error::AccessError;
use super::registry::ContextLookup;
use crate::models::ContextKind;

/// Confirms a context exists, is not deleted and belongs to the tenant.
///
/// Each kind needs a registered [`ContextLookup`]; a kind without one is
/// rejected, including the active kinds.
#[derive(Clone, Default)]
pub struct ContextValidator {
    lookups: HashMap<ContextKind, Arc<dyn ContextLookup>>,
}

impl fmt::Debug for ContextValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.lookups.keys().map(ContextKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("ContextValidator")
            .field("kinds", &kinds)
            .finish()
    }
}

impl ContextValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookup(mut self, kind: ContextKind, lookup: Arc<dyn ContextLookup>) -> Self {
        self.register(kind, lookup);
        self
    }

    /// Register (or replace) the lookup for `kind`.
    pub fn register(&mut self, kind: ContextKind, lookup: Arc<dyn ContextLookup>) {
        self.lookups.insert(kind, lookup);
    }

    pub fn supports(&self, kind: &ContextKind) -> bool {
        self.lookups.contains_key(kind)
    }

    #[tracing::instrument(skip(self), fields(context_kind = %kind))]
    pub async fn validate(
        &self,
        kind: &ContextKind,
        context_id: i64,
        tenant_id: i64,
    ) -> Result<(), AccessError> {
        let lookup = self
            .lookups
            .get(kind)
            .ok_or_else(|| AccessError::UnregisteredContextKind(kind.clone()))?;

        let record = lookup.find_context(context_id).await.map_err(|e| {
            tracing::error!(error = %e, "Context lookup failed");
            AccessError::ResolutionFailed(e)
        })?;

        match record {
            Some(record) if record.is_deleted => Err(AccessError::ContextNotFound {
                kind: kind.clone(),
                context_id,
            }),
            Some(record) if record.tenant_id != tenant_id => Err(AccessError::WrongTenant {
                entity: format!("{} {}", kind, context_id),
            }),
            Some(_) => Ok(()),
            None => Err(AccessError::ContextNotFound {
                kind: kind.clone(),
                context_id,
            }),
        }
    }
}
