//! Caller identity as seen by access resolution.

use serde::{Deserialize, Serialize};

/// Authenticated caller, extracted from verified token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: i64,
    pub tenant_id: i64,
    #[serde(default)]
    pub is_super_admin: bool,
}

/// Claims payload that does not have the expected shape.
#[derive(Debug, thiserror::Error)]
pub enum ClaimsError {
    #[error("Malformed claims: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Claims must be a JSON object")]
    NotAnObject,

    #[error("Claim '{0}' must be a positive identifier")]
    NonPositiveId(&'static str),
}

impl UserContext {
    /// Parse verified token claims.
    ///
    /// `user_id` and `tenant_id` must be JSON integers and `is_super_admin`,
    /// when present, a JSON boolean. Strings are not coerced: `"5"` in place of
    /// `5` is an error, as is any non-object payload. Unrelated claims are
    /// ignored.
    pub fn from_claims(claims: &serde_json::Value) -> Result<Self, ClaimsError> {
        // The derived visitor also accepts positional sequences.
        if !claims.is_object() {
            return Err(ClaimsError::NotAnObject);
        }
        let ctx = UserContext::deserialize(claims)?;
        if ctx.user_id <= 0 {
            return Err(ClaimsError::NonPositiveId("user_id"));
        }
        if ctx.tenant_id <= 0 {
            return Err(ClaimsError::NonPositiveId("tenant_id"));
        }
        Ok(ctx)
    }
}

/// User registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: i64,
    pub tenant_id: i64,
    pub is_super_admin: bool,
    pub is_deleted: bool,
}

impl From<UserRecord> for UserContext {
    fn from(record: UserRecord) -> Self {
        Self {
            user_id: record.user_id,
            tenant_id: record.tenant_id,
            is_super_admin: record.is_super_admin,
        }
    }
}
