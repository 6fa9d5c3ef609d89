//! Access decision outcomes.

use serde::Serialize;
use std::collections::BTreeSet;

/// Outcome of an access decision. Every variant is a legitimate result;
/// failures to decide are reported as errors instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "ids", rename_all = "snake_case")]
pub enum Decision {
    /// Every resource of the requested kind in the tenant.
    AllInTenant,
    /// Every resource under the given location(s).
    AllInScope(BTreeSet<i64>),
    /// Exactly these resources.
    Subset(BTreeSet<i64>),
    /// Location-level access exists but a location must be chosen first.
    RequiresScopeSelection,
    /// The requested scope is outside the caller's grants.
    Forbidden,
    /// The caller holds no live grant.
    NoAccess,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::AllInTenant => "all_in_tenant",
            Decision::AllInScope(_) => "all_in_scope",
            Decision::Subset(_) => "subset",
            Decision::RequiresScopeSelection => "requires_scope_selection",
            Decision::Forbidden => "forbidden",
            Decision::NoAccess => "no_access",
        }
    }

    /// Whether the caller must be shown an empty result.
    pub fn is_empty(&self) -> bool {
        match self {
            Decision::AllInTenant => false,
            Decision::AllInScope(ids) | Decision::Subset(ids) => ids.is_empty(),
            Decision::RequiresScopeSelection | Decision::Forbidden | Decision::NoAccess => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_tagged() {
        let json = serde_json::to_value(Decision::Subset(BTreeSet::from([45, 30]))).unwrap();
        assert_eq!(json, serde_json::json!({"decision": "subset", "ids": [30, 45]}));
        let json = serde_json::to_value(Decision::Forbidden).unwrap();
        assert_eq!(json, serde_json::json!({"decision": "forbidden"}));
    }

    #[test]
    fn test_is_empty() {
        assert!(!Decision::AllInTenant.is_empty());
        assert!(!Decision::AllInScope(BTreeSet::from([6])).is_empty());
        assert!(Decision::Subset(BTreeSet::new()).is_empty());
        assert!(Decision::RequiresScopeSelection.is_empty());
        assert!(Decision::NoAccess.is_empty());
    }
}
