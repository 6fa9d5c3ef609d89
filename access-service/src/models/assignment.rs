//! Context assignment model - time-bounded user→role→context bindings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::ContextKind;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Optional date bounds of an assignment. Both ends are inclusive; a missing
/// end is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
}

/// Rejected validity window input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("Invalid {field} '{value}', expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("valid_until ({until}) is before valid_from ({from})")]
    EndBeforeStart { from: NaiveDate, until: NaiveDate },
}

impl ValidityWindow {
    pub fn new(
        valid_from: Option<NaiveDate>,
        valid_until: Option<NaiveDate>,
    ) -> Result<Self, WindowError> {
        if let (Some(from), Some(until)) = (valid_from, valid_until) {
            if until < from {
                return Err(WindowError::EndBeforeStart { from, until });
            }
        }
        Ok(Self {
            valid_from,
            valid_until,
        })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Parse optional `YYYY-MM-DD` bounds. Blank strings count as unset.
    pub fn parse(valid_from: Option<&str>, valid_until: Option<&str>) -> Result<Self, WindowError> {
        Self::new(
            parse_date("valid_from", valid_from)?,
            parse_date("valid_until", valid_until)?,
        )
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.valid_from.is_none_or(|from| from <= date)
            && self.valid_until.is_none_or(|until| until >= date)
    }
}

pub(crate) fn parse_date(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<NaiveDate>, WindowError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Some)
            .map_err(|_| WindowError::InvalidDate {
                field,
                value: raw.to_string(),
            }),
    }
}

/// Identity of a grant for uniqueness among live rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrantKey {
    pub user_id: i64,
    pub role_id: i64,
    pub context_kind: ContextKind,
    pub context_id: i64,
}

/// Context assignment entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: Uuid,
    pub tenant_id: i64,
    pub user_id: i64,
    pub role_id: i64,
    pub context_kind: ContextKind,
    pub context_id: i64,
    pub trade_specialization: Option<String>,
    pub is_primary: bool,
    pub validity: ValidityWindow,
    pub created_utc: DateTime<Utc>,
    pub created_by: i64,
    pub updated_utc: DateTime<Utc>,
    pub updated_by: i64,
    pub is_deleted: bool,
}

/// Attributes of a grant that has passed validation.
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub tenant_id: i64,
    pub user_id: i64,
    pub role_id: i64,
    pub context_kind: ContextKind,
    pub context_id: i64,
    pub trade_specialization: Option<String>,
    pub is_primary: bool,
    pub validity: ValidityWindow,
}

impl Assignment {
    /// Create a new live assignment recorded as made by `actor_id` at `now`.
    pub fn new(new: NewAssignment, actor_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            assignment_id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            user_id: new.user_id,
            role_id: new.role_id,
            context_kind: new.context_kind,
            context_id: new.context_id,
            trade_specialization: new.trade_specialization,
            is_primary: new.is_primary,
            validity: new.validity,
            created_utc: now,
            created_by: actor_id,
            updated_utc: now,
            updated_by: actor_id,
            is_deleted: false,
        }
    }

    /// Live on `date`: not deleted and inside the validity window.
    pub fn is_live_on(&self, date: NaiveDate) -> bool {
        !self.is_deleted && self.validity.contains(date)
    }

    pub fn grant_key(&self) -> GrantKey {
        GrantKey {
            user_id: self.user_id,
            role_id: self.role_id,
            context_kind: self.context_kind.clone(),
            context_id: self.context_id,
        }
    }
}

/// Raw `context_assignments` row.
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentRow {
    pub assignment_id: Uuid,
    pub tenant_id: i64,
    pub user_id: i64,
    pub role_id: i64,
    pub context_kind: String,
    pub context_id: i64,
    pub trade_specialization: Option<String>,
    pub is_primary: bool,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
    pub created_by: i64,
    pub updated_utc: DateTime<Utc>,
    pub updated_by: i64,
    pub is_deleted: bool,
}

impl TryFrom<AssignmentRow> for Assignment {
    type Error = String;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        let context_kind = ContextKind::parse(&row.context_kind)
            .map_err(|e| format!("assignment {}: {}", row.assignment_id, e))?;
        Ok(Self {
            assignment_id: row.assignment_id,
            tenant_id: row.tenant_id,
            user_id: row.user_id,
            role_id: row.role_id,
            context_kind,
            context_id: row.context_id,
            trade_specialization: row.trade_specialization,
            is_primary: row.is_primary,
            // Stored rows satisfy the range CHECK constraint.
            validity: ValidityWindow {
                valid_from: row.valid_from,
                valid_until: row.valid_until,
            },
            created_utc: row.created_utc,
            created_by: row.created_by,
            updated_utc: row.updated_utc,
            updated_by: row.updated_by,
            is_deleted: row.is_deleted,
        })
    }
}

/// Request to grant a user a role on a context.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAssignmentRequest {
    #[validate(range(min = 1))]
    pub user_id: i64,
    #[validate(range(min = 1))]
    pub role_id: i64,
    #[validate(length(min = 1, max = 50))]
    pub context_kind: String,
    #[validate(range(min = 1))]
    pub context_id: i64,
    #[validate(length(max = 100))]
    pub trade_specialization: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
}

/// Request to change an assignment.
///
/// Only `role_id`, `trade_specialization`, `is_primary` and the date bounds
/// may change. An empty string clears `trade_specialization` or a date bound.
/// The identity fields are accepted so that an attempt to change them can be
/// rejected explicitly; supplying their current value is a no-op.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAssignmentRequest {
    #[validate(range(min = 1))]
    pub role_id: Option<i64>,
    #[validate(length(max = 100))]
    pub trade_specialization: Option<String>,
    pub is_primary: Option<bool>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub user_id: Option<i64>,
    pub context_kind: Option<String>,
    pub context_id: Option<i64>,
}

/// Assignment response for API.
#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub assignment_id: Uuid,
    pub tenant_id: i64,
    pub user_id: i64,
    pub role_id: i64,
    pub context_kind: ContextKind,
    pub context_id: i64,
    pub trade_specialization: Option<String>,
    pub is_primary: bool,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub is_deleted: bool,
    pub is_live: bool,
}

impl From<Assignment> for AssignmentResponse {
    fn from(a: Assignment) -> Self {
        let is_live = a.is_live_on(Utc::now().date_naive());
        Self {
            assignment_id: a.assignment_id,
            tenant_id: a.tenant_id,
            user_id: a.user_id,
            role_id: a.role_id,
            context_kind: a.context_kind,
            context_id: a.context_id,
            trade_specialization: a.trade_specialization,
            is_primary: a.is_primary,
            valid_from: a.validity.valid_from,
            valid_until: a.validity.valid_until,
            is_deleted: a.is_deleted,
            is_live,
        }
    }
}
