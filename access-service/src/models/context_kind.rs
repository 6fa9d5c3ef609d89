//! Context kind - the resource category an assignment grants.

use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_KIND_LEN: usize = 50;

/// Resource category an assignment grants.
///
/// The three active kinds are closed variants. Any other well-formed name
/// (e.g. `department`, `equipment`, `phase`) is carried as an
/// [`ContextKind::Extension`] and only becomes assignable once a lookup is
/// registered for it with the context validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContextKind {
    Organization,
    Location,
    Project,
    Extension(ExtensionKind),
}

/// Name of a non-active context kind. Only [`ContextKind::parse`] builds
/// one, so the name is always lowercase and never an active kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionKind(String);

impl ExtensionKind {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Rejected context kind name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid context kind '{0}'")]
pub struct InvalidContextKind(pub String);

impl ContextKind {
    pub fn as_str(&self) -> &str {
        match self {
            ContextKind::Organization => "organization",
            ContextKind::Location => "location",
            ContextKind::Project => "project",
            ContextKind::Extension(name) => name.as_str(),
        }
    }

    /// Parse a kind name. Names are case-insensitive and must be
    /// `[a-z0-9_]`, starting with a letter.
    pub fn parse(s: &str) -> Result<Self, InvalidContextKind> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "organization" => Ok(ContextKind::Organization),
            "location" => Ok(ContextKind::Location),
            "project" => Ok(ContextKind::Project),
            _ => {
                let well_formed = name.len() <= MAX_KIND_LEN
                    && name.starts_with(|c: char| c.is_ascii_lowercase())
                    && name
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
                if well_formed {
                    Ok(ContextKind::Extension(ExtensionKind(name)))
                } else {
                    Err(InvalidContextKind(s.to_string()))
                }
            }
        }
    }

    pub fn is_extension(&self) -> bool {
        matches!(self, ContextKind::Extension(_))
    }

    /// Whether resources of this kind live under a location and can be
    /// narrowed by a location scope parameter.
    pub fn supports_location_scope(&self) -> bool {
        !matches!(self, ContextKind::Organization | ContextKind::Location)
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContextKind {
    type Err = InvalidContextKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContextKind::parse(s)
    }
}

impl TryFrom<String> for ContextKind {
    type Error = InvalidContextKind;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ContextKind::parse(&s)
    }
}

impl From<ContextKind> for String {
    fn from(kind: ContextKind) -> Self {
        kind.as_str().to_string()
    }
}
