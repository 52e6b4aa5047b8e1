//! User identities and the resource names derived from them.
//!
//! Every orchestrator resource belonging to one user's workspace carries the
//! same name, so the name is the only index needed to find the full set.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum length of a user id. Together with the prefix this keeps derived
/// names within the 63 character DNS label limit.
pub const MAX_USER_ID_LEN: usize = 40;

/// Default prefix for derived resource names.
pub const DEFAULT_PREFIX: &str = "workspace-";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidUserId {
    #[error("user id is empty")]
    Empty,

    #[error("user id is longer than {MAX_USER_ID_LEN} characters")]
    TooLong,

    #[error("user id contains invalid character {0:?}")]
    InvalidChar(char),

    #[error("user id must not start or end with '-'")]
    EdgeHyphen,
}

/// Opaque identifier of the caller, supplied by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidUserId> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(InvalidUserId::Empty);
        }
        if raw.len() > MAX_USER_ID_LEN {
            return Err(InvalidUserId::TooLong);
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(InvalidUserId::InvalidChar(c));
        }
        if raw.starts_with('-') || raw.ends_with('-') {
            return Err(InvalidUserId::EdgeHyphen);
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl TryFrom<String> for UserId {
    type Error = InvalidUserId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::str::FromStr for UserId {
    type Err = InvalidUserId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name shared by the compute unit, network service and route of one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Externally visible path segment for the route, e.g. `/workspace-42/`.
    pub fn route_path(&self) -> String {
        format!("/{}/", self.0)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceNamer {
    prefix: String,
}

impl ResourceNamer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn name(&self, user: &UserId) -> ResourceName {
        ResourceName(format!("{}{}", self.prefix, user.as_str()))
    }
}

impl Default for ResourceNamer {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
