//! Per-tab identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of one running tab.
///
/// Generated once when the tab's coordinator is built and never changed.
/// Only compared for equality; identities carry no ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabIdentity(String);

impl TabIdentity {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TabIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TabIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TabIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
