//! Persisted session marker.

use crate::registry::{Account, Registry};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage key of the session marker.
pub const SESSION_KEY: &str = "faceAuth";

/// Session marker written after a confirmed match.
///
/// Serialized as `{"status": bool, "account": {...}, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub status: bool,
    #[serde(default)]
    pub account: Option<Account>,
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn authenticated(account: Account) -> Self {
        Self {
            status: true,
            account: Some(account),
            id: Some(Uuid::new_v4()),
            created_at: Some(Utc::now()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            status: false,
            account: None,
            id: None,
            created_at: None,
        }
    }

    /// True when the marker is set, names a registered account and has not
    /// outlived `ttl` (if any).
    pub fn is_valid(&self, registry: &Registry, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        let Some(account) = self.account.as_ref().filter(|_| self.status) else {
            return false;
        };
        if !registry.contains(account) {
            return false;
        }
        match (ttl, self.created_at) {
            (Some(ttl), Some(created)) => now - created < ttl,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}
