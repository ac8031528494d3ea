//! Users and their provider credentials.
//!
//! Credentials are owned exclusively by the credential gateway; the rest
//! of the pipeline only ever sees an authenticated client handle.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External data providers a user can link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Calendar events source.
    Calendar,
    /// Shared/recent documents source.
    Documents,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Documents => "documents",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "calendar" => Some(Self::Calendar),
            "documents" => Some(Self::Documents),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscriber of the podcast service.
///
/// Users are never hard-deleted while episodes reference them; disabling
/// a user halts generation but keeps published episodes available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    pub email: String,

    /// Timezone all calendar events are normalized to.
    pub timezone: Tz,

    /// Opaque unguessable token used in the feed URL.
    pub feed_token: String,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, timezone: Tz) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            timezone,
            feed_token: Uuid::new_v4().simple().to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Display name used in feed metadata (local part of the email).
    pub fn display_name(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

/// Per-user, per-provider OAuth token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: Uuid,

    pub provider: Provider,

    pub access_token: String,

    pub refresh_token: Option<String>,

    pub expires_at: DateTime<Utc>,

    /// Scopes granted at link time.
    pub scopes: Vec<String>,

    /// Set when the provider revoked the grant or a refresh failed.
    pub revoked: bool,
}

impl Credential {
    /// Whether the access token should be refreshed before use.
    ///
    /// Refresh is proactive: a token expiring within the safety margin is
    /// treated as already stale.
    pub fn needs_refresh(&self, margin: Duration) -> bool {
        self.expires_at <= Utc::now() + margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_token_unique_per_user() {
        let a = User::new("a@example.com", chrono_tz::UTC);
        let b = User::new("b@example.com", chrono_tz::UTC);
        assert_ne!(a.feed_token, b.feed_token);
        assert_eq!(a.feed_token.len(), 32);
    }

    #[test]
    fn test_display_name() {
        let user = User::new("casey@example.com", chrono_tz::America::New_York);
        assert_eq!(user.display_name(), "casey");
    }

    #[test]
    fn test_needs_refresh_margin() {
        let mut cred = Credential {
            user_id: Uuid::new_v4(),
            provider: Provider::Calendar,
            access_token: "tok".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Utc::now() + Duration::minutes(2),
            scopes: vec![],
            revoked: false,
        };
        assert!(cred.needs_refresh(Duration::minutes(5)));

        cred.expires_at = Utc::now() + Duration::hours(1);
        assert!(!cred.needs_refresh(Duration::minutes(5)));
    }
}
