use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Client identity registered with the authorization server.
///
/// Loaded once per process. Not serializable, and `Debug` hides the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// The persisted credential: bearer token, refresh token and absolute expiry.
///
/// Replaced wholesale on every login or refresh, never patched in place.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// Milliseconds since the Unix epoch.
    pub expires_at: i64,
}

impl TokenRecord {
    /// Builds a record whose expiry is `now_ms + expires_in` seconds.
    pub fn issued_at(
        now_ms: i64,
        access_token: String,
        refresh_token: String,
        expires_in: u64,
    ) -> Self {
        let lifetime_ms = i64::try_from(expires_in.saturating_mul(1000)).unwrap_or(i64::MAX);
        TokenRecord {
            access_token,
            refresh_token,
            expires_at: now_ms.saturating_add(lifetime_ms),
        }
    }

    /// True when fewer than `window` (inclusive) remain before expiry.
    pub fn needs_refresh(&self, now_ms: i64, window: Duration) -> bool {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        self.expires_at.saturating_sub(now_ms) <= window_ms
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.expires_at)
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint success body, validated at the network boundary.
///
/// `access_token` and `expires_in` are mandatory; serde rejects the body when
/// either is absent or ill-typed.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

/// Token endpoint error body (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
pub(crate) struct OAuthErrorBody {
    pub error: String,
}

/// Redacted view of the stored login, for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStatus {
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_due: bool,
    pub has_refresh_token: bool,
}

#[derive(Tabled)]
pub struct TokenStatusRow {
    pub field: String,
    pub value: String,
}
