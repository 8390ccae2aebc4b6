//! Credential types

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Short-lived bearer credential sent on every request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

/// Longer-lived credential exchanged for a new access token
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(String);

impl AccessToken {
    /// Wrap a raw access token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value for this token
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Unix timestamp from the JWT `exp` claim, when the token is a JWT.
    ///
    /// The signature is not checked; this is for diagnostics only.
    #[must_use]
    pub fn expires_at(&self) -> Option<u64> {
        let payload = self.0.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
        claims.get("exp")?.as_u64()
    }

    /// Time left before `exp`, or `None` if unknown or already past
    #[must_use]
    pub fn remaining_validity(&self) -> Option<Duration> {
        let expires_at = self.expires_at()?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        (expires_at > now).then(|| Duration::from_secs(expires_at - now))
    }
}

impl RefreshToken {
    /// Wrap a raw refresh token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Token values never show up in logs.
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

impl std::fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RefreshToken(***)")
    }
}

impl From<&str> for AccessToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccessToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RefreshToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RefreshToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The credential pair held for an authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Current access token
    pub access: AccessToken,
    /// Current refresh token, if the server issued one
    pub refresh: Option<RefreshToken>,
}

impl TokenPair {
    /// Create a new pair
    pub fn new(access: impl Into<AccessToken>, refresh: Option<RefreshToken>) -> Self {
        Self {
            access: access.into(),
            refresh,
        }
    }
}

/// Body sent to the refresh endpoint
#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Token-bearing response from the refresh and OTP verification endpoints.
///
/// `access` is optional on purpose: a 200 without it is a failed refresh.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
}
