use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ApiError;

/// Result of exchanging a refresh credential at a provider's token endpoint.
///
/// Providers answer in two shapes — a relative lifetime (`expires_in`
/// seconds) or an absolute instant — and both normalize to `expires_at`
/// before anything downstream sees them.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Absolute expiry of the access token.
    pub expires_at: DateTime<Utc>,
    /// Present when the provider returned a refresh credential. Some
    /// providers rotate the credential on every use; the token cache
    /// compares this against the supplied credential and reports rotation
    /// to the caller.
    pub new_refresh_token: Option<String>,
}

/// Trait that every token provider must implement.
///
/// Each implementation handles one provider's quirks (auth style, response
/// shape, rotation behavior) behind a single normalized refresh call.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Unique provider identifier (e.g., "fitbit", "strava").
    fn id(&self) -> &'static str;

    /// Human-readable display name.
    fn display_name(&self) -> &str;

    /// Exchange a refresh credential for a fresh access token.
    ///
    /// A 4xx response means the credential was rejected
    /// (`ApiError::CredentialRejected`); anything else that goes wrong is
    /// `ApiError::ProviderUnavailable`.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError>;
}
