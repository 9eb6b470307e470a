use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::traits::{RefreshedToken, TokenProvider};
use crate::error::ApiError;

/// Strava OAuth 2.0 token provider.
///
/// Quirks:
/// - Client credentials go in the form body, not a Basic auth header.
/// - Expiry comes back as an absolute epoch `expires_at`.
/// - A refresh credential is always echoed back; it only changes
///   occasionally, so rotation must be detected by comparison.
pub struct StravaProvider {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

// Raw token response from Strava's token endpoint
#[derive(Debug, Deserialize)]
struct StravaTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
}

impl StravaProvider {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            http: super::http_client(),
        }
    }
}

#[async_trait]
impl TokenProvider for StravaProvider {
    fn id(&self) -> &'static str {
        "strava"
    }

    fn display_name(&self) -> &str {
        "Strava"
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        let resp = self
            .http
            .post("https://www.strava.com/oauth/token")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| ApiError::ProviderUnavailable(format!("Strava refresh request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status.is_client_error() {
                return Err(ApiError::CredentialRejected(format!(
                    "Strava refused refresh ({status}): {body}"
                )));
            }
            return Err(ApiError::ProviderUnavailable(format!(
                "Strava refresh failed ({status}): {body}"
            )));
        }

        let token_resp: StravaTokenResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::ProviderUnavailable(format!("Failed to parse Strava response: {e}")))?;

        let expires_at = DateTime::<Utc>::from_timestamp(token_resp.expires_at, 0).ok_or_else(|| {
            ApiError::ProviderUnavailable(format!(
                "Strava returned unusable expires_at {}",
                token_resp.expires_at
            ))
        })?;

        Ok(RefreshedToken {
            access_token: token_resp.access_token,
            expires_at,
            new_refresh_token: Some(token_resp.refresh_token),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_absolute_expiry_response() {
        let raw = r#"{
            "token_type": "Bearer",
            "access_token": "at-9",
            "expires_at": 1704067200,
            "expires_in": 21600,
            "refresh_token": "rt-9"
        }"#;
        let resp: StravaTokenResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.expires_at, 1704067200);

        let normalized = DateTime::<Utc>::from_timestamp(resp.expires_at, 0).unwrap();
        assert_eq!(normalized.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }
}
