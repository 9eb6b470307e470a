use async_trait::async_trait;
use base64::Engine as _;
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::traits::{RefreshedToken, TokenProvider};
use crate::error::ApiError;

/// Fitbit OAuth 2.0 token provider.
///
/// Quirks:
/// - Token endpoint wants HTTP Basic auth with base64(client_id:client_secret).
/// - Expiry comes back as a relative `expires_in` (seconds).
/// - The refresh credential rotates on every use; the previous value is
///   invalidated server-side, so the rotated value must always be persisted.
pub struct FitbitProvider {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

// Raw token response from Fitbit's token endpoint
#[derive(Debug, Deserialize)]
struct FitbitTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
}

impl FitbitProvider {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            http: super::http_client(),
        }
    }

    fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw.as_bytes())
        )
    }
}

#[async_trait]
impl TokenProvider for FitbitProvider {
    fn id(&self) -> &'static str {
        "fitbit"
    }

    fn display_name(&self) -> &str {
        "Fitbit"
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        let resp = self
            .http
            .post("https://api.fitbit.com/oauth2/token")
            .header("Authorization", self.basic_auth())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| ApiError::ProviderUnavailable(format!("Fitbit refresh request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status.is_client_error() {
                return Err(ApiError::CredentialRejected(format!(
                    "Fitbit refused refresh ({status}): {body}"
                )));
            }
            return Err(ApiError::ProviderUnavailable(format!(
                "Fitbit refresh failed ({status}): {body}"
            )));
        }

        let token_resp: FitbitTokenResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::ProviderUnavailable(format!("Failed to parse Fitbit response: {e}")))?;

        Ok(RefreshedToken {
            access_token: token_resp.access_token,
            expires_at: Utc::now() + Duration::seconds(token_resp.expires_in as i64),
            new_refresh_token: Some(token_resp.refresh_token),
        })
    }
}
