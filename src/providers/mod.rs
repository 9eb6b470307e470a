mod fitbit;
mod registry;
mod strava;
mod traits;

pub use fitbit::FitbitProvider;
pub use registry::ProviderRegistry;
pub use strava::StravaProvider;
pub use traits::{RefreshedToken, TokenProvider};

use std::time::Duration;

use crate::config::Config;

/// Provider ids this service knows how to talk to. The registry only holds
/// the subset whose client credentials are configured; this list tells
/// "configure me" apart from "no such provider".
pub const KNOWN_PROVIDER_IDS: &[&str] = &["fitbit", "strava"];

/// Outbound token-endpoint calls are bounded; a hung provider is a refresh
/// failure, not a stuck request path.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to construct HTTP client")
}

/// Register all providers that have client credentials configured.
pub fn register_defaults(registry: &mut ProviderRegistry, config: &Config) {
    if let (Some(id), Some(secret)) = (&config.fitbit_client_id, &config.fitbit_client_secret) {
        registry.register(Box::new(FitbitProvider::new(id.clone(), secret.clone())));
    }

    if let (Some(id), Some(secret)) = (&config.strava_client_id, &config.strava_client_secret) {
        registry.register(Box::new(StravaProvider::new(id.clone(), secret.clone())));
    }
}
