pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod providers;
pub mod push;
pub mod store;
pub mod tokens;

pub use config::Config;
pub use error::ApiError;

use std::sync::Arc;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub store: store::Store,
    pub crypto: crypto::CryptoEngine,
    pub registry: providers::ProviderRegistry,
    pub tokens: tokens::TokenCache,
    /// Absent when VAPID keys are not configured; tick requests then fail
    /// closed with `not_configured`.
    pub dispatcher: Option<push::PushDispatcher>,
}

pub type SharedState = Arc<AppState>;
