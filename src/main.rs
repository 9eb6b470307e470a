use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use calmbreak_push::api;
use calmbreak_push::config::Config;
use calmbreak_push::crypto::CryptoEngine;
use calmbreak_push::providers::{self, ProviderRegistry};
use calmbreak_push::push::{PushDispatcher, WebPushTransport};
use calmbreak_push::store::Store;
use calmbreak_push::tokens::TokenCache;
use calmbreak_push::{AppState, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calmbreak_push=info".into()),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    info!("calmbreak-push v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);

    // Initialize components
    let crypto = CryptoEngine::new(&config.master_key)?;
    let store = Store::new(&config.database_url).await?;
    store.migrate().await?;
    info!("Database connected and migrated");

    let mut registry = ProviderRegistry::new();
    providers::register_defaults(&mut registry, &config);
    info!("Registered {} token providers", registry.count());

    let dispatcher = match (&config.vapid_private_key, &config.vapid_subject) {
        (Some(key), Some(subject)) => {
            let transport = WebPushTransport::new(key.clone(), subject.clone());
            Some(PushDispatcher::new(Arc::new(transport)))
        }
        _ => {
            tracing::warn!(
                "VAPID_PRIVATE_KEY / VAPID_SUBJECT not set; push delivery is disabled \
                 and tick requests will report not_configured"
            );
            None
        }
    };

    // Build shared state
    let state: SharedState = Arc::new(AppState {
        config: config.clone(),
        store,
        crypto,
        registry,
        tokens: TokenCache::new(),
        dispatcher,
    });

    // Build router
    let app = api::router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready");
    axum::serve(listener, app).await?;

    Ok(())
}
