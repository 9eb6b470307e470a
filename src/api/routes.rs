//! Route handlers for the calmbreak-push service.
//!
//! All handlers receive `SharedState` via Axum state extraction.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::providers::{ProviderRegistry, TokenProvider, KNOWN_PROVIDER_IDS};
use crate::push;
use crate::store::{PushSubscription, Slot, SubscriptionStore};
use crate::SharedState;

// =============================================================================
// V1 Router
// =============================================================================

pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/status", get(status))
        // ── Push subscriptions ───────────────────────────────────────────
        .route("/push/public-key", get(push_public_key))
        .route("/push/subscribe", post(push_subscribe))
        .route("/push/subscription", patch(push_update_slots))
        .route("/push/unsubscribe", post(push_unsubscribe))
        // ── Scheduler trigger ────────────────────────────────────────────
        .route("/push/tick", post(push_tick))
        // ── OAuth connections ────────────────────────────────────────────
        .route("/connections/providers", get(connection_providers))
        .route(
            "/connections/{provider}",
            post(connection_upsert).delete(connection_delete),
        )
        .route("/connections/{provider}/status", get(connection_status))
        .route("/connections/{provider}/token", get(connection_token))
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "calmbreak-push",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// Push subscription endpoints
// =============================================================================

/// GET /v1/push/public-key — VAPID public key for client-side subscribe.
async fn push_public_key(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let key = state
        .config
        .vapid_public_key
        .as_deref()
        .ok_or(ApiError::NotConfigured("VAPID_PUBLIC_KEY"))?;

    Ok(Json(json!({ "data": { "public_key": key } })))
}

/// POST /v1/push/subscribe — insert or replace a subscription, keyed by
/// endpoint.
async fn push_subscribe(
    State(state): State<SharedState>,
    Json(sub): Json<PushSubscription>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.upsert(&sub).await?;

    Ok(Json(json!({ "data": { "success": true } })))
}

#[derive(Deserialize)]
struct UpdateSlotsBody {
    endpoint: String,
    slots: Vec<Slot>,
}

/// PATCH /v1/push/subscription — replace only the delivery slots.
async fn push_update_slots(
    State(state): State<SharedState>,
    Json(body): Json<UpdateSlotsBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.update_slots(&body.endpoint, &body.slots).await?;

    Ok(Json(json!({ "data": { "success": true } })))
}

#[derive(Deserialize)]
struct UnsubscribeBody {
    endpoint: Option<String>,
    /// Administrative bulk clear.
    #[serde(default)]
    all: bool,
}

/// POST /v1/push/unsubscribe — remove one endpoint or everything.
async fn push_unsubscribe(
    State(state): State<SharedState>,
    Json(body): Json<UnsubscribeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.all {
        let removed = state.store.remove_all().await?;
        return Ok(Json(json!({ "data": { "removed": removed } })));
    }

    let endpoint = body
        .endpoint
        .ok_or_else(|| ApiError::Validation("endpoint or all=true is required".into()))?;
    state.store.remove(&endpoint).await?;

    Ok(Json(json!({ "data": { "success": true } })))
}

// =============================================================================
// Scheduler trigger
// =============================================================================

/// Check the trigger's bearer secret. No configured secret means the
/// endpoint is open — an explicit permissive default for setups where the
/// periodic caller runs inside the same trust boundary.
fn authorize_tick(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let Some(secret) = secret else {
        return Ok(());
    };

    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match header.strip_prefix("Bearer ") {
        Some(token) if token == secret => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

/// POST /v1/push/tick — invoked once per minute by the external trigger.
async fn push_tick(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize_tick(&headers, state.config.cron_secret.as_deref())?;

    let dispatcher = state
        .dispatcher
        .as_ref()
        .ok_or(ApiError::NotConfigured("VAPID keys"))?;

    let outcome = push::run_tick(&state.store, dispatcher, Utc::now()).await?;

    Ok(Json(json!({ "data": outcome })))
}

// =============================================================================
// OAuth connection endpoints
// =============================================================================

/// Resolve a provider id against the registry. A known provider missing its
/// client credentials is a deployment problem, not a bad request; only ids
/// the service has never heard of are a 404.
fn lookup_provider<'a>(
    registry: &'a ProviderRegistry,
    provider_id: &str,
) -> Result<&'a dyn TokenProvider, ApiError> {
    if let Some(provider) = registry.get(provider_id) {
        return Ok(provider);
    }
    if KNOWN_PROVIDER_IDS.contains(&provider_id) {
        return Err(ApiError::NotConfigured("provider client credentials"));
    }
    Err(ApiError::ProviderNotFound(provider_id.to_string()))
}

/// GET /v1/connections/providers — providers available for connection.
async fn connection_providers(State(state): State<SharedState>) -> impl IntoResponse {
    let providers: Vec<_> = state
        .registry
        .list()
        .into_iter()
        .map(|p| json!({ "id": p.id(), "name": p.display_name() }))
        .collect();

    Json(json!({ "data": providers }))
}

#[derive(Deserialize)]
struct ConnectionUpsertBody {
    user_id: String,
    refresh_token: String,
    #[serde(default)]
    account_name: String,
}

/// POST /v1/connections/:provider — store the refresh credential produced by
/// an authorization handshake completed in the surrounding app.
async fn connection_upsert(
    State(state): State<SharedState>,
    Path(provider_id): Path<String>,
    Json(body): Json<ConnectionUpsertBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    lookup_provider(&state.registry, &provider_id)?;
    if body.user_id.is_empty() || body.refresh_token.is_empty() {
        return Err(ApiError::Validation(
            "user_id and refresh_token are required".into(),
        ));
    }

    state
        .store
        .upsert_connection(
            &state.crypto,
            &body.user_id,
            &provider_id,
            &body.refresh_token,
            &body.account_name,
        )
        .await?;

    Ok(Json(json!({ "data": { "success": true } })))
}

#[derive(Deserialize)]
struct ConnectionQuery {
    user_id: String,
}

/// GET /v1/connections/:provider/status — boolean connected state, never raw
/// provider errors.
async fn connection_status(
    State(state): State<SharedState>,
    Path(provider_id): Path<String>,
    Query(q): Query<ConnectionQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let info = state.store.connection_info(&q.user_id, &provider_id).await?;

    Ok(Json(json!({
        "data": {
            "provider": provider_id,
            "connected": info.is_some(),
            "account_name": info.map(|i| i.account_name),
        }
    })))
}

/// GET /v1/connections/:provider/token — get a valid access token through
/// the cache. Persists rotated refresh credentials before returning.
async fn connection_token(
    State(state): State<SharedState>,
    Path(provider_id): Path<String>,
    Query(q): Query<ConnectionQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let provider = lookup_provider(&state.registry, &provider_id)?;

    let refresh_token = state
        .store
        .get_refresh_token(&state.crypto, &q.user_id, &provider_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("connection".into()))?;

    let grant = state.tokens.get_access_token(provider, &refresh_token).await?;

    let rotated = grant.rotated_refresh_token.is_some();
    if let Some(new_token) = &grant.rotated_refresh_token {
        state
            .store
            .replace_refresh_token(&state.crypto, &q.user_id, &provider_id, new_token)
            .await?;
    }

    Ok(Json(json!({
        "data": {
            "access_token": grant.access_token,
            "rotated": rotated,
        }
    })))
}

/// DELETE /v1/connections/:provider — explicit disconnect. Any cached
/// access token for the credential is dropped alongside the row.
async fn connection_delete(
    State(state): State<SharedState>,
    Path(provider_id): Path<String>,
    Query(q): Query<ConnectionQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(refresh_token) = state
        .store
        .get_refresh_token(&state.crypto, &q.user_id, &provider_id)
        .await?
    {
        state.tokens.invalidate(&provider_id, &refresh_token).await;
    }

    state.store.delete_connection(&q.user_id, &provider_id).await?;

    Ok(Json(json!({ "data": { "success": true } })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn tick_is_open_when_no_secret_configured() {
        assert!(authorize_tick(&HeaderMap::new(), None).is_ok());
    }

    #[test]
    fn tick_accepts_matching_bearer() {
        let headers = headers_with_bearer("s3cret");
        assert!(authorize_tick(&headers, Some("s3cret")).is_ok());
    }

    #[test]
    fn known_provider_without_credentials_is_a_configuration_error() {
        // An empty registry means no client credentials were configured.
        let registry = ProviderRegistry::new();
        assert!(matches!(
            lookup_provider(&registry, "fitbit"),
            Err(ApiError::NotConfigured(_))
        ));
        assert!(matches!(
            lookup_provider(&registry, "magicband"),
            Err(ApiError::ProviderNotFound(_))
        ));
    }

    #[test]
    fn configured_provider_resolves() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(crate::providers::FitbitProvider::new(
            "id".into(),
            "secret".into(),
        )));
        let provider = lookup_provider(&registry, "fitbit").unwrap();
        assert_eq!(provider.id(), "fitbit");
    }

    #[test]
    fn tick_rejects_wrong_or_missing_bearer() {
        let headers = headers_with_bearer("wrong");
        assert!(matches!(
            authorize_tick(&headers, Some("s3cret")),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            authorize_tick(&HeaderMap::new(), Some("s3cret")),
            Err(ApiError::Unauthorized)
        ));
    }
}
