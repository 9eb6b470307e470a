//! PostgreSQL-backed store for OAuth connections and push subscriptions.
//!
//! Tables:
//! - `oauth_connections`: one encrypted refresh credential per (user, provider)
//! - `push_subscriptions`: one record per transport endpoint, slots as JSONB

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use super::{PushSubscription, Slot, SubscriptionKeys, SubscriptionStore};
use crate::crypto::CryptoEngine;
use crate::error::ApiError;

/// Store backed by PostgreSQL.
pub struct Store {
    pub pool: PgPool,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self, ApiError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(db_url)
            .await
            .map_err(|e| ApiError::Database(format!("Failed to connect to PostgreSQL: {e}")))?;

        Ok(Self { pool })
    }

    /// Run schema migrations.
    pub async fn migrate(&self) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS oauth_connections (
                id              UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id         TEXT NOT NULL,
                provider        TEXT NOT NULL,
                refresh_token   TEXT NOT NULL,
                account_name    TEXT DEFAULT '',
                created_at      TIMESTAMPTZ DEFAULT NOW(),
                updated_at      TIMESTAMPTZ DEFAULT NOW(),
                UNIQUE(user_id, provider)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS push_subscriptions (
                endpoint    TEXT PRIMARY KEY,
                p256dh      TEXT NOT NULL,
                auth        TEXT NOT NULL,
                timezone    TEXT NOT NULL DEFAULT 'UTC',
                slots       JSONB NOT NULL DEFAULT '[]',
                created_at  TIMESTAMPTZ DEFAULT NOW(),
                updated_at  TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_oauth_connections_lookup ON oauth_connections(user_id, provider)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // OAuth connections
    // =========================================================================

    /// Insert or replace the refresh credential for (user, provider).
    pub async fn upsert_connection(
        &self,
        crypto: &CryptoEngine,
        user_id: &str,
        provider: &str,
        refresh_token: &str,
        account_name: &str,
    ) -> Result<(), ApiError> {
        let enc_refresh = crypto.encrypt(refresh_token)?;

        sqlx::query(
            r#"
            INSERT INTO oauth_connections (user_id, provider, refresh_token, account_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, provider)
            DO UPDATE SET
                refresh_token = EXCLUDED.refresh_token,
                account_name = EXCLUDED.account_name,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(&enc_refresh)
        .bind(account_name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the decrypted refresh credential for (user, provider).
    pub async fn get_refresh_token(
        &self,
        crypto: &CryptoEngine,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<String>, ApiError> {
        let row = sqlx::query(
            "SELECT refresh_token FROM oauth_connections WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let enc: String = row.get(0);
        Ok(Some(crypto.decrypt(&enc)?))
    }

    /// Replace the refresh credential in place after a provider rotation.
    pub async fn replace_refresh_token(
        &self,
        crypto: &CryptoEngine,
        user_id: &str,
        provider: &str,
        new_refresh_token: &str,
    ) -> Result<(), ApiError> {
        let enc = crypto.encrypt(new_refresh_token)?;

        let affected = sqlx::query(
            r#"
            UPDATE oauth_connections
            SET refresh_token = $1, updated_at = NOW()
            WHERE user_id = $2 AND provider = $3
            "#,
        )
        .bind(&enc)
        .bind(user_id)
        .bind(provider)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(ApiError::NotFound("connection".into()));
        }

        Ok(())
    }

    /// Connection metadata for status queries (no credential).
    pub async fn connection_info(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<ConnectionInfo>, ApiError> {
        let row = sqlx::query(
            r#"
            SELECT account_name, created_at, updated_at
            FROM oauth_connections
            WHERE user_id = $1 AND provider = $2
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ConnectionInfo {
            account_name: r.get(0),
            created_at: r.get(1),
            updated_at: r.get(2),
        }))
    }

    /// Explicit disconnect.
    pub async fn delete_connection(&self, user_id: &str, provider: &str) -> Result<(), ApiError> {
        let affected =
            sqlx::query("DELETE FROM oauth_connections WHERE user_id = $1 AND provider = $2")
                .bind(user_id)
                .bind(provider)
                .execute(&self.pool)
                .await?
                .rows_affected();

        if affected == 0 {
            return Err(ApiError::NotFound("connection".into()));
        }

        Ok(())
    }
}

// =========================================================================
// Push subscription registry
// =========================================================================

#[async_trait]
impl SubscriptionStore for Store {
    async fn upsert(&self, sub: &PushSubscription) -> Result<(), ApiError> {
        sub.validate()?;

        sqlx::query(
            r#"
            INSERT INTO push_subscriptions (endpoint, p256dh, auth, timezone, slots)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (endpoint)
            DO UPDATE SET
                p256dh = EXCLUDED.p256dh,
                auth = EXCLUDED.auth,
                timezone = EXCLUDED.timezone,
                slots = EXCLUDED.slots,
                updated_at = NOW()
            "#,
        )
        .bind(&sub.endpoint)
        .bind(&sub.keys.p256dh)
        .bind(&sub.keys.auth)
        .bind(&sub.timezone)
        .bind(Json(&sub.slots))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_slots(&self, endpoint: &str, slots: &[Slot]) -> Result<(), ApiError> {
        super::validate_slots(slots)?;

        let affected = sqlx::query(
            "UPDATE push_subscriptions SET slots = $1, updated_at = NOW() WHERE endpoint = $2",
        )
        .bind(Json(slots))
        .bind(endpoint)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(ApiError::NotFound("subscription".into()));
        }

        Ok(())
    }

    async fn remove(&self, endpoint: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = $1")
            .bind(endpoint)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn remove_all(&self) -> Result<u64, ApiError> {
        let affected = sqlx::query("DELETE FROM push_subscriptions")
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected)
    }

    async fn list_all(&self) -> Result<Vec<PushSubscription>, ApiError> {
        let rows = sqlx::query("SELECT endpoint, p256dh, auth, timezone, slots FROM push_subscriptions")
            .fetch_all(&self.pool)
            .await?;

        let subs = rows
            .iter()
            .map(|row| {
                let slots: Json<Vec<Slot>> = row.get(4);
                PushSubscription {
                    endpoint: row.get(0),
                    keys: SubscriptionKeys {
                        p256dh: row.get(1),
                        auth: row.get(2),
                    },
                    timezone: row.get(3),
                    slots: slots.0,
                }
            })
            .collect();

        Ok(subs)
    }
}

// ── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ConnectionInfo {
    pub account_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
