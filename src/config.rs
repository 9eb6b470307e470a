use anyhow::{Context, Result};

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,

    // ── Database (PostgreSQL) ───────────────────────────────────────────
    pub database_url: String,

    // ── Crypto ──────────────────────────────────────────────────────────
    /// 32-byte base64-encoded master key for AES-256-GCM encryption of
    /// refresh credentials at rest.
    pub master_key: String,

    // ── Scheduler trigger ───────────────────────────────────────────────
    /// Shared secret for the periodic tick endpoint. When unset the
    /// endpoint is open (explicit permissive default).
    pub cron_secret: Option<String>,

    // ── Web push (VAPID) ────────────────────────────────────────────────
    pub vapid_public_key: Option<String>,
    pub vapid_private_key: Option<String>,
    /// Contact claim for VAPID, e.g. "mailto:ops@calmbreak.app".
    pub vapid_subject: Option<String>,

    // ── Provider credentials ────────────────────────────────────────────
    pub fitbit_client_id: Option<String>,
    pub fitbit_client_secret: Option<String>,
    pub strava_client_id: Option<String>,
    pub strava_client_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8430".into())
                .parse()
                .context("Invalid PORT")?,

            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL is required (PostgreSQL connection string)")?,
            master_key: std::env::var("MASTER_KEY")
                .context("MASTER_KEY is required (32 bytes, base64)")?,

            cron_secret: std::env::var("CRON_SECRET").ok(),

            vapid_public_key: std::env::var("VAPID_PUBLIC_KEY").ok(),
            vapid_private_key: std::env::var("VAPID_PRIVATE_KEY").ok(),
            vapid_subject: std::env::var("VAPID_SUBJECT").ok(),

            fitbit_client_id: std::env::var("FITBIT_CLIENT_ID").ok(),
            fitbit_client_secret: std::env::var("FITBIT_CLIENT_SECRET").ok(),
            strava_client_id: std::env::var("STRAVA_CLIENT_ID").ok(),
            strava_client_secret: std::env::var("STRAVA_CLIENT_SECRET").ok(),
        })
    }
}
