//! Durable state: OAuth connection rows and the push-subscription registry.

pub mod db;
#[cfg(test)]
pub mod memory;

pub use db::Store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A local wall-clock delivery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub hour: u8,
    pub minute: u8,
}

impl Slot {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.hour > 23 {
            return Err(ApiError::Validation(format!("invalid hour {}", self.hour)));
        }
        if self.minute > 59 {
            return Err(ApiError::Validation(format!(
                "invalid minute {}",
                self.minute
            )));
        }
        Ok(())
    }
}

pub fn validate_slots(slots: &[Slot]) -> Result<(), ApiError> {
    for slot in slots {
        slot.validate()?;
    }
    Ok(())
}

/// Encryption keys supplied by the push service at subscribe time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// One push subscription per distinct transport endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

fn default_timezone() -> String {
    "UTC".into()
}

impl PushSubscription {
    /// Reject malformed records before they reach storage.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.endpoint.is_empty() {
            return Err(ApiError::Validation("endpoint is required".into()));
        }
        if self.keys.p256dh.is_empty() || self.keys.auth.is_empty() {
            return Err(ApiError::Validation(
                "subscription keys p256dh and auth are required".into(),
            ));
        }
        validate_slots(&self.slots)
    }
}

/// Registry of push subscriptions, keyed by endpoint. All operations are
/// idempotent with respect to endpoint identity; invalid input is rejected
/// without mutating storage.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or replace the record for this endpoint.
    async fn upsert(&self, sub: &PushSubscription) -> Result<(), ApiError>;

    /// Replace only the delivery slots for an existing endpoint.
    async fn update_slots(&self, endpoint: &str, slots: &[Slot]) -> Result<(), ApiError>;

    /// Remove one endpoint. Removing an absent endpoint is not an error.
    async fn remove(&self, endpoint: &str) -> Result<(), ApiError>;

    /// Administrative bulk clear. Returns the number of removed records.
    async fn remove_all(&self) -> Result<u64, ApiError>;

    async fn list_all(&self) -> Result<Vec<PushSubscription>, ApiError>;
}
