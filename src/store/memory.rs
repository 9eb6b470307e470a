//! In-memory `SubscriptionStore` for scheduler and dispatcher tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{validate_slots, PushSubscription, Slot, SubscriptionStore};
use crate::error::ApiError;

pub struct MemoryStore {
    subs: Mutex<BTreeMap<String, PushSubscription>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            subs: Mutex::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn upsert(&self, sub: &PushSubscription) -> Result<(), ApiError> {
        sub.validate()?;
        self.subs
            .lock()
            .await
            .insert(sub.endpoint.clone(), sub.clone());
        Ok(())
    }

    async fn update_slots(&self, endpoint: &str, slots: &[Slot]) -> Result<(), ApiError> {
        validate_slots(slots)?;
        let mut subs = self.subs.lock().await;
        match subs.get_mut(endpoint) {
            Some(sub) => {
                sub.slots = slots.to_vec();
                Ok(())
            }
            None => Err(ApiError::NotFound("subscription".into())),
        }
    }

    async fn remove(&self, endpoint: &str) -> Result<(), ApiError> {
        self.subs.lock().await.remove(endpoint);
        Ok(())
    }

    async fn remove_all(&self) -> Result<u64, ApiError> {
        let mut subs = self.subs.lock().await;
        let n = subs.len() as u64;
        subs.clear();
        Ok(n)
    }

    async fn list_all(&self) -> Result<Vec<PushSubscription>, ApiError> {
        Ok(self.subs.lock().await.values().cloned().collect())
    }
}
