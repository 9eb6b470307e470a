use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::NotificationMessage;
use crate::store::{PushSubscription, SubscriptionStore};

/// Transport-level failure classes.
#[derive(Debug)]
pub enum PushSendError {
    /// The push service reported the endpoint permanently gone (404/410
    /// class). The target will never succeed again.
    EndpointGone,
    /// Anything else: timeout, 5xx, payload or crypto problems. May succeed
    /// on a later, independent attempt.
    Transient(String),
}

/// Seam between dispatch policy and the wire. The production implementation
/// is [`super::WebPushTransport`].
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(
        &self,
        sub: &PushSubscription,
        message: &NotificationMessage,
    ) -> Result<(), PushSendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    TransientFailure,
    /// The endpoint was gone and its subscription has been removed.
    Pruned,
}

/// Sends one message per matched subscription and interprets transport
/// failures. Never returns an error: one subscriber's failure must not
/// abort the tick.
pub struct PushDispatcher {
    transport: Arc<dyn PushTransport>,
}

impl PushDispatcher {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self { transport }
    }

    pub async fn dispatch(
        &self,
        store: &dyn SubscriptionStore,
        sub: &PushSubscription,
        message: &NotificationMessage,
    ) -> DispatchOutcome {
        match self.transport.send(sub, message).await {
            Ok(()) => DispatchOutcome::Sent,
            Err(PushSendError::EndpointGone) => {
                info!(endpoint = %sub.endpoint, "push endpoint gone, pruning subscription");
                if let Err(e) = store.remove(&sub.endpoint).await {
                    warn!(endpoint = %sub.endpoint, "failed to prune dead subscription: {e}");
                }
                DispatchOutcome::Pruned
            }
            Err(PushSendError::Transient(reason)) => {
                warn!(endpoint = %sub.endpoint, "push delivery failed: {reason}");
                DispatchOutcome::TransientFailure
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::testutil::MockTransport;
    use crate::push::pick_reminder;
    use crate::store::memory::MemoryStore;
    use crate::store::{PushSubscription, SubscriptionKeys};

    fn sub(endpoint: &str) -> PushSubscription {
        PushSubscription {
            endpoint: endpoint.into(),
            keys: SubscriptionKeys {
                p256dh: "p".into(),
                auth: "a".into(),
            },
            timezone: "UTC".into(),
            slots: vec![],
        }
    }

    #[tokio::test]
    async fn gone_endpoint_is_pruned_from_registry() {
        let store = MemoryStore::new();
        let s = sub("https://push.example/dead");
        store.upsert(&s).await.unwrap();

        let mut transport = MockTransport::ok();
        transport.gone.insert(s.endpoint.clone());
        let dispatcher = PushDispatcher::new(Arc::new(transport));

        let outcome = dispatcher.dispatch(&store, &s, &pick_reminder()).await;
        assert_eq!(outcome, DispatchOutcome::Pruned);
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transient_failure_keeps_subscription() {
        let store = MemoryStore::new();
        let s = sub("https://push.example/flaky");
        store.upsert(&s).await.unwrap();

        let mut transport = MockTransport::ok();
        transport.flaky.insert(s.endpoint.clone());
        let dispatcher = PushDispatcher::new(Arc::new(transport));

        let outcome = dispatcher.dispatch(&store, &s, &pick_reminder()).await;
        assert_eq!(outcome, DispatchOutcome::TransientFailure);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn successful_send_reaches_transport() {
        let store = MemoryStore::new();
        let s = sub("https://push.example/ok");

        let transport = Arc::new(MockTransport::ok());
        let dispatcher = PushDispatcher::new(transport.clone());

        let outcome = dispatcher.dispatch(&store, &s, &pick_reminder()).await;
        assert_eq!(outcome, DispatchOutcome::Sent);
        assert_eq!(*transport.sent.lock().await, vec![s.endpoint]);
    }
}
