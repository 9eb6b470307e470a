//! Scheduled push delivery: per-tick matching, dispatch, and transport.

pub mod dispatcher;
pub mod scheduler;
pub mod webpush;

pub use dispatcher::{DispatchOutcome, PushDispatcher, PushSendError, PushTransport};
pub use scheduler::{run_tick, TickOutcome};
pub use webpush::WebPushTransport;

use rand::seq::SliceRandom;
use serde::Serialize;

/// Payload delivered to the push endpoint (encrypted in transit by the
/// transport). Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
    /// Dedup/display tag for the notification center.
    pub tag: String,
    /// Target URL opened on interaction.
    pub url: String,
}

const REMINDER_BODIES: &[&str] = &[
    "Time to step away for a moment. Your next break is ready.",
    "Stand up, stretch, and give your eyes a rest.",
    "A short pause now beats a long slump later.",
    "Break time — take a breath and reset.",
    "Your scheduled break is here. Move a little.",
];

/// Pick a reminder body at random. Which text is chosen does not matter for
/// correctness; it only needs to be non-empty.
pub fn pick_reminder() -> NotificationMessage {
    let body = REMINDER_BODIES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(REMINDER_BODIES[0]);

    NotificationMessage {
        title: "Calmbreak".into(),
        body: body.into(),
        tag: "calmbreak-reminder".into(),
        url: "/".into(),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::dispatcher::{PushSendError, PushTransport};
    use super::NotificationMessage;
    use crate::store::PushSubscription;

    /// Transport double: endpoints listed in `gone` answer 410-style, those
    /// in `flaky` answer with a transient error, everything else succeeds.
    pub struct MockTransport {
        pub gone: HashSet<String>,
        pub flaky: HashSet<String>,
        pub sent: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn ok() -> Self {
            Self {
                gone: HashSet::new(),
                flaky: HashSet::new(),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PushTransport for MockTransport {
        async fn send(
            &self,
            sub: &PushSubscription,
            _message: &NotificationMessage,
        ) -> Result<(), PushSendError> {
            if self.gone.contains(&sub.endpoint) {
                return Err(PushSendError::EndpointGone);
            }
            if self.flaky.contains(&sub.endpoint) {
                return Err(PushSendError::Transient("503 from push service".into()));
            }
            self.sent.lock().await.push(sub.endpoint.clone());
            Ok(())
        }
    }
}
