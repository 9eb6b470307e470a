use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use web_push::{
    ContentEncoding, HyperWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessageBuilder, URL_SAFE_NO_PAD,
};

use super::dispatcher::{PushSendError, PushTransport};
use super::NotificationMessage;
use crate::store::PushSubscription;

/// Outbound sends are bounded like provider refreshes; a hung push service
/// is a transient failure for that subscriber, not a stalled tick.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Web-push transport: VAPID-signed, aes128gcm-encrypted delivery straight
/// to the subscription's endpoint.
pub struct WebPushTransport {
    client: HyperWebPushClient,
    vapid_private_key: String,
    vapid_subject: String,
}

impl WebPushTransport {
    /// `vapid_private_key` is the URL-safe base64 form of the VAPID signing
    /// key; `vapid_subject` is the contact claim (e.g. a mailto: URL).
    pub fn new(vapid_private_key: String, vapid_subject: String) -> Self {
        Self {
            client: HyperWebPushClient::new(),
            vapid_private_key,
            vapid_subject,
        }
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn send(
        &self,
        sub: &PushSubscription,
        message: &NotificationMessage,
    ) -> Result<(), PushSendError> {
        let info = SubscriptionInfo::new(
            sub.endpoint.clone(),
            sub.keys.p256dh.clone(),
            sub.keys.auth.clone(),
        );

        let mut sig_builder =
            VapidSignatureBuilder::from_base64(&self.vapid_private_key, URL_SAFE_NO_PAD, &info)
                .map_err(|e| PushSendError::Transient(format!("invalid VAPID key: {e}")))?;
        sig_builder.add_claim("sub", self.vapid_subject.as_str());
        let signature = sig_builder
            .build()
            .map_err(|e| PushSendError::Transient(format!("VAPID signing failed: {e}")))?;

        let payload = serde_json::to_vec(message)
            .map_err(|e| PushSendError::Transient(format!("payload serialization failed: {e}")))?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_vapid_signature(signature);
        builder.set_payload(ContentEncoding::Aes128Gcm, &payload);

        let push_message = builder
            .build()
            .map_err(|e| PushSendError::Transient(format!("message build failed: {e}")))?;

        match timeout(SEND_TIMEOUT, self.client.send(push_message)).await {
            Ok(Ok(())) => Ok(()),
            // 410 Gone / 404 Not Found at the push service: the browser
            // dropped the subscription, it will never work again.
            Ok(Err(WebPushError::EndpointNotValid)) | Ok(Err(WebPushError::EndpointNotFound)) => {
                Err(PushSendError::EndpointGone)
            }
            Ok(Err(e)) => Err(PushSendError::Transient(e.to_string())),
            Err(_) => Err(PushSendError::Transient(format!(
                "push send timed out after {}s",
                SEND_TIMEOUT.as_secs()
            ))),
        }
    }
}
