//! Per-tick scheduling: project "now" into each subscriber's time zone and
//! dispatch to everyone whose slot names the current minute.
//!
//! The external trigger is assumed to fire once per calendar minute. The
//! match is exact, with no tolerance window and no last-fired bookkeeping:
//! a delayed or skipped trigger silently misses that minute's slots, and a
//! double fire for the same minute would send twice. That is the contract,
//! not an accident.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use super::dispatcher::{DispatchOutcome, PushDispatcher};
use super::pick_reminder;
use crate::error::ApiError;
use crate::store::{PushSubscription, SubscriptionStore};

/// Aggregate result of one tick. Always returned, even when some dispatches
/// fail.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct TickOutcome {
    pub checked: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pruned: usize,
}

/// Whether any of the subscription's slots names the current wall-clock
/// minute in its own time zone. An unknown zone name projects through UTC
/// rather than failing the tick.
pub fn slot_due(sub: &PushSubscription, now: DateTime<Utc>) -> bool {
    let tz: Tz = match sub.timezone.parse() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(
                endpoint = %sub.endpoint,
                timezone = %sub.timezone,
                "unknown time zone, falling back to UTC"
            );
            Tz::UTC
        }
    };

    let local = now.with_timezone(&tz);
    sub.slots
        .iter()
        .any(|s| u32::from(s.hour) == local.hour() && u32::from(s.minute) == local.minute())
}

/// Run one scheduler tick at the given instant.
pub async fn run_tick(
    store: &dyn SubscriptionStore,
    dispatcher: &PushDispatcher,
    now: DateTime<Utc>,
) -> Result<TickOutcome, ApiError> {
    let subs = store.list_all().await?;
    let mut outcome = TickOutcome {
        checked: subs.len(),
        ..Default::default()
    };

    for sub in &subs {
        if !slot_due(sub, now) {
            outcome.skipped += 1;
            continue;
        }

        let message = pick_reminder();
        match dispatcher.dispatch(store, sub, &message).await {
            DispatchOutcome::Sent => outcome.sent += 1,
            DispatchOutcome::TransientFailure => outcome.failed += 1,
            DispatchOutcome::Pruned => outcome.pruned += 1,
        }
    }

    info!(
        checked = outcome.checked,
        sent = outcome.sent,
        failed = outcome.failed,
        skipped = outcome.skipped,
        pruned = outcome.pruned,
        "tick complete"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::push::testutil::MockTransport;
    use crate::store::memory::MemoryStore;
    use crate::store::{Slot, SubscriptionKeys};
    use chrono::TimeZone;

    fn sub(endpoint: &str, timezone: &str, slots: Vec<Slot>) -> PushSubscription {
        PushSubscription {
            endpoint: endpoint.into(),
            keys: SubscriptionKeys {
                p256dh: "p".into(),
                auth: "a".into(),
            },
            timezone: timezone.into(),
            slots,
        }
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn matches_exact_local_minute() {
        // 16:00 UTC on a PDT day is 09:00 in Los Angeles.
        let s = sub(
            "ep",
            "America/Los_Angeles",
            vec![Slot { hour: 9, minute: 0 }],
        );
        assert!(slot_due(&s, utc(2025, 6, 2, 16, 0)));
        assert!(!slot_due(&s, utc(2025, 6, 2, 16, 1)));
        assert!(!slot_due(&s, utc(2025, 6, 2, 9, 0)));
    }

    #[test]
    fn dst_fall_back_minute_matches_both_utc_instants() {
        // On 2024-11-03 the Los Angeles clock shows 01:30 twice: once in PDT
        // (08:30Z) and once in PST (09:30Z). The projection rule treats both
        // the same; no special-casing.
        let s = sub(
            "ep",
            "America/Los_Angeles",
            vec![Slot { hour: 1, minute: 30 }],
        );
        assert!(slot_due(&s, utc(2024, 11, 3, 8, 30)));
        assert!(slot_due(&s, utc(2024, 11, 3, 9, 30)));
        assert!(!slot_due(&s, utc(2024, 11, 3, 10, 30)));
    }

    #[test]
    fn unknown_zone_falls_back_to_utc() {
        let s = sub("ep", "Mars/Olympus_Mons", vec![Slot { hour: 12, minute: 15 }]);
        assert!(slot_due(&s, utc(2025, 1, 1, 12, 15)));
        assert!(!slot_due(&s, utc(2025, 1, 1, 13, 15)));
    }

    #[tokio::test]
    async fn tick_sends_on_slot_and_skips_one_minute_later() {
        let store = MemoryStore::new();
        store
            .upsert(&sub(
                "https://push.example/la",
                "America/Los_Angeles",
                vec![Slot { hour: 9, minute: 0 }],
            ))
            .await
            .unwrap();

        let transport = Arc::new(MockTransport::ok());
        let dispatcher = PushDispatcher::new(transport.clone());

        // 09:00 Pacific
        let outcome = run_tick(&store, &dispatcher, utc(2025, 6, 2, 16, 0))
            .await
            .unwrap();
        assert_eq!(outcome.checked, 1);
        assert_eq!(outcome.sent, 1);
        assert_eq!(outcome.skipped, 0);

        // 09:01 Pacific: nothing due, nothing sent.
        let outcome = run_tick(&store, &dispatcher, utc(2025, 6, 2, 16, 1))
            .await
            .unwrap();
        assert_eq!(outcome.sent, 0);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(transport.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn failures_are_isolated_per_subscription() {
        let store = MemoryStore::new();
        let slot = vec![Slot { hour: 12, minute: 0 }];
        store
            .upsert(&sub("https://push.example/ok", "UTC", slot.clone()))
            .await
            .unwrap();
        store
            .upsert(&sub("https://push.example/dead", "UTC", slot.clone()))
            .await
            .unwrap();
        store
            .upsert(&sub("https://push.example/flaky", "UTC", slot))
            .await
            .unwrap();

        let mut transport = MockTransport::ok();
        transport.gone.insert("https://push.example/dead".into());
        transport.flaky.insert("https://push.example/flaky".into());
        let dispatcher = PushDispatcher::new(Arc::new(transport));

        let outcome = run_tick(&store, &dispatcher, utc(2025, 1, 15, 12, 0))
            .await
            .unwrap();
        assert_eq!(outcome.checked, 3);
        assert_eq!(outcome.sent, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.pruned, 1);

        // The pruned endpoint is gone; a later tick no longer attempts it.
        let remaining = store.list_all().await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining
            .iter()
            .all(|s| s.endpoint != "https://push.example/dead"));
    }
}
