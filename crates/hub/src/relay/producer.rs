//! Producer session: authenticate each frame, derive channel payloads, fan out changes.

use std::fmt::Display;
use std::sync::{Arc, PoisonError};

use futures_util::future::join_all;
use futures_util::{Stream, StreamExt};
use shared::{Channel, ProducerReport};

use super::connection::{Connection, Inbound};
use super::dispatch::DispatchReport;
use super::Hub;
use crate::auth;
use crate::error::HubError;

/// What one authenticated producer frame did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub dispatched: Vec<(Channel, DispatchReport)>,
    pub unchanged: Vec<Channel>,
    pub failed: Vec<Channel>,
}

impl IngestOutcome {
    pub fn dispatched_channels(&self) -> Vec<Channel> {
        self.dispatched.iter().map(|(channel, _)| *channel).collect()
    }
}

impl Hub {
    /// Process one producer text frame.
    ///
    /// `Malformed` frames should be ignored by the caller; `Authentication`
    /// means the connection must be closed. Nothing is mutated before the key
    /// has been checked.
    pub async fn ingest(
        &self,
        producer: &Arc<Connection>,
        text: &str,
    ) -> Result<IngestOutcome, HubError> {
        let frame: serde_json::Value = serde_json::from_str(text)?;
        if !auth::authenticate(&frame, &self.config.api_key) {
            return Err(HubError::Authentication);
        }

        let _ingest = self.ingest_lock.lock().await;
        if producer.is_closed() {
            return Err(HubError::Closed);
        }
        self.claim_producer(producer);

        // Contact counts even when nothing below changes.
        let was_fresh = self.cache.touch();
        let report: ProducerReport = serde_json::from_value(frame)?;
        let now = self.deriver.site_now();

        let mut outcome = IngestOutcome::default();
        let mut changed = Vec::new();
        for channel in Channel::OUTBOUND {
            match self.deriver.derive(channel, &report, now) {
                Ok(serialized) => {
                    if self.cache.update_if_changed(channel, serialized, !was_fresh) {
                        changed.push(channel);
                    } else {
                        outcome.unchanged.push(channel);
                    }
                }
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "derivation failed, keeping cached payload");
                    outcome.failed.push(channel);
                }
            }
        }

        outcome.dispatched = join_all(changed.into_iter().map(|channel| async move {
            let report = self.dispatch(channel).await;
            tracing::debug!(
                channel = %channel,
                attempted = report.attempted,
                delivered = report.delivered,
                failed = report.failed,
                pending = report.pending,
                busy = report.busy,
                "fan-out complete"
            );
            (channel, report)
        }))
        .await;

        Ok(outcome)
    }

    /// Drive a producer connection until it closes or fails authentication.
    pub async fn run_producer<S, E>(&self, conn: Arc<Connection>, mut inbound: S)
    where
        S: Stream<Item = Result<Inbound, E>> + Unpin,
        E: Display,
    {
        conn.mark_open();
        tracing::info!(conn = %conn.id(), "producer connected");
        loop {
            let next = tokio::select! {
                msg = inbound.next() => msg,
                _ = conn.closed() => break,
            };
            let text = match next {
                Some(Ok(Inbound::Text(text))) => text,
                Some(Ok(Inbound::Other)) => continue,
                Some(Ok(Inbound::Close)) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(conn = %conn.id(), error = %e, "producer receive error");
                    break;
                }
            };
            match self.ingest(&conn, &text).await {
                Ok(outcome) => tracing::info!(
                    conn = %conn.id(),
                    dispatched = ?outcome.dispatched_channels(),
                    failed = ?outcome.failed,
                    "producer update processed"
                ),
                Err(HubError::Authentication) => {
                    tracing::warn!(conn = %conn.id(), "producer key missing or incorrect, closing");
                    break;
                }
                Err(HubError::Malformed(e)) => {
                    tracing::debug!(conn = %conn.id(), error = %e, "ignoring malformed producer message");
                }
                Err(HubError::Closed) => break,
                Err(e) => tracing::warn!(conn = %conn.id(), error = %e, "producer update failed"),
            }
        }
        conn.close();
        self.release_producer(&conn);
        tracing::info!(conn = %conn.id(), "producer left");
    }

    /// Make `conn` the active producer, closing any predecessor.
    fn claim_producer(&self, conn: &Arc<Connection>) {
        let mut active = self
            .active_producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|cur| cur.id() == conn.id()) {
            return;
        }
        match active.replace(Arc::clone(conn)) {
            Some(prev) => {
                tracing::info!(conn = %conn.id(), previous = %prev.id(), "producer superseded");
                prev.close();
            }
            None => tracing::info!(conn = %conn.id(), "producer authenticated"),
        }
    }

    fn release_producer(&self, conn: &Connection) {
        let mut active = self
            .active_producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|cur| cur.id() == conn.id()) {
            *active = None;
        }
    }

    /// Connection id of the active producer, if any.
    pub fn active_producer(&self) -> Option<uuid::Uuid> {
        self.active_producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|conn| conn.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::cache::NEUTRAL_PAYLOAD;
    use crate::relay::testing::{
        frame, open, recording_conn, test_hub, FailingRoster, FixedRoster, TEST_KEY,
    };
    use futures_util::stream;
    use serde_json::json;
    use shared::{OpenState, SignPayload};
    use std::convert::Infallible;
    use std::time::Duration;

    fn producer() -> Arc<Connection> {
        let (conn, _rx) = recording_conn(Channel::Poller);
        open(conn)
    }

    fn sign_of(text: &str) -> SignPayload {
        serde_json::from_str(text).unwrap()
    }

    fn report(door: u8, one_on: u8, two_on: u8) -> serde_json::Value {
        json!({
            "printers": {"prusa": "printing"},
            "sign": {"door": door, "switch": {"one_on": one_on, "two_on": two_on}}
        })
    }

    #[tokio::test]
    async fn malformed_frame_is_ignored() {
        let hub = test_hub(FixedRoster::with_mentors(&["Ada"]));
        let res = hub.ingest(&producer(), "{not json").await;
        assert!(matches!(res, Err(HubError::Malformed(_))));
        assert!(hub.cache().last_contact().is_none());
    }

    #[tokio::test]
    async fn auth_rejection_mutates_nothing() {
        let hub = test_hub(FixedRoster::with_mentors(&["Ada"]));
        let conn = producer();
        let upper = TEST_KEY.to_uppercase();
        let prefix = &TEST_KEY[..TEST_KEY.len() - 1];
        let keyless = report(0, 1, 0).to_string();
        let empty = json!({"key": "", "sign": {"door": 0}}).to_string();
        let cased = json!({"key": upper, "sign": {"door": 0}}).to_string();
        let partial = json!({"key": prefix, "sign": {"door": 0}}).to_string();
        for text in [keyless, empty, cased, partial] {
            let res = hub.ingest(&conn, &text).await;
            assert!(matches!(res, Err(HubError::Authentication)), "{text}");
        }
        assert!(hub.cache().last_contact().is_none());
        for channel in Channel::OUTBOUND {
            assert!(hub.cache().get(channel).is_none());
        }
        assert!(hub.active_producer().is_none());
    }

    #[tokio::test]
    async fn wrong_key_closes_producer_session() {
        let hub = test_hub(FixedRoster::with_mentors(&["Ada"]));
        let conn = producer();
        let frames = vec![
            Ok::<_, Infallible>(Inbound::Text("garbage".to_string())),
            Ok(Inbound::Text(json!({"key": "nope"}).to_string())),
            Ok(Inbound::Text(frame(report(0, 1, 0)))),
        ];
        hub.run_producer(Arc::clone(&conn), stream::iter(frames)).await;
        assert!(conn.is_closed());
        // The valid frame after the rejected one was never processed.
        assert!(hub.cache().last_contact().is_none());
    }

    #[tokio::test]
    async fn sign_scenario_open_with_two_mentors() {
        let hub = test_hub(FixedRoster::with_mentors(&["Ada L", "Grace H"]));
        let (early, mut early_rx) = recording_conn(Channel::Sign);
        let _early = hub.join(&early).unwrap();
        assert_eq!(early_rx.recv().await.unwrap(), NEUTRAL_PAYLOAD);

        let outcome = hub
            .ingest(&producer(), &frame(report(0, 1, 0)))
            .await
            .unwrap();
        assert!(outcome.dispatched_channels().contains(&Channel::Sign));

        let pushed = sign_of(&early_rx.recv().await.unwrap());
        assert_eq!(pushed.state, OpenState::Open);
        assert!(pushed.open);
        assert_eq!(pushed.mentors, vec!["Ada L", "Grace H"]);
        assert_eq!(pushed.weather, "+73°F");

        // A late joiner gets the same bytes from its first keepalive tick.
        let (late, mut late_rx) = recording_conn(Channel::Sign);
        let _late = hub.join(&late).unwrap();
        let cached = hub.cache().poller_json_to_str(Channel::Sign);
        assert_eq!(late_rx.recv().await.unwrap(), cached);
        assert_eq!(sign_of(&cached), pushed);
    }

    #[tokio::test]
    async fn shut_door_reads_closed_regardless_of_switch() {
        let hub = test_hub(FixedRoster::with_mentors(&["Ada", "Grace"]));
        let conn = producer();
        for body in [
            json!({"sign": {"door": 1}}),
            json!({"sign": {"door": 1, "switch": {"one_on": 1, "two_on": 0}}}),
            json!({"sign": {"door": 1, "switch": {"one_on": 0, "two_on": 1}}}),
        ] {
            hub.ingest(&conn, &frame(body)).await.unwrap();
            let sign = sign_of(&hub.cache().poller_json_to_str(Channel::Sign));
            assert!(
                matches!(sign.state, OpenState::Closed | OpenState::ForceClose),
                "{:?}",
                sign.state
            );
            assert!(!sign.open);
        }
    }

    #[tokio::test]
    async fn identical_report_dispatches_nothing() {
        let hub = test_hub(FixedRoster::with_mentors(&["Ada"]));
        let conn = producer();
        let first = hub.ingest(&conn, &frame(report(0, 1, 0))).await.unwrap();
        assert_eq!(first.dispatched.len(), Channel::OUTBOUND.len());

        let second = hub.ingest(&conn, &frame(report(0, 1, 0))).await.unwrap();
        assert!(second.dispatched.is_empty());
        assert_eq!(second.unchanged, Channel::OUTBOUND.to_vec());
    }

    #[tokio::test]
    async fn change_touches_only_its_channel() {
        let hub = test_hub(FixedRoster::with_mentors(&["Ada"]));
        let conn = producer();
        hub.ingest(&conn, &frame(report(0, 1, 0))).await.unwrap();
        let sign_before = hub.cache().get(Channel::Sign).unwrap();

        // Subscribers registered without keepalive so every frame seen is a fan-out.
        let (printers_sub, mut printers_rx) = recording_conn(Channel::Printers);
        let (sign_sub, mut sign_rx) = recording_conn(Channel::Sign);
        hub.registry().join(&open(printers_sub));
        hub.registry().join(&open(sign_sub));

        let mut changed = report(0, 1, 0);
        changed["printers"] = json!({"prusa": "idle"});
        let outcome = hub.ingest(&conn, &frame(changed)).await.unwrap();

        assert_eq!(outcome.dispatched_channels(), vec![Channel::Printers]);
        assert_eq!(
            printers_rx.recv().await.unwrap(),
            r#"{"printers":{"prusa":"idle"}}"#
        );
        assert!(sign_rx.try_recv().is_err());
        assert_eq!(hub.cache().get(Channel::Sign).unwrap(), sign_before);
    }

    #[tokio::test]
    async fn derivation_failure_is_contained() {
        let hub = test_hub(FailingRoster);
        let outcome = hub
            .ingest(&producer(), &frame(report(0, 1, 0)))
            .await
            .unwrap();
        assert_eq!(outcome.dispatched_channels(), vec![Channel::Printers]);
        assert_eq!(outcome.failed, vec![Channel::Sign, Channel::Hours]);
        assert!(hub.cache().get(Channel::Sign).is_none());
        assert!(hub.cache().last_contact().is_some());
    }

    #[tokio::test]
    async fn missing_printers_keeps_previous_value() {
        let hub = test_hub(FixedRoster::with_mentors(&[]));
        let conn = producer();
        hub.ingest(&conn, &frame(report(0, 1, 0))).await.unwrap();
        let outcome = hub
            .ingest(&conn, &frame(json!({"sign": {"door": 0}})))
            .await
            .unwrap();
        assert!(outcome.failed.contains(&Channel::Printers));
        assert_eq!(
            hub.cache().poller_json_to_str(Channel::Printers),
            r#"{"printers":{"prusa":"printing"}}"#
        );
    }

    #[tokio::test]
    async fn unchanged_report_still_refreshes_contact() {
        let hub = test_hub(FixedRoster::with_mentors(&["Ada"]));
        let conn = producer();
        hub.ingest(&conn, &frame(report(0, 1, 0))).await.unwrap();
        let first = hub.cache().last_contact().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        hub.ingest(&conn, &frame(report(0, 1, 0))).await.unwrap();
        assert!(hub.cache().last_contact().unwrap() > first);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_contact_after_silence_redispatches() {
        let hub = test_hub(FixedRoster::with_mentors(&["Ada"]));
        let conn = producer();
        hub.ingest(&conn, &frame(report(0, 1, 0))).await.unwrap();

        tokio::time::advance(hub.config().staleness + Duration::from_secs(1)).await;
        assert_eq!(
            hub.cache().poller_json_to_str(Channel::Sign),
            NEUTRAL_PAYLOAD
        );

        let outcome = hub.ingest(&conn, &frame(report(0, 1, 0))).await.unwrap();
        assert_eq!(outcome.dispatched.len(), Channel::OUTBOUND.len());
    }

    #[tokio::test]
    async fn typed_garbage_after_auth_counts_as_contact_only() {
        let hub = test_hub(FixedRoster::with_mentors(&["Ada"]));
        let res = hub
            .ingest(&producer(), &frame(json!({"sign": {"door": "wide"}})))
            .await;
        assert!(matches!(res, Err(HubError::Malformed(_))));
        assert!(hub.cache().last_contact().is_some());
        assert!(hub.cache().get(Channel::Sign).is_none());
    }

    #[tokio::test]
    async fn new_producer_supersedes_old() {
        let hub = test_hub(FixedRoster::with_mentors(&["Ada"]));
        let old = producer();
        let new = producer();
        hub.ingest(&old, &frame(report(0, 1, 0))).await.unwrap();
        assert_eq!(hub.active_producer(), Some(old.id()));

        hub.ingest(&new, &frame(report(0, 1, 0))).await.unwrap();
        assert_eq!(hub.active_producer(), Some(new.id()));
        assert!(old.is_closed());
        assert!(matches!(
            hub.ingest(&old, &frame(report(0, 1, 0))).await,
            Err(HubError::Closed)
        ));
    }
}
