//! Fan-out of one payload to every subscriber of a channel, bounded by a time budget.

use std::time::Duration;

use shared::Channel;
use tokio::task::JoinSet;

use super::registry::ChannelRegistry;

/// Outcome of one fan-out round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Sends still in flight when the budget ran out. They keep running detached.
    pub pending: usize,
    /// Subscribers skipped because an earlier round's send to them has not finished.
    pub busy: usize,
}

/// Send `payload` to a snapshot of `channel`'s open subscribers.
///
/// Sends run concurrently as separate tasks. Returns when all have finished
/// or `budget` has elapsed. A failing send closes only its own connection;
/// a slow one is left running and is not disconnected here. A subscriber
/// whose previous send is still in flight is skipped for this round.
pub async fn dispatch(
    registry: &ChannelRegistry,
    channel: Channel,
    payload: String,
    budget: Duration,
) -> DispatchReport {
    let targets: Vec<_> = registry
        .snapshot(channel)
        .into_iter()
        .filter(|conn| conn.is_open())
        .collect();

    let mut report = DispatchReport {
        attempted: targets.len(),
        ..DispatchReport::default()
    };
    if targets.is_empty() {
        return report;
    }

    let mut sends = JoinSet::new();
    for conn in targets {
        let Some(slot) = conn.claim_fanout() else {
            tracing::debug!(conn = %conn.id(), channel = %channel, "previous send still in flight, skipping");
            report.busy += 1;
            continue;
        };
        let payload = payload.clone();
        sends.spawn(async move {
            match slot.send(payload).await {
                Ok(()) => true,
                Err(e) => {
                    let conn = slot.connection();
                    tracing::debug!(conn = %conn.id(), channel = %conn.channel(), error = %e, "send failed, subscriber closed");
                    false
                }
            }
        });
    }
    if sends.is_empty() {
        return report;
    }

    let deadline = tokio::time::Instant::now() + budget;
    loop {
        match tokio::time::timeout_at(deadline, sends.join_next()).await {
            Ok(Some(Ok(true))) => report.delivered += 1,
            Ok(Some(Ok(false))) => report.failed += 1,
            Ok(Some(Err(e))) => {
                tracing::warn!(channel = %channel, error = %e, "send task aborted");
                report.failed += 1;
            }
            Ok(None) => break,
            Err(_) => {
                report.pending = sends.len();
                // Dropping a JoinSet aborts its tasks; stragglers must keep running.
                sends.detach_all();
                tracing::warn!(channel = %channel, pending = report.pending, "fan-out budget exhausted");
                break;
            }
        }
    }

    report
}
