//! Covert channel relay.
//!
//! Drives the advertising radio through a fixed cycle:
//!
//! ```text
//!   Idle ──data_committed──▶ DataCommitted ──broadcast_started──▶ Advertising
//!                                 ▲                                   │
//!                                 │                        dwell, then stop
//!                                 │                                   ▼
//!                                 └──broadcast_stopped / commit─── Stopping
//! ```
//!
//! The mailbox is read only on `broadcast_stopped`, so an alert posted
//! mid-cycle goes on air at the start of the next one: it waits at most
//! one dwell interval.

use std::sync::Arc;
use std::time::Duration;

use sentinel_core::AdvPayload;
use tokio::sync::mpsc;

use crate::mailbox::MailboxReader;

// ── Collaborator ──────────────────────────────────────────────────────────────

/// Lifecycle events raised by the advertising radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    DataCommitted,
    BroadcastStarted,
    BroadcastStopped,
}

/// Commands the relay issues to the advertising radio.
///
/// Each command is answered asynchronously by a [`ChannelEvent`] on the
/// stream handed to [`relay_loop`]. Implementations must not block.
pub trait CovertChannel: Send + Sync {
    fn commit_payload(&self, payload: &AdvPayload) -> Result<(), ChannelError>;
    fn start_broadcast(&self) -> Result<(), ChannelError>;
    fn stop_broadcast(&self) -> Result<(), ChannelError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("{command} failed: {reason}")]
    Command {
        command: &'static str,
        reason: String,
    },

    #[error("channel event stream is closed")]
    Closed,
}

// ── State machine ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastState {
    Idle,
    DataCommitted,
    Advertising,
    Stopping,
}

/// What the driver loop must do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    StartBroadcast,
    /// Hold the current payload on air for the dwell, then stop.
    DwellThenStop,
    Commit(AdvPayload),
}

/// Pure transition logic. Owns the mailbox read half and the state.
#[derive(Debug)]
pub struct Relay {
    state: BroadcastState,
    mailbox: MailboxReader,
    cycles: u64,
}

impl Relay {
    pub fn new(mailbox: MailboxReader) -> Self {
        Self {
            state: BroadcastState::Idle,
            mailbox,
            cycles: 0,
        }
    }

    pub fn state(&self) -> BroadcastState {
        self.state
    }

    /// Completed advertise/stop cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Payload committed once at startup, before any event.
    pub fn initial_payload(&mut self) -> AdvPayload {
        self.next_payload()
    }

    /// Apply one radio event. `None` means the event was not expected in
    /// the current state and is ignored.
    pub fn on_event(&mut self, event: ChannelEvent) -> Option<RelayAction> {
        use BroadcastState::*;

        let (next, action) = match (self.state, event) {
            (Idle | DataCommitted, ChannelEvent::DataCommitted) => {
                (DataCommitted, RelayAction::StartBroadcast)
            }
            (DataCommitted, ChannelEvent::BroadcastStarted) => {
                (Advertising, RelayAction::DwellThenStop)
            }
            (Stopping, ChannelEvent::BroadcastStopped) => {
                self.cycles += 1;
                (DataCommitted, RelayAction::Commit(self.next_payload()))
            }
            (state, event) => {
                tracing::debug!(?state, ?event, "ignoring unexpected channel event");
                return None;
            }
        };

        tracing::debug!(from = ?self.state, to = ?next, ?event, "relay transition");
        self.state = next;
        Some(action)
    }

    /// Record that the stop command went out.
    pub fn stop_issued(&mut self) {
        if self.state == BroadcastState::Advertising {
            tracing::debug!(from = ?self.state, to = ?BroadcastState::Stopping, "relay transition");
            self.state = BroadcastState::Stopping;
        }
    }

    fn next_payload(&mut self) -> AdvPayload {
        let snapshot = self.mailbox.read();
        let payload = AdvPayload::new(snapshot.alert.as_bytes());
        tracing::info!(
            cycle = self.cycles,
            fresh = snapshot.fresh,
            payload_len = payload.len(),
            source_len = payload.source_len(),
            truncated = payload.is_truncated(),
            "payload built"
        );
        payload
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    pub dwell: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            dwell: Duration::from_secs(sentinel_core::config::DEFAULT_DWELL_SECS),
        }
    }
}

/// Run the broadcast cycle until the event stream closes.
///
/// A failed radio command produces no event, so the relay holds its state
/// and reissues the command one dwell later. A failed stop leaves the
/// current payload on air for another dwell. A failed commit is retried
/// with whatever the mailbox holds at that point.
pub async fn relay_loop(
    channel: Arc<dyn CovertChannel>,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    mailbox: MailboxReader,
    config: RelayConfig,
) {
    let mut relay = Relay::new(mailbox);

    tracing::info!(dwell_secs = config.dwell.as_secs(), "covert relay starting");

    let mut pending = Some(RelayAction::Commit(relay.initial_payload()));
    loop {
        if let Some(action) = pending.take() {
            pending = execute(channel.as_ref(), &mut relay, action, config.dwell).await;
            continue;
        }
        let Some(event) = events.recv().await else {
            break;
        };
        pending = relay.on_event(event);
    }

    tracing::info!(cycles = relay.cycles(), "channel event stream closed, relay stopping");
}

/// Issue one command. Returns the action to retry if the radio refused it.
async fn execute(
    channel: &dyn CovertChannel,
    relay: &mut Relay,
    action: RelayAction,
    dwell: Duration,
) -> Option<RelayAction> {
    match action {
        RelayAction::StartBroadcast => {
            let Err(e) = channel.start_broadcast() else {
                return None;
            };
            tracing::warn!(error = %e, "start broadcast failed, retrying after dwell");
            tokio::time::sleep(dwell).await;
            Some(RelayAction::StartBroadcast)
        }
        RelayAction::DwellThenStop => {
            tokio::time::sleep(dwell).await;
            match channel.stop_broadcast() {
                Ok(()) => {
                    relay.stop_issued();
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stop broadcast failed, holding payload on air");
                    Some(RelayAction::DwellThenStop)
                }
            }
        }
        RelayAction::Commit(payload) => {
            let Err(e) = channel.commit_payload(&payload) else {
                return None;
            };
            tracing::warn!(error = %e, "payload commit failed, retrying after dwell");
            tokio::time::sleep(dwell).await;
            Some(RelayAction::Commit(relay.next_payload()))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
