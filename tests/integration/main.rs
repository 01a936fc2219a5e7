//! Sentinel integration test harness.
//!
//! Everything here runs in-process: frames are built by hand, the
//! advertising radio is an echo fake that answers each command with its
//! lifecycle event, and the relay runs on paused tokio time so a 10 s
//! dwell costs nothing.
//!
//!   cargo test --test integration

use std::sync::{Arc, Mutex};

use sentinel_core::AdvPayload;
use sentinel_services::{ChannelError, ChannelEvent, CovertChannel};
use tokio::sync::mpsc;
use tokio::time::Instant;

mod broadcast;
mod detection;

// ── Frames ────────────────────────────────────────────────────────────────────

/// 26-byte deauthentication frame from `transmitter`, reason code 7.
pub fn deauth_frame(transmitter: [u8; 6]) -> Vec<u8> {
    let mut f = vec![0xC0, 0x00, 0x3a, 0x01];
    f.extend_from_slice(&[0xff; 6]);
    f.extend_from_slice(&transmitter);
    f.extend_from_slice(&transmitter);
    f.extend_from_slice(&[0x10, 0x00, 0x07, 0x00]);
    f
}

/// Beacon header padded to the tagged-element offset, carrying `ssid`.
pub fn beacon_frame(transmitter: [u8; 6], ssid: &str) -> Vec<u8> {
    let mut f = deauth_frame(transmitter);
    f[0] = 0x80;
    f.resize(36, 0);
    f.push(0);
    f.push(ssid.len() as u8);
    f.extend_from_slice(ssid.as_bytes());
    f
}

// ── Echo radio ────────────────────────────────────────────────────────────────

/// Records every commit and answers each command with its event.
pub struct EchoRadio {
    events: mpsc::UnboundedSender<ChannelEvent>,
    commits: Mutex<Vec<(Instant, Vec<u8>)>>,
}

impl EchoRadio {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let radio = Arc::new(Self {
            events,
            commits: Mutex::new(Vec::new()),
        });
        (radio, rx)
    }

    /// Full on-air bytes of every committed payload, with commit time.
    pub fn commits(&self) -> Vec<(Instant, Vec<u8>)> {
        self.commits.lock().unwrap().clone()
    }

    fn emit(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        self.events.send(event).map_err(|_| ChannelError::Closed)
    }
}

impl CovertChannel for EchoRadio {
    fn commit_payload(&self, payload: &AdvPayload) -> Result<(), ChannelError> {
        self.commits
            .lock()
            .unwrap()
            .push((Instant::now(), payload.as_bytes().to_vec()));
        self.emit(ChannelEvent::DataCommitted)
    }

    fn start_broadcast(&self) -> Result<(), ChannelError> {
        self.emit(ChannelEvent::BroadcastStarted)
    }

    fn stop_broadcast(&self) -> Result<(), ChannelError> {
        self.emit(ChannelEvent::BroadcastStopped)
    }
}
