//! Multicast stand-in for the advertising radio.
//!
//! While "advertising", the committed payload is sent as a UDP datagram
//! to the link-local multicast group ff02::1 on a fixed interval, the way
//! a BLE controller repeats an advertisement. Every command answers with
//! the matching [`ChannelEvent`] so the relay sees the same lifecycle it
//! would see from real hardware.

use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use sentinel_core::AdvPayload;
use sentinel_services::{ChannelError, ChannelEvent, CovertChannel};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

/// IPv6 link-local all-nodes group payloads are sent to.
pub const MULTICAST_ADDR: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// Radio parameters, passed in at construction.
#[derive(Debug, Clone, Copy)]
pub struct MulticastChannelConfig {
    pub interface_index: u32,
    pub port: u16,
    pub advertise_interval: Duration,
}

pub struct MulticastChannel {
    socket: Arc<Socket>,
    dest: SockAddr,
    interval: Duration,
    payload: Mutex<Vec<u8>>,
    advertiser: Mutex<Option<JoinHandle<()>>>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl MulticastChannel {
    /// Create the channel and the event stream the relay listens on.
    pub fn new(
        config: MulticastChannelConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChannelEvent>)> {
        let socket = make_multicast_socket(config.interface_index)
            .context("failed to create multicast advertising socket")?;
        let dest = SocketAddrV6::new(MULTICAST_ADDR, config.port, 0, config.interface_index);
        let (events, rx) = mpsc::unbounded_channel();

        tracing::info!(
            interface_index = config.interface_index,
            port = config.port,
            interval_ms = config.advertise_interval.as_millis() as u64,
            "multicast channel ready"
        );

        Ok((
            Self {
                socket: Arc::new(socket),
                dest: dest.into(),
                interval: config.advertise_interval,
                payload: Mutex::new(Vec::new()),
                advertiser: Mutex::new(None),
                events,
            },
            rx,
        ))
    }

    fn emit(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        self.events.send(event).map_err(|_| ChannelError::Closed)
    }
}

impl CovertChannel for MulticastChannel {
    fn commit_payload(&self, payload: &AdvPayload) -> Result<(), ChannelError> {
        {
            let mut slot = self.payload.lock().unwrap_or_else(|e| e.into_inner());
            slot.clear();
            slot.extend_from_slice(payload.as_bytes());
        }
        tracing::info!(payload_len = payload.len(), "payload committed");
        self.emit(ChannelEvent::DataCommitted)
    }

    fn start_broadcast(&self) -> Result<(), ChannelError> {
        let bytes = self
            .payload
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let socket = self.socket.clone();
        let dest = self.dest.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            loop {
                interval.tick().await;
                match socket.send_to(&bytes, &dest) {
                    Ok(n) => tracing::trace!(bytes = n, "advertisement sent"),
                    Err(e) => tracing::warn!(error = %e, "advertisement send failed"),
                }
            }
        });

        let previous = self
            .advertiser
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        tracing::debug!("advertising started");
        self.emit(ChannelEvent::BroadcastStarted)
    }

    fn stop_broadcast(&self) -> Result<(), ChannelError> {
        if let Some(handle) = self
            .advertiser
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
        tracing::debug!("advertising stopped");
        self.emit(ChannelEvent::BroadcastStopped)
    }
}

/// Create a UDP socket suitable for sending IPv6 multicast.
fn make_multicast_socket(interface_index: u32) -> Result<Socket> {
    let socket =
        Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket
        .set_multicast_if_v6(interface_index)
        .context("IPV6_MULTICAST_IF")?;
    // Link-local only, never routed.
    socket.set_multicast_hops_v6(1).context("IPV6_MULTICAST_HOPS")?;
    socket.set_multicast_loop_v6(true).context("IPV6_MULTICAST_LOOP")?;

    Ok(socket)
}

/// Get the OS interface index for a named network interface.
/// Returns an error if the interface does not exist.
pub fn if_index(name: &str) -> Result<u32> {
    let name_cstr = std::ffi::CString::new(name).context("interface name contains null byte")?;
    let index = unsafe { libc::if_nametoindex(name_cstr.as_ptr()) };
    if index == 0 {
        anyhow::bail!("interface '{}' not found", name);
    }
    Ok(index)
}
