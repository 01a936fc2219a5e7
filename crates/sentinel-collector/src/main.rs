//! sentinel-collector — listens for sensor advertisements nearby.
//!
//! Joins the ff02::1 multicast group, validates each payload's header and
//! reports what the sensor is saying: the idle sentinel, a complete alert,
//! or a truncated alert from which only the origin address survives.
//! Nothing is persisted.

use std::net::{Ipv6Addr, SocketAddrV6};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use sentinel_core::alert::{origin_from_prefix, NO_ATTACKS_SENTINEL};
use sentinel_core::config::{SentinelConfig, DEFAULT_CHANNEL_PORT};
use sentinel_core::{wire, AlertCodec};

const MULTICAST_ADDR: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// What one advertisement carried.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Sighting {
    Idle,
    Alert(sentinel_core::AlertRecord),
    Partial {
        origin: Option<sentinel_core::MacAddress>,
        text: String,
    },
}

fn interpret(content: &[u8]) -> Sighting {
    let text = String::from_utf8_lossy(content);
    if text == NO_ATTACKS_SENTINEL {
        return Sighting::Idle;
    }
    match AlertCodec::decode(&text) {
        Ok(record) => Sighting::Alert(record),
        Err(_) => Sighting::Partial {
            origin: origin_from_prefix(&text),
            text: text.into_owned(),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = SentinelConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        SentinelConfig::default()
    });
    let interface = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.channel.interface_name().to_string());
    let port = if config.channel.port == 0 {
        DEFAULT_CHANNEL_PORT
    } else {
        config.channel.port
    };

    let interface_index = listen_index(&interface)?;
    let socket = make_listener_socket(interface_index, port)
        .context("failed to create multicast listener socket")?;
    let socket = UdpSocket::from_std(socket).context("failed to convert to tokio UdpSocket")?;

    tracing::info!(interface, port, "collector listening");

    let mut buf = vec![0u8; 256];
    let mut last: Option<Vec<u8>> = None;

    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "recv_from failed");
                continue;
            }
        };

        let content = match wire::parse(&buf[..len]) {
            Ok(content) => content,
            Err(e) => {
                tracing::trace!(error = %e, %from, "ignoring malformed advertisement");
                continue;
            }
        };

        // The sensor repeats each payload for a whole dwell interval.
        if last.as_deref() == Some(content) {
            continue;
        }
        last = Some(content.to_vec());

        match interpret(content) {
            Sighting::Idle => tracing::info!(%from, "sensor idle, no attacks found"),
            Sighting::Alert(record) => tracing::warn!(
                %from,
                origin = %record.origin_address(),
                network = %record.network_name(),
                detected_at = record.detected_at(),
                "deauthentication attack reported"
            ),
            Sighting::Partial { origin: Some(origin), text } => tracing::warn!(
                %from,
                %origin,
                partial = %text,
                "deauthentication attack reported (truncated)"
            ),
            Sighting::Partial { origin: None, text } => {
                tracing::info!(%from, content = %text, "unrecognised advertisement")
            }
        }
    }
}

/// Create a UDP socket joined to the ff02::1 multicast group.
fn make_listener_socket(interface_index: u32, port: u16) -> Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_only_v6(true).context("IPV6_V6ONLY")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0);
    socket.bind(&bind_addr.into()).context("bind()")?;

    socket
        .join_multicast_v6(&MULTICAST_ADDR, interface_index)
        .context("IPV6_JOIN_GROUP")?;

    Ok(socket.into())
}

/// Resolve the interface to listen on: a name, or the numeric index shown
/// by `ip link`.
fn listen_index(interface: &str) -> Result<u32> {
    if let Ok(index) = interface.parse::<u32>() {
        return Ok(index);
    }
    let name = std::ffi::CString::new(interface)
        .with_context(|| format!("bad interface name {interface:?}"))?;
    match unsafe { libc::if_nametoindex(name.as_ptr()) } {
        0 => Err(std::io::Error::last_os_error())
            .with_context(|| format!("cannot listen on interface {interface:?}")),
        index => Ok(index),
    }
}
