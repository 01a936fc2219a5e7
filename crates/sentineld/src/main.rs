//! sentineld — deauthentication attack sensor daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use sentinel_core::config::{SentinelConfig, SinkKind};
use sentinel_core::AlertCodec;
use sentinel_services::{mailbox, relay_loop, sink_for, DeauthDetector, RelayConfig};

mod capture;
mod channel;

use channel::{MulticastChannel, MulticastChannelConfig};

/// How often the capture counters are logged.
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = SentinelConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = SentinelConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        SentinelConfig::default()
    });

    // A positional argument overrides the configured interface.
    if let Some(interface) = std::env::args().nth(1) {
        config.channel.interface = interface;
    }
    let interface = config.channel.interface_name().to_string();
    tracing::info!(
        interface,
        sink = ?config.sensor.sink,
        dwell_secs = config.channel.dwell_secs,
        base64 = config.channel.base64,
        "sentineld starting"
    );

    let interface_index = channel::if_index(&interface)?;

    // Detection side
    let (writer, reader) = mailbox();
    let sink = sink_for(config.sensor.sink, writer);
    let detector = Arc::new(DeauthDetector::new(
        AlertCodec::new(config.channel.base64),
        sink,
    ));
    tracing::info!(sink = detector.sink_name(), "alert sink ready");

    // Broadcast side
    let relay_task = if config.sensor.sink == SinkKind::Covert {
        let (radio, events) = MulticastChannel::new(MulticastChannelConfig {
            interface_index,
            port: config.channel.port,
            advertise_interval: config.channel.advertise_interval(),
        })
        .context("failed to set up covert channel")?;

        Some(tokio::spawn(relay_loop(
            Arc::new(radio),
            events,
            reader,
            RelayConfig {
                dwell: config.channel.dwell(),
            },
        )))
    } else {
        tracing::info!("log-only sink, covert relay disabled");
        None
    };

    // Capture side
    let capture = match config.capture.replay_path() {
        Some(path) => Some(capture::spawn_replay(
            path.clone(),
            config.capture.frame_interval(),
            detector.clone(),
        )?),
        None => {
            tracing::warn!("no capture source configured, broadcasting idle sentinel only");
            None
        }
    };

    let status_task = {
        let detector = detector.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(STATUS_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                let stats = detector.stats();
                tracing::info!(
                    frames_seen = stats.frames_seen,
                    alerts_raised = stats.alerts_raised,
                    "capture status"
                );
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");

    status_task.abort();
    if let Some(task) = relay_task {
        task.abort();
    }
    if let Some(handle) = capture {
        if handle.is_finished() {
            match handle.join() {
                Ok(Err(e)) => tracing::warn!(error = %e, "capture replay failed"),
                Err(_) => tracing::warn!("capture thread panicked"),
                Ok(Ok(())) => {}
            }
        }
    }

    Ok(())
}
