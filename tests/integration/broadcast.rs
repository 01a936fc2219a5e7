use std::time::Duration;

use sentinel_core::config::SinkKind;
use sentinel_core::wire::{self, CONTENT_BUDGET};
use sentinel_core::{AlertCodec, PacketKind, RawFrame};
use sentinel_services::{mailbox, relay_loop, sink_for, DeauthDetector, RelayConfig};
use tokio::time::Instant;

use crate::*;

#[tokio::test(start_paused = true)]
async fn detected_attack_is_broadcast_next_cycle() {
    let (writer, reader) = mailbox();
    let detector = DeauthDetector::new(AlertCodec::new(false), sink_for(SinkKind::Covert, writer));
    let (radio, events) = EchoRadio::new();
    let start = Instant::now();

    let relay = tokio::spawn(relay_loop(radio.clone(), events, reader, RelayConfig::default()));

    // Attack arrives three seconds into the first dwell.
    tokio::time::sleep(Duration::from_secs(3)).await;
    let bytes = deauth_frame([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    detector.on_frame_at(RawFrame::new(&bytes, bytes.len(), PacketKind::Management), 1_700_000_000);

    tokio::time::sleep(Duration::from_secs(12)).await;
    relay.abort();

    let commits = radio.commits();
    assert!(commits.len() >= 2, "got {commits:?}");

    let idle = wire::parse(&commits[0].1).unwrap();
    assert_eq!(idle, b"no attacks found");

    let (at, on_air) = &commits[1];
    assert!(*at - start <= Duration::from_secs(10) + Duration::from_millis(10));
    let content = wire::parse(on_air).unwrap();
    assert_eq!(content.len(), CONTENT_BUDGET);
    let text = std::str::from_utf8(content).unwrap();
    assert!(text.contains("11:22:33:44:55:66"), "payload was {text:?}");
}

#[tokio::test(start_paused = true)]
async fn alert_is_never_later_than_next_cycle() {
    let dwell = Duration::from_secs(10);
    for offset in [0u64, 1, 5, 9] {
        let (writer, reader) = mailbox();
        let detector =
            DeauthDetector::new(AlertCodec::new(false), sink_for(SinkKind::Covert, writer));
        let (radio, events) = EchoRadio::new();
        let start = Instant::now();
        let relay = tokio::spawn(relay_loop(radio.clone(), events, reader, RelayConfig { dwell }));

        // Post during the second dwell interval.
        tokio::time::sleep(dwell + Duration::from_secs(offset)).await;
        let posted_at = Instant::now();
        let bytes = deauth_frame([0xaa; 6]);
        detector.on_frame(RawFrame::new(&bytes, bytes.len(), PacketKind::Management));

        tokio::time::sleep(dwell * 2).await;
        relay.abort();

        let first_seen = radio
            .commits()
            .into_iter()
            .find(|(_, bytes)| {
                let content = wire::parse(bytes).unwrap();
                std::str::from_utf8(content)
                    .map(|t| t.contains("aa:aa:aa:aa:aa:aa"))
                    .unwrap_or(false)
            })
            .map(|(at, _)| at)
            .expect("alert should have been committed");

        assert!(first_seen >= posted_at);
        assert!(
            first_seen - posted_at <= dwell + Duration::from_millis(10),
            "offset {offset}: waited {:?}",
            first_seen - posted_at
        );
        assert!(first_seen - start <= dwell * 2 + Duration::from_millis(10));
    }
}

#[tokio::test(start_paused = true)]
async fn base64_alerts_are_cut_deterministically() {
    let (writer, reader) = mailbox();
    let detector = DeauthDetector::new(AlertCodec::new(true), sink_for(SinkKind::Covert, writer));
    let bytes = deauth_frame([0x42; 6]);
    let record = detector
        .on_frame_at(RawFrame::new(&bytes, bytes.len(), PacketKind::Management), 1_700_000_000)
        .unwrap();
    let full = AlertCodec::new(true).encode(&record).unwrap();

    let (radio, events) = EchoRadio::new();
    let relay = tokio::spawn(relay_loop(
        radio.clone(),
        events,
        reader,
        RelayConfig {
            dwell: Duration::from_secs(1),
        },
    ));
    tokio::time::sleep(Duration::from_millis(4500)).await;
    relay.abort();

    let commits = radio.commits();
    assert!(commits.len() >= 4);
    for (_, on_air) in &commits {
        let content = wire::parse(on_air).unwrap();
        assert_eq!(content, &full.as_bytes()[..CONTENT_BUDGET]);
    }
}
