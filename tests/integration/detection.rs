use std::sync::Arc;

use sentinel_core::config::SinkKind;
use sentinel_core::{AlertCodec, PacketKind, RawFrame};
use sentinel_services::{mailbox, sink_for, DeauthDetector};

use crate::*;

#[test]
fn deauth_frame_lands_in_mailbox() {
    let (writer, mut reader) = mailbox();
    let detector = DeauthDetector::new(AlertCodec::new(false), sink_for(SinkKind::Covert, writer));

    let bytes = deauth_frame([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    let record = detector
        .on_frame_at(RawFrame::new(&bytes, bytes.len(), PacketKind::Management), 1_700_000_000)
        .expect("deauth frame should raise an alert");

    assert_eq!(record.origin_address().to_string(), "11:22:33:44:55:66");
    assert_eq!(record.network_name().as_str(), "Unknown SSID");
    assert_eq!(record.detected_at(), 1_700_000_000);

    let snap = reader.read();
    assert!(snap.fresh);
    assert_eq!(AlertCodec::decode(snap.alert.as_str()).unwrap(), record);
}

#[test]
fn beacons_never_reach_the_mailbox() {
    let (writer, mut reader) = mailbox();
    let detector = DeauthDetector::new(AlertCodec::default(), sink_for(SinkKind::Covert, writer));

    let bytes = beacon_frame([0x22; 6], "HomeNet");
    assert!(detector
        .on_frame(RawFrame::new(&bytes, bytes.len(), PacketKind::Management))
        .is_none());
    assert!(!reader.read().fresh);
}

#[test]
fn log_sink_keeps_idle_sentinel() {
    let (writer, mut reader) = mailbox();
    let detector = DeauthDetector::new(AlertCodec::default(), sink_for(SinkKind::Log, writer));

    let bytes = deauth_frame([0x33; 6]);
    assert!(detector
        .on_frame(RawFrame::new(&bytes, bytes.len(), PacketKind::Management))
        .is_some());
    assert!(reader.read().alert.is_sentinel());
}

#[test]
fn detector_is_shared_across_capture_threads() {
    let (writer, mut reader) = mailbox();
    let detector = Arc::new(DeauthDetector::new(
        AlertCodec::new(true),
        sink_for(SinkKind::Covert, writer),
    ));

    let handles: Vec<_> = (0u8..4)
        .map(|n| {
            let detector = detector.clone();
            std::thread::spawn(move || {
                let bytes = deauth_frame([n; 6]);
                for len in 0..=bytes.len() {
                    detector.on_frame(RawFrame::new(&bytes, len, PacketKind::Management));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // 27 lengths per thread, 2..=26 of which carry a deauth frame-control word.
    assert_eq!(detector.stats().frames_seen, 4 * 27);
    assert_eq!(detector.stats().alerts_raised, 4 * 25);

    // Whatever won the race, it decodes cleanly.
    let last = reader.read().alert;
    assert!(AlertCodec::decode(last.as_str()).is_ok());
}
