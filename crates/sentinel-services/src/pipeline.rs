//! Detection pipeline — the capture-context entry point.
//!
//! classify → extract → build → encode → sink. Runs once per frame on the
//! driver's callback, so every step is bounded-time and nothing here can
//! fail: short frames become `Other` or sentinel fields, and an encoding
//! failure becomes the `error_creating_record` sentinel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sentinel_core::{
    classify, extract, AlertCodec, AlertRecord, Classification, EncodedAlert, RawFrame,
};

use crate::sink::AlertSink;

/// Turns captured frames into alerts for one sink.
pub struct DeauthDetector {
    codec: AlertCodec,
    sink: Arc<dyn AlertSink>,
    frames_seen: AtomicU64,
    alerts_raised: AtomicU64,
}

/// Running counters, for periodic status logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorStats {
    pub frames_seen: u64,
    pub alerts_raised: u64,
}

impl DeauthDetector {
    pub fn new(codec: AlertCodec, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            codec,
            sink,
            frames_seen: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
        }
    }

    /// Handle one frame, stamping any alert with the wall clock.
    pub fn on_frame(&self, frame: RawFrame<'_>) -> Option<AlertRecord> {
        self.on_frame_at(frame, unix_now())
    }

    /// Handle one frame with an explicit detection time.
    pub fn on_frame_at(&self, frame: RawFrame<'_>, now: i64) -> Option<AlertRecord> {
        self.frames_seen.fetch_add(1, Ordering::Relaxed);

        let class = classify(&frame);
        tracing::trace!(len = frame.len(), kind = ?frame.kind(), ?class, "frame classified");
        if class != Classification::ManagementDeauth {
            return None;
        }

        let fields = extract(&frame);
        tracing::debug!(
            origin = %fields.origin,
            network = %fields.network,
            "deauthentication fields extracted"
        );

        let record = AlertRecord::from_fields(fields, now);
        let encoded = self.codec.encode(&record).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "alert encoding failed, sending sentinel");
            EncodedAlert::encoding_failed()
        });

        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
        self.sink.deliver(&record, encoded);
        Some(record)
    }

    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    pub fn stats(&self) -> DetectorStats {
        DetectorStats {
            frames_seen: self.frames_seen.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
        }
    }
}

/// Current time in Unix seconds. A clock before 1970 reads as 0.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
