//! Alert sinks — what happens to a detected alert.
//!
//! The detector is shared by every alerting strategy; only the sink
//! differs. Sinks run on the capture context and must not block.

use std::sync::Arc;

use sentinel_core::config::SinkKind;
use sentinel_core::{AlertRecord, EncodedAlert};

use crate::mailbox::MailboxWriter;

/// Receives every alert the detector raises.
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Take ownership of the encoded alert. Must return promptly.
    fn deliver(&self, record: &AlertRecord, encoded: EncodedAlert);
}

/// Writes each alert as a structured log line and nothing else.
#[derive(Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn deliver(&self, record: &AlertRecord, encoded: EncodedAlert) {
        tracing::warn!(
            origin = %record.origin_address(),
            network = %record.network_name(),
            detected_at = record.detected_at(),
            encoded = %encoded,
            "deauthentication attack"
        );
    }
}

/// Logs each alert and posts it to the covert channel mailbox.
#[derive(Debug)]
pub struct CovertSink {
    mailbox: MailboxWriter,
}

impl CovertSink {
    pub fn new(mailbox: MailboxWriter) -> Self {
        Self { mailbox }
    }
}

impl AlertSink for CovertSink {
    fn name(&self) -> &'static str {
        "covert"
    }

    fn deliver(&self, record: &AlertRecord, encoded: EncodedAlert) {
        tracing::warn!(
            origin = %record.origin_address(),
            network = %record.network_name(),
            detected_at = record.detected_at(),
            encoded_len = encoded.len(),
            "deauthentication attack, queued for broadcast"
        );
        self.mailbox.post(encoded);
    }
}

/// Build the sink named in config. `Log` drops the mailbox writer.
pub fn sink_for(kind: SinkKind, mailbox: MailboxWriter) -> Arc<dyn AlertSink> {
    match kind {
        SinkKind::Log => Arc::new(LogSink),
        SinkKind::Covert => Arc::new(CovertSink::new(mailbox)),
    }
}
