//! Alert record and its text codec.
//!
//! The serialized form is compact JSON with one-letter keys, origin first,
//! so the address survives the channel's content budget:
//!
//! ```text
//! {"m":"11:22:33:44:55:66","s":"Unknown SSID","t":1700000000}
//! ```
//!
//! The long key names used by older collectors (`maliciousMACAddress`,
//! `attackedSSID`, `detectedAt`) are accepted on decode.

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::frame::{ExtractedFields, MacAddress, NetworkName};

/// Mailbox content before the first attack is seen.
pub const NO_ATTACKS_SENTINEL: &str = "no attacks found";

/// Substituted when an alert cannot be serialized.
pub const ENCODING_FAILED_SENTINEL: &str = "error_creating_record";

/// Prefix of a compact record up to the origin address.
const ORIGIN_PREFIX: &str = "{\"m\":\"";

/// Length of a formatted MAC address.
const MAC_TEXT_LEN: usize = 17;

// ── Record ────────────────────────────────────────────────────────────────────

/// One detected deauthentication frame. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(rename = "m", alias = "maliciousMACAddress")]
    origin_address: MacAddress,

    #[serde(rename = "s", alias = "attackedSSID")]
    network_name: NetworkName,

    #[serde(rename = "t", alias = "detectedAt")]
    detected_at: i64,
}

impl AlertRecord {
    pub fn build(origin_address: MacAddress, network_name: NetworkName, now: i64) -> Self {
        Self {
            origin_address,
            network_name,
            detected_at: now,
        }
    }

    pub fn from_fields(fields: ExtractedFields, now: i64) -> Self {
        Self::build(fields.origin, fields.network, now)
    }

    pub fn origin_address(&self) -> MacAddress {
        self.origin_address
    }

    pub fn network_name(&self) -> &NetworkName {
        &self.network_name
    }

    /// Unix seconds.
    pub fn detected_at(&self) -> i64 {
        self.detected_at
    }
}

// ── Encoded form ──────────────────────────────────────────────────────────────

/// Text handed from the builder to the mailbox and on to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedAlert(String);

impl EncodedAlert {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn no_attacks() -> Self {
        Self(NO_ATTACKS_SENTINEL.to_string())
    }

    pub fn encoding_failed() -> Self {
        Self(ENCODING_FAILED_SENTINEL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == NO_ATTACKS_SENTINEL || self.0 == ENCODING_FAILED_SENTINEL
    }
}

impl Default for EncodedAlert {
    fn default() -> Self {
        Self::no_attacks()
    }
}

impl std::fmt::Display for EncodedAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Serializes records to compact JSON, optionally wrapped in base64.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertCodec {
    base64: bool,
}

impl AlertCodec {
    pub fn new(base64: bool) -> Self {
        Self { base64 }
    }

    /// Deterministic: the same record always yields the same text.
    pub fn encode(&self, record: &AlertRecord) -> Result<EncodedAlert, AlertError> {
        let json = serde_json::to_string(record).map_err(AlertError::Encode)?;
        if self.base64 {
            Ok(EncodedAlert(BASE64_STANDARD.encode(json)))
        } else {
            Ok(EncodedAlert(json))
        }
    }

    /// Decode either raw JSON or base64-wrapped JSON.
    pub fn decode(text: &str) -> Result<AlertRecord, AlertError> {
        let text = text.trim();
        if text.starts_with('{') {
            return serde_json::from_str(text).map_err(AlertError::Decode);
        }
        let raw = BASE64_STANDARD.decode(text)?;
        serde_json::from_slice(&raw).map_err(AlertError::Decode)
    }
}

/// Recover the origin address from the head of a compact record.
///
/// Works on truncated payloads as long as the address itself survived.
pub fn origin_from_prefix(text: &str) -> Option<MacAddress> {
    let rest = text.strip_prefix(ORIGIN_PREFIX)?;
    rest.get(..MAC_TEXT_LEN)?.parse().ok()
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("failed to serialize alert: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to parse alert: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("invalid base64 alert text: {0}")]
    Base64(#[from] base64::DecodeError),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
