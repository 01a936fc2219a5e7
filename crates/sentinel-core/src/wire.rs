//! Covert channel wire format.
//!
//! One advertisement payload is at most 31 bytes: a 5-byte header (a
//! 3-byte flags element and the 2-byte header of a manufacturer-data
//! element) followed by at most 25 bytes of alert text. Text longer than
//! the budget is cut to its first 25 bytes. The cut is silent and always
//! lands in the same place for the same input.
//!
//! ```text
//!  0      1      2      3            4      5 ..
//! [0x02] [0x01] [0x06] [len + 1]    [0xFF] [content ...]
//!  flags element        manufacturer data element
//! ```

use static_assertions::{assert_eq_size, const_assert};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Hard payload limit of the advertising radio.
pub const PAYLOAD_CAPACITY: usize = 31;

/// Bytes consumed by [`AdvHeader`].
pub const HEADER_LEN: usize = 5;

/// Bytes of alert text carried per payload.
pub const CONTENT_BUDGET: usize = 25;

/// AD type: flags.
pub const AD_TYPE_FLAGS: u8 = 0x01;

/// LE general discoverable, BR/EDR not supported.
pub const AD_FLAGS_VALUE: u8 = 0x06;

/// AD type: manufacturer specific data.
pub const AD_TYPE_MANUFACTURER: u8 = 0xFF;

const_assert!(HEADER_LEN + CONTENT_BUDGET <= PAYLOAD_CAPACITY);

// ── Header ────────────────────────────────────────────────────────────────────

/// Fixed prefix of every payload.
///
/// Wire size: 5 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct AdvHeader {
    /// Length of the flags element after this byte. Always 2.
    pub flags_len: u8,
    /// Always [`AD_TYPE_FLAGS`].
    pub flags_type: u8,
    /// Always [`AD_FLAGS_VALUE`].
    pub flags: u8,
    /// Content length plus one for the type byte.
    pub data_len: u8,
    /// Always [`AD_TYPE_MANUFACTURER`].
    pub data_type: u8,
}

assert_eq_size!(AdvHeader, [u8; HEADER_LEN]);

impl AdvHeader {
    pub fn for_content(content_len: usize) -> Self {
        Self {
            flags_len: 2,
            flags_type: AD_TYPE_FLAGS,
            flags: AD_FLAGS_VALUE,
            data_len: (content_len.min(CONTENT_BUDGET) + 1) as u8,
            data_type: AD_TYPE_MANUFACTURER,
        }
    }
}

// ── Payload ───────────────────────────────────────────────────────────────────

/// The first [`CONTENT_BUDGET`] bytes of `content`.
pub fn truncate_to_budget(content: &[u8]) -> &[u8] {
    &content[..content.len().min(CONTENT_BUDGET)]
}

/// A fully built payload, ready to commit to the radio.
#[derive(Clone, PartialEq, Eq)]
pub struct AdvPayload {
    buf: [u8; PAYLOAD_CAPACITY],
    len: usize,
    source_len: usize,
}

impl AdvPayload {
    /// Build a payload from alert text, cutting it to the content budget.
    pub fn new(content: &[u8]) -> Self {
        let kept = truncate_to_budget(content);
        let mut buf = [0u8; PAYLOAD_CAPACITY];
        buf[..HEADER_LEN].copy_from_slice(AdvHeader::for_content(kept.len()).as_bytes());
        buf[HEADER_LEN..HEADER_LEN + kept.len()].copy_from_slice(kept);
        Self {
            buf,
            len: HEADER_LEN + kept.len(),
            source_len: content.len(),
        }
    }

    /// Header plus content, exactly as it goes on air.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn content(&self) -> &[u8] {
        &self.buf[HEADER_LEN..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == HEADER_LEN
    }

    /// True if the source text lost its tail.
    pub fn is_truncated(&self) -> bool {
        self.source_len > CONTENT_BUDGET
    }

    /// Length of the text before truncation.
    pub fn source_len(&self) -> usize {
        self.source_len
    }
}

impl std::fmt::Debug for AdvPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvPayload")
            .field("content", &String::from_utf8_lossy(self.content()))
            .field("len", &self.len)
            .field("source_len", &self.source_len)
            .finish()
    }
}

/// Validate a received payload and return its content bytes.
pub fn parse(bytes: &[u8]) -> Result<&[u8], WireError> {
    let header = AdvHeader::read_from_prefix(bytes).ok_or(WireError::TooShort(bytes.len()))?;
    if header.flags_len != 2 || header.flags_type != AD_TYPE_FLAGS {
        return Err(WireError::BadFlagsElement);
    }
    if header.data_type != AD_TYPE_MANUFACTURER {
        return Err(WireError::UnexpectedDataType(header.data_type));
    }
    let content_len = (header.data_len as usize)
        .checked_sub(1)
        .ok_or(WireError::BadDataLength(header.data_len))?;
    if content_len > CONTENT_BUDGET {
        return Err(WireError::ContentTooLong(content_len));
    }
    bytes
        .get(HEADER_LEN..HEADER_LEN + content_len)
        .ok_or(WireError::Truncated {
            declared: content_len,
            available: bytes.len() - HEADER_LEN,
        })
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("payload of {0} bytes is shorter than the {} byte header", HEADER_LEN)]
    TooShort(usize),

    #[error("flags element is malformed")]
    BadFlagsElement,

    #[error("unexpected data element type: 0x{0:02x}")]
    UnexpectedDataType(u8),

    #[error("data element length byte is {0}")]
    BadDataLength(u8),

    #[error("content length {0} exceeds budget {}", CONTENT_BUDGET)]
    ContentTooLong(usize),

    #[error("content declares {declared} bytes but only {available} are present")]
    Truncated { declared: usize, available: usize },
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_kept_whole() {
        let payload = AdvPayload::new(b"no attacks found");
        assert_eq!(payload.content(), b"no attacks found");
        assert_eq!(payload.len(), HEADER_LEN + 16);
        assert_eq!(&payload.as_bytes()[..HEADER_LEN], &[0x02, 0x01, 0x06, 17, 0xFF]);
        assert!(!payload.is_truncated());
    }

    #[test]
    fn long_content_keeps_its_prefix() {
        let text = br#"{"m":"11:22:33:44:55:66","s":"Unknown SSID","t":1700000000}"#;
        let payload = AdvPayload::new(text);
        assert_eq!(payload.content(), &text[..CONTENT_BUDGET]);
        assert_eq!(payload.len(), HEADER_LEN + CONTENT_BUDGET);
        assert!(payload.len() <= PAYLOAD_CAPACITY);
        assert!(payload.is_truncated());
        assert_eq!(payload.source_len(), text.len());

        // Same input, same cut.
        assert_eq!(AdvPayload::new(text), payload);
    }

    #[test]
    fn exact_budget_is_not_truncated() {
        let text = [b'a'; CONTENT_BUDGET];
        let payload = AdvPayload::new(&text);
        assert_eq!(payload.content(), &text);
        assert!(!payload.is_truncated());
    }

    #[test]
    fn parse_accepts_built_payload() {
        let payload = AdvPayload::new(b"hello");
        assert_eq!(parse(payload.as_bytes()).unwrap(), b"hello");
        let empty = AdvPayload::new(b"");
        assert!(empty.is_empty());
        assert_eq!(parse(empty.as_bytes()).unwrap(), b"");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(parse(&[0x02, 0x01]), Err(WireError::TooShort(2)));
        assert_eq!(
            parse(&[0x03, 0x01, 0x06, 0x01, 0xFF]),
            Err(WireError::BadFlagsElement)
        );
        assert_eq!(
            parse(&[0x02, 0x01, 0x06, 0x01, 0x09]),
            Err(WireError::UnexpectedDataType(0x09))
        );
        assert_eq!(
            parse(&[0x02, 0x01, 0x06, 0x00, 0xFF]),
            Err(WireError::BadDataLength(0))
        );
        assert_eq!(
            parse(&[0x02, 0x01, 0x06, 40, 0xFF]),
            Err(WireError::ContentTooLong(39))
        );
        assert_eq!(
            parse(&[0x02, 0x01, 0x06, 4, 0xFF, b'a']),
            Err(WireError::Truncated {
                declared: 3,
                available: 1
            })
        );
    }

    #[test]
    fn header_layout() {
        let header = AdvHeader::for_content(10);
        assert_eq!(header.as_bytes(), &[0x02, 0x01, 0x06, 11, 0xFF]);
        assert_eq!(AdvHeader::for_content(100).data_len, (CONTENT_BUDGET + 1) as u8);
    }
}
