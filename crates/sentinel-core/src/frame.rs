//! 802.11 management frame view, classification and field extraction.
//!
//! Frame contents are attacker-controlled. Every read goes through
//! [`RawFrame::bytes`], which is already clamped to the declared length,
//! and every offset is taken with `get` so a short frame degrades to a
//! default value instead of an out-of-bounds read.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Layout ────────────────────────────────────────────────────────────────────

/// Length of the little-endian frame-control word at the start of every frame.
pub const FRAME_CONTROL_LEN: usize = 2;

/// Offset of the transmitter address (addr2) in the management header.
pub const TRANSMITTER_OFFSET: usize = 10;

/// Length of an IEEE MAC address.
pub const MAC_LEN: usize = 6;

/// Offset of the first tagged element.
///
/// 24-byte management header plus the 12 fixed bytes (timestamp, beacon
/// interval, capability info) that beacons and probe responses carry.
/// A deauthentication body is only a 2-byte reason code, so a scan from
/// here normally finds nothing and yields [`UNKNOWN_SSID`].
pub const TAGGED_PARAMS_OFFSET: usize = 36;

/// Tag number of the SSID element.
pub const SSID_TAG: u8 = 0;

/// Longest SSID the standard allows.
pub const MAX_SSID_LEN: usize = 32;

/// Frame-control type value for management frames.
pub const TYPE_MANAGEMENT: u8 = 0;

/// Management subtype for deauthentication.
pub const SUBTYPE_DEAUTH: u8 = 0x0C;

/// Network name reported when no usable SSID element is present.
pub const UNKNOWN_SSID: &str = "Unknown SSID";

// ── Packet kind ───────────────────────────────────────────────────────────────

/// Frame-type tag supplied by the capture collaborator alongside each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    Management = 0,
    Control = 1,
    Data = 2,
    /// Anything the driver could not place in the three classes above.
    Misc = 3,
}

impl TryFrom<u8> for PacketKind {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketKind::Management),
            1 => Ok(PacketKind::Control),
            2 => Ok(PacketKind::Data),
            3 => Ok(PacketKind::Misc),
            other => Err(FrameError::UnknownPacketKind(other.to_string())),
        }
    }
}

impl FromStr for PacketKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mgmt" | "management" => Ok(PacketKind::Management),
            "ctrl" | "control" => Ok(PacketKind::Control),
            "data" => Ok(PacketKind::Data),
            "misc" => Ok(PacketKind::Misc),
            _ => Err(FrameError::UnknownPacketKind(s.to_string())),
        }
    }
}

// ── Raw frame ─────────────────────────────────────────────────────────────────

/// Immutable view over one captured frame.
///
/// The view is cut to `min(declared_len, buffer.len())` on construction,
/// so nothing downstream can see bytes past the declared length even if
/// the driver hands over a larger buffer.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    bytes: &'a [u8],
    kind: PacketKind,
}

impl<'a> RawFrame<'a> {
    pub fn new(buffer: &'a [u8], declared_len: usize, kind: PacketKind) -> Self {
        let len = declared_len.min(buffer.len());
        Self {
            bytes: &buffer[..len],
            kind,
        }
    }

    /// The readable bytes of the frame.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// Little-endian frame-control word, or `None` for frames under 2 bytes.
    pub fn frame_control(&self) -> Option<u16> {
        let fc = self.bytes.get(..FRAME_CONTROL_LEN)?;
        Some(u16::from_le_bytes([fc[0], fc[1]]))
    }
}

/// Type field (bits 2-3) of a frame-control word.
pub fn frame_type(frame_control: u16) -> u8 {
    ((frame_control >> 2) & 0x03) as u8
}

/// Subtype field (bits 4-7) of a frame-control word.
pub fn frame_subtype(frame_control: u16) -> u8 {
    ((frame_control & 0x00F0) >> 4) as u8
}

// ── Classifier ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    ManagementDeauth,
    Other,
}

/// Decide whether `frame` is a management-class deauthentication frame.
///
/// Both the collaborator's packet kind and the type bits of the
/// frame-control word must say "management". Frames too short to carry a
/// frame-control word are `Other`.
pub fn classify(frame: &RawFrame<'_>) -> Classification {
    if frame.kind() != PacketKind::Management {
        return Classification::Other;
    }
    match frame.frame_control() {
        Some(fc) if frame_type(fc) == TYPE_MANAGEMENT && frame_subtype(fc) == SUBTYPE_DEAUTH => {
            Classification::ManagementDeauth
        }
        _ => Classification::Other,
    }
}

// ── MAC address ───────────────────────────────────────────────────────────────

/// 6-byte hardware address. Displays as lowercase colon-separated hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; MAC_LEN]);

impl MacAddress {
    pub const ZERO: MacAddress = MacAddress([0u8; MAC_LEN]);

    /// Build from a slice of exactly 6 bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        <[u8; MAC_LEN]>::try_from(slice).ok().map(Self)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; MAC_LEN]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

impl FromStr for MacAddress {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; MAC_LEN];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| FrameError::InvalidMac(s.to_string()))?;
            *octet =
                u8::from_str_radix(part, 16).map_err(|_| FrameError::InvalidMac(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(FrameError::InvalidMac(s.to_string()));
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Network name ──────────────────────────────────────────────────────────────

/// SSID text, never longer than [`MAX_SSID_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkName(String);

impl NetworkName {
    pub fn new(name: impl Into<String>) -> Result<Self, FrameError> {
        let name = name.into();
        if name.len() > MAX_SSID_LEN {
            return Err(FrameError::NetworkNameTooLong(name.len()));
        }
        Ok(Self(name))
    }

    /// The "Unknown SSID" sentinel.
    pub fn unknown() -> Self {
        Self(UNKNOWN_SSID.to_string())
    }

    /// Convert raw SSID element bytes.
    ///
    /// A present but empty (hidden) SSID stays empty. Invalid UTF-8 is
    /// replaced lossily and the result cut back to 32 bytes on a char
    /// boundary.
    pub fn from_ssid_bytes(raw: &[u8]) -> Self {
        let mut name = String::from_utf8_lossy(raw).into_owned();
        if name.len() > MAX_SSID_LEN {
            let mut cut = MAX_SSID_LEN;
            while !name.is_char_boundary(cut) {
                cut -= 1;
            }
            name.truncate(cut);
        }
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_SSID
    }
}

impl Default for NetworkName {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for NetworkName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NetworkName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        NetworkName::new(s).map_err(serde::de::Error::custom)
    }
}

// ── Tagged elements ───────────────────────────────────────────────────────────

/// One (tag, length, value) information element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedElement<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// Sequential walk over tagged elements.
///
/// Ends when fewer than two bytes remain for a tag header, or when a
/// declared element length would run past the end of the frame. Each step
/// advances by at least 2 bytes, so the walk is bounded by the frame length.
#[derive(Debug, Clone)]
pub struct TaggedElements<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> TaggedElements<'a> {
    pub fn new(frame: &RawFrame<'a>, offset: usize) -> Self {
        Self {
            bytes: frame.bytes(),
            pos: offset,
        }
    }
}

impl<'a> Iterator for TaggedElements<'a> {
    type Item = TaggedElement<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = self.bytes.get(self.pos..self.pos.checked_add(2)?)?;
        let (tag, len) = (header[0], header[1] as usize);
        let start = self.pos + 2;
        let value = match self.bytes.get(start..start + len) {
            Some(v) => v,
            None => {
                // Overrun: park the cursor so the walk stays finished.
                self.pos = self.bytes.len();
                return None;
            }
        };
        self.pos = start + len;
        Some(TaggedElement { tag, value })
    }
}

// ── Field extractor ───────────────────────────────────────────────────────────

/// Fields pulled from a classified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub origin: MacAddress,
    pub network: NetworkName,
}

/// Transmitter address, or [`MacAddress::ZERO`] if the frame is too short.
pub fn transmitter_address(frame: &RawFrame<'_>) -> MacAddress {
    frame
        .bytes()
        .get(TRANSMITTER_OFFSET..TRANSMITTER_OFFSET + MAC_LEN)
        .and_then(MacAddress::from_slice)
        .unwrap_or(MacAddress::ZERO)
}

/// First SSID element at or after [`TAGGED_PARAMS_OFFSET`], if any.
pub fn scan_ssid<'a>(frame: &RawFrame<'a>) -> Option<&'a [u8]> {
    TaggedElements::new(frame, TAGGED_PARAMS_OFFSET)
        .find(|e| e.tag == SSID_TAG && e.value.len() <= MAX_SSID_LEN)
        .map(|e| e.value)
}

/// Origin address and network name of a frame. Never fails.
pub fn extract(frame: &RawFrame<'_>) -> ExtractedFields {
    let network = scan_ssid(frame)
        .map(NetworkName::from_ssid_bytes)
        .unwrap_or_default();
    ExtractedFields {
        origin: transmitter_address(frame),
        network,
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("invalid MAC address: {0:?}")]
    InvalidMac(String),

    #[error("unknown packet kind: {0:?}")]
    UnknownPacketKind(String),

    #[error("network name is {0} bytes, maximum is {}", MAX_SSID_LEN)]
    NetworkNameTooLong(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
