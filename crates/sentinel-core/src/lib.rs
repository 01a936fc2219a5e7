//! sentinel-core — frame parsing, alert records, channel wire format and
//! configuration. All other sentinel crates depend on this one.

pub mod alert;
pub mod config;
pub mod frame;
pub mod wire;

pub use alert::{AlertCodec, AlertError, AlertRecord, EncodedAlert};
pub use frame::{classify, extract, Classification, MacAddress, NetworkName, PacketKind, RawFrame};
pub use wire::AdvPayload;
