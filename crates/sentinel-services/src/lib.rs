//! sentinel-services — the concurrent half of the sensor: mailbox, alert
//! sinks, the per-frame detection pipeline and the covert channel relay.

pub mod mailbox;
pub mod pipeline;
pub mod relay;
pub mod sink;

pub use mailbox::{mailbox, MailboxReader, MailboxWriter, Snapshot};
pub use pipeline::{unix_now, DeauthDetector, DetectorStats};
pub use relay::{
    relay_loop, BroadcastState, ChannelError, ChannelEvent, CovertChannel, Relay, RelayAction,
    RelayConfig,
};
pub use sink::{sink_for, AlertSink, CovertSink, LogSink};
