//! Single-slot mailbox between the capture context and the relay.
//!
//! Last write wins. The slot holds a whole [`EncodedAlert`], replaced in
//! one step, so the reader sees either the old alert or the new one and
//! never a mix of the two. Posting never waits on the reader.

use std::sync::Arc;

use sentinel_core::EncodedAlert;
use tokio::sync::watch;

/// Create a mailbox seeded with the "no attacks found" sentinel.
pub fn mailbox() -> (MailboxWriter, MailboxReader) {
    let (tx, rx) = watch::channel(EncodedAlert::no_attacks());
    (MailboxWriter { tx: Arc::new(tx) }, MailboxReader { rx })
}

/// Write half. Held by the covert sink on the capture side.
#[derive(Debug, Clone)]
pub struct MailboxWriter {
    tx: Arc<watch::Sender<EncodedAlert>>,
}

impl MailboxWriter {
    /// Replace the slot content. Works whether or not a reader is alive.
    pub fn post(&self, alert: EncodedAlert) {
        self.tx.send_replace(alert);
    }
}

/// What the reader found in the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub alert: EncodedAlert,
    /// False when nothing was posted since the previous read.
    pub fresh: bool,
}

/// Read half. Held by the relay.
#[derive(Debug)]
pub struct MailboxReader {
    rx: watch::Receiver<EncodedAlert>,
}

impl MailboxReader {
    /// Copy out the current content and mark it seen.
    pub fn read(&mut self) -> Snapshot {
        let fresh = self.rx.has_changed().unwrap_or(false);
        let alert = self.rx.borrow_and_update().clone();
        Snapshot { alert, fresh }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_sentinel() {
        let (_writer, mut reader) = mailbox();
        let snap = reader.read();
        assert_eq!(snap.alert, EncodedAlert::no_attacks());
        assert!(!snap.fresh);
    }

    #[test]
    fn last_write_wins() {
        let (writer, mut reader) = mailbox();
        writer.post(EncodedAlert::new("first"));
        writer.post(EncodedAlert::new("second"));
        let snap = reader.read();
        assert_eq!(snap.alert.as_str(), "second");
        assert!(snap.fresh);

        let again = reader.read();
        assert_eq!(again.alert.as_str(), "second");
        assert!(!again.fresh);
    }

    #[test]
    fn reader_outlives_writer() {
        let (writer, mut reader) = mailbox();
        writer.post(EncodedAlert::new("kept"));
        drop(writer);
        assert_eq!(reader.read().alert.as_str(), "kept");
    }

    #[test]
    fn concurrent_posts_are_never_torn() {
        let (writer, mut reader) = mailbox();
        let a = "a".repeat(64);
        let b = "b".repeat(48);

        let handle = {
            let (a, b) = (a.clone(), b.clone());
            std::thread::spawn(move || {
                for i in 0..10_000 {
                    let text = if i % 2 == 0 { &a } else { &b };
                    writer.post(EncodedAlert::new(text.clone()));
                }
            })
        };

        for _ in 0..10_000 {
            let seen = reader.read().alert;
            let ok = seen.as_str() == a || seen.as_str() == b || seen.is_sentinel();
            assert!(ok, "torn read: {seen}");
        }
        handle.join().unwrap();
    }
}
