//! Replay capture source.
//!
//! Stands in for the radio driver's promiscuous callback on a host build.
//! Frames come from a text file, one per line:
//!
//! ```text
//! # kind [len=declared_len] hex-bytes
//! mgmt c0003a01ffffffffffff112233445566112233445566000007 00
//! mgmt len=12 c0003a01ffffffffffff1122
//! data 08420000...
//! ```
//!
//! Whitespace inside the hex run is ignored. The optional declared length
//! is passed through untouched so short-declared frames can be replayed.
//! Each frame is handed to the detector from a dedicated OS thread, which
//! plays the role of the driver's capture context.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use sentinel_core::{PacketKind, RawFrame};
use sentinel_services::DeauthDetector;

/// One line of a capture file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub kind: PacketKind,
    pub declared_len: usize,
    pub bytes: Vec<u8>,
}

impl CapturedFrame {
    pub fn view(&self) -> RawFrame<'_> {
        RawFrame::new(&self.bytes, self.declared_len, self.kind)
    }
}

/// Parse one capture line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Option<Result<CapturedFrame>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(parse_frame(line))
}

fn parse_frame(line: &str) -> Result<CapturedFrame> {
    let mut tokens = line.split_whitespace();
    let kind: PacketKind = tokens
        .next()
        .context("missing packet kind")?
        .parse()
        .context("bad packet kind")?;

    let rest: Vec<&str> = tokens.collect();
    let (declared, hex_parts) = match rest.split_first() {
        Some((first, tail)) if first.starts_with("len=") => {
            let len = first["len=".len()..]
                .parse::<usize>()
                .context("bad declared length")?;
            (Some(len), tail)
        }
        _ => (None, rest.as_slice()),
    };

    let bytes = hex::decode(hex_parts.concat()).context("bad frame hex")?;
    Ok(CapturedFrame {
        kind,
        declared_len: declared.unwrap_or(bytes.len()),
        bytes,
    })
}

/// Read every frame in a capture file. Bad lines are logged and skipped.
pub fn load(path: &Path) -> Result<Vec<CapturedFrame>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read capture file {}", path.display()))?;

    let mut frames = Vec::new();
    for (number, line) in text.lines().enumerate() {
        match parse_line(line) {
            Some(Ok(frame)) => frames.push(frame),
            Some(Err(e)) => {
                tracing::warn!(line = number + 1, error = %e, "skipping capture line")
            }
            None => {}
        }
    }
    Ok(frames)
}

/// Replay a capture file into the detector on its own thread.
pub fn spawn_replay(
    path: PathBuf,
    frame_interval: Duration,
    detector: Arc<DeauthDetector>,
) -> Result<JoinHandle<Result<()>>> {
    std::thread::Builder::new()
        .name("capture".into())
        .spawn(move || {
            let frames = load(&path)?;
            tracing::info!(path = %path.display(), frames = frames.len(), "replaying capture");

            for frame in &frames {
                detector.on_frame(frame.view());
                if !frame_interval.is_zero() {
                    std::thread::sleep(frame_interval);
                }
            }

            let stats = detector.stats();
            tracing::info!(
                frames_seen = stats.frames_seen,
                alerts_raised = stats.alerts_raised,
                "capture replay finished"
            );
            Ok(())
        })
        .context("failed to spawn capture thread")
}
