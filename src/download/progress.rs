//! Progress reporting shared by the download and upload phases.
//!
//! Backend workers and upload pollers produce `ProgressSnapshot`s and hand
//! them to a `ProgressSink`. The sink used in production is a channel into
//! the status message task, so a report never blocks the producer.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::core::utils::format_bytes;

/// Job phase a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Downloading,
    Uploading,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Downloading => "📥 Downloading",
            Phase::Uploading => "📤 Uploading",
        }
    }
}

/// Transient progress value; recomputed on every tick and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub bytes: u64,
    /// Expected total; `1` when unknown
    pub total: u64,
    pub phase: Phase,
}

impl ProgressSnapshot {
    /// Builds a snapshot, substituting the `1` placeholder for an unknown total.
    pub fn new(bytes: u64, total: Option<u64>, phase: Phase) -> Self {
        Self {
            bytes,
            total: total.filter(|t| *t > 0).unwrap_or(1),
            phase,
        }
    }

    pub fn total_known(&self) -> bool {
        self.total > 1
    }

    /// Percentage 0-100; `None` when the total is unknown.
    pub fn percent(&self) -> Option<u8> {
        if !self.total_known() {
            return None;
        }
        let pct = (self.bytes as f64 / self.total as f64 * 100.0).clamp(0.0, 100.0);
        Some(pct as u8)
    }

    /// Status line, e.g. "📥 Downloading: 45% (4.5 MB / 10.0 MB)"
    pub fn render(&self) -> String {
        match self.percent() {
            Some(pct) => format!(
                "{}: {}% ({} / {})",
                self.phase.label(),
                pct,
                format_bytes(self.bytes),
                format_bytes(self.total)
            ),
            None => format!("{}: {}", self.phase.label(), format_bytes(self.bytes)),
        }
    }
}

/// Receiver of progress snapshots.
///
/// Called at high frequency, possibly from a worker thread; implementations
/// must return immediately.
pub trait ProgressSink: Send + Sync {
    fn report(&self, snapshot: ProgressSnapshot);
}

/// Sink that forwards snapshots into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressSnapshot>,
}

impl ChannelSink {
    /// Creates a sink and the receiving end for the consumer task.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, snapshot: ProgressSnapshot) {
        // Receiver gone means the status task finished; progress is cosmetic
        let _ = self.tx.send(snapshot);
    }
}

/// Sink that drops everything, for callers that do not show progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _snapshot: ProgressSnapshot) {}
}

/// Filters a raw snapshot stream for display.
///
/// - drops snapshots whose byte count went backwards within a phase
///   (out-of-order delivery);
/// - throttles to at most one update per `min_interval`, except phase changes
///   and completion, which always pass.
#[derive(Debug)]
pub struct ProgressTracker {
    min_interval: Duration,
    last: Option<ProgressSnapshot>,
    last_emit: Option<Instant>,
}

impl ProgressTracker {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
            last_emit: None,
        }
    }

    /// Returns the snapshot to display, or `None` to skip this one.
    pub fn observe(&mut self, snapshot: ProgressSnapshot) -> Option<ProgressSnapshot> {
        self.observe_at(snapshot, Instant::now())
    }

    fn observe_at(&mut self, snapshot: ProgressSnapshot, now: Instant) -> Option<ProgressSnapshot> {
        let phase_changed = self.last.map(|l| l.phase != snapshot.phase).unwrap_or(true);
        if !phase_changed {
            if let Some(last) = self.last {
                if snapshot.bytes < last.bytes {
                    log::trace!("Dropping regressed progress {} < {}", snapshot.bytes, last.bytes);
                    return None;
                }
            }
        }
        self.last = Some(snapshot);

        let complete = snapshot.total_known() && snapshot.bytes >= snapshot.total;
        let due = self
            .last_emit
            .map(|t| now.duration_since(t) >= self.min_interval)
            .unwrap_or(true);

        if phase_changed || complete || due {
            self.last_emit = Some(now);
            Some(snapshot)
        } else {
            None
        }
    }
}
