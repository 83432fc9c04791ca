//! Per-transfer state: timing, byte counts, progress display and abort.
//!
//! Each upload or download owns one [`TransferSession`]; nothing is shared
//! between operations except what is passed in explicitly.

use std::future::Future;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// Counts received bytes and reports integer percentages as they change.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    received: u64,
    total: Option<u64>,
    last_percent: Option<u8>,
}

impl ProgressTracker {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            received: 0,
            total: total.filter(|t| *t > 0),
            last_percent: None,
        }
    }

    /// Record `n` more bytes. Returns the new percentage only when the total
    /// is known and the integer percentage moved.
    pub fn advance(&mut self, n: u64) -> Option<u8> {
        self.received += n;
        let percent = self.percent()?;
        if self.last_percent == Some(percent) {
            return None;
        }
        self.last_percent = Some(percent);
        Some(percent)
    }

    pub fn percent(&self) -> Option<u8> {
        let total = self.total?;
        let pct = (self.received.min(total) * 100) / total;
        Some(pct as u8)
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }
}

pub struct TransferSession {
    label: &'static str,
    started: Instant,
    tracker: ProgressTracker,
    bar: ProgressBar,
}

impl TransferSession {
    /// Session that draws progress on stderr.
    pub fn new(label: &'static str) -> Self {
        Self::with_bar(label, ProgressBar::new_spinner())
    }

    /// Session with no visible output, for scripted use and tests.
    pub fn hidden(label: &'static str) -> Self {
        Self::with_bar(label, ProgressBar::hidden())
    }

    fn with_bar(label: &'static str, bar: ProgressBar) -> Self {
        bar.set_prefix(label);
        Self {
            label,
            started: Instant::now(),
            tracker: ProgressTracker::default(),
            bar,
        }
    }

    /// Start (or restart) a transfer of `total` bytes, if known.
    pub fn begin(&mut self, total: Option<u64>) {
        self.started = Instant::now();
        self.tracker = ProgressTracker::new(total);
        match self.tracker.total() {
            Some(len) => {
                self.bar.set_length(len);
                if let Ok(style) = ProgressStyle::with_template(
                    "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {percent}%",
                ) {
                    self.bar.set_style(style.progress_chars("=>-"));
                }
            }
            None => {
                if let Ok(style) = ProgressStyle::with_template("{prefix:.bold} {spinner} {bytes}")
                {
                    self.bar.set_style(style);
                }
                self.bar.enable_steady_tick(Duration::from_millis(100));
            }
        }
        self.bar.set_position(0);
    }

    /// Record received bytes; returns a percentage when it changes.
    pub fn record(&mut self, n: u64) -> Option<u8> {
        self.bar.inc(n);
        let percent = self.tracker.advance(n);
        if let Some(p) = percent {
            tracing::trace!(label = self.label, percent = p, "transfer progress");
        }
        percent
    }

    pub fn received(&self) -> u64 {
        self.tracker.received()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn finish(&self, message: impl Into<std::borrow::Cow<'static, str>>) {
        self.bar.finish_with_message(message);
        tracing::debug!(
            label = self.label,
            bytes = self.tracker.received(),
            elapsed_ms = self.elapsed().as_millis() as u64,
            "transfer finished"
        );
    }

    /// Back to the ready state after an abort or failure.
    pub fn reset(&mut self) {
        self.bar.finish_and_clear();
        self.tracker = ProgressTracker::default();
        self.started = Instant::now();
    }
}

#[derive(Debug, thiserror::Error)]
#[error("transfer aborted")]
pub struct Aborted;

/// Race a transfer against an abort signal. The transfer future is dropped,
/// and with it the underlying connection, as soon as `abort` fires.
pub async fn abortable<F, A>(transfer: F, abort: A) -> Result<F::Output, Aborted>
where
    F: Future,
    A: Future,
{
    tokio::select! {
        out = transfer => Ok(out),
        _ = abort => Err(Aborted),
    }
}
