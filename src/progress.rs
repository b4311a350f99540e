//! Progress reporting for the driving role.
//!
//! Refreshed at most once per second of wall time, and always after the final
//! block.

use crate::session::BlockCounts;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Decides when a progress line is due.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    last: Instant,
}

impl Throttle {
    pub fn new(start: Instant) -> Self {
        Self { last: start }
    }

    /// True if a report is due at `now`. Marks the report as emitted.
    pub fn check(&mut self, now: Instant, done: u64, total: u64) -> bool {
        if now.duration_since(self.last) >= REPORT_INTERVAL || done >= total {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// Throughput in MB/s for `bytes` processed over `elapsed`.
pub fn rate_mb_per_sec(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 / (1024.0 * 1024.0) / secs
}

pub struct ProgressReporter {
    bar: ProgressBar,
    start: Instant,
    throttle: Throttle,
    total_blocks: u64,
}

impl ProgressReporter {
    pub fn new(total_blocks: u64, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::with_draw_target(Some(total_blocks), ProgressDrawTarget::stderr())
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] [{bar:30}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let start = Instant::now();
        Self {
            bar,
            start,
            throttle: Throttle::new(start),
            total_blocks,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record progress after a block; redraws only when the throttle allows.
    pub fn update(&mut self, counts: BlockCounts, bytes_processed: u64) {
        let now = Instant::now();
        let done = counts.total();
        if !self.throttle.check(now, done, self.total_blocks) {
            return;
        }

        let rate = rate_mb_per_sec(bytes_processed, now.duration_since(self.start));
        self.bar.set_position(done);
        self.bar.set_message(format!(
            "same: {}, diff: {}, {}/{}, {:5.1} MB/s",
            counts.same, counts.diff, done, self.total_blocks, rate
        ));
    }

    pub fn finish(&self) {
        self.bar.finish();
    }
}
