//! Wall-clock timing for execution strategies.

use std::time::{Duration, Instant};

use serde::Serialize;

/// A value together with the time it took to produce.
#[derive(Debug)]
pub struct Timed<T> {
    pub label: &'static str,
    pub value: T,
    pub elapsed: Duration,
}

impl<T> Timed<T> {
    pub fn millis(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    /// Splits off the value after recording the timing in `report`.
    pub fn record(self, report: &mut TimingReport) -> T {
        report.push(self.label, self.elapsed);
        self.value
    }
}

/// Runs `f` under a monotonic clock.
///
/// When `f` returns a `Result` the elapsed time is still available on the
/// error path, which is what lets a failed strategy show up in the report.
pub fn measure<T>(label: &'static str, f: impl FnOnce() -> T) -> Timed<T> {
    let start = Instant::now();
    let value = f();
    let elapsed = start.elapsed();
    tracing::info!(label, elapsed_ms = elapsed.as_millis() as u64, "strategy finished");
    Timed {
        label,
        value,
        elapsed,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingEntry {
    pub label: &'static str,
    pub elapsed_ms: u64,
}

/// Ordered timings for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimingReport {
    entries: Vec<TimingEntry>,
}

impl TimingReport {
    pub fn push(&mut self, label: &'static str, elapsed: Duration) {
        self.entries.push(TimingEntry {
            label,
            elapsed_ms: elapsed.as_millis() as u64,
        });
    }

    pub fn entries(&self) -> &[TimingEntry] {
        &self.entries
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.elapsed_ms)
    }
}
