//! Per-stage timing for the tick orchestrator.
//!
//! With the `profile` feature enabled, [`crate::api::SimWorld`] times each
//! of its stages every tick:
//! ```bash
//! cargo bench --features profile
//! ```
//!
//! The profiler can also be driven by hand around any closure.

use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};

/// Accumulated timings for named sections.
#[derive(Debug, Default)]
pub struct Profiler {
    sections: FxHashMap<&'static str, SectionStats>,
    tick_count: u64,
}

/// Statistics for a profiled section
#[derive(Debug, Default, Clone)]
pub struct SectionStats {
    pub total_time: Duration,
    pub call_count: u64,
    pub min_time: Option<Duration>,
    pub max_time: Option<Duration>,
}

impl SectionStats {
    pub fn avg_time(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.call_count as u32
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.total_time += elapsed;
        self.call_count += 1;
        self.min_time = Some(self.min_time.map_or(elapsed, |m| m.min(elapsed)));
        self.max_time = Some(self.max_time.map_or(elapsed, |m| m.max(elapsed)));
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time a section using a closure.
    pub fn time_section<F, R>(&mut self, name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.sections.entry(name).or_default().record(start.elapsed());
        result
    }

    /// Increment the tick counter.
    pub fn tick(&mut self) {
        self.tick_count += 1;
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn get_section(&self, name: &str) -> Option<&SectionStats> {
        self.sections.get(name)
    }

    /// Section names, slowest first.
    pub fn section_names(&self) -> Vec<&'static str> {
        let mut sections: Vec<_> = self.sections.iter().collect();
        sections.sort_by(|a, b| b.1.total_time.cmp(&a.1.total_time).then(a.0.cmp(b.0)));
        sections.into_iter().map(|(name, _)| *name).collect()
    }

    /// Log a summary of all sections at `info`.
    pub fn log_summary(&self) {
        let total: Duration = self.sections.values().map(|s| s.total_time).sum();
        log::info!("profiler summary over {} ticks", self.tick_count);

        for name in self.section_names() {
            let Some(stats) = self.sections.get(name) else {
                continue;
            };
            let avg_per_tick = if self.tick_count > 0 {
                stats.total_time / self.tick_count as u32
            } else {
                Duration::ZERO
            };
            let pct = if total.as_nanos() > 0 {
                (stats.total_time.as_nanos() as f64 / total.as_nanos() as f64) * 100.0
            } else {
                0.0
            };
            log::info!(
                "{:<12} total {:>10.2?}  avg/tick {:>10.2?}  min {:>10.2?}  max {:>10.2?}  {:>5.1}%",
                name,
                stats.total_time,
                avg_per_tick,
                stats.min_time.unwrap_or(Duration::ZERO),
                stats.max_time.unwrap_or(Duration::ZERO),
                pct
            );
        }
    }

    /// Reset all profiling data.
    pub fn reset(&mut self) {
        self.sections.clear();
        self.tick_count = 0;
    }
}
