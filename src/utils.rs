use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Stopwatch for one stage of a perception cycle
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Microseconds since `start`
    pub fn elapsed_us(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1_000_000.0
    }
}

/// Timing measurements for a single ACTIVE iteration
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleTiming {
    /// Both grabs (anchor box and play area)
    pub capture_us: f64,
    /// Round-end template check
    pub match_us: f64,
    /// HSV conversion, segmentation and centroids for every category
    pub segment_us: f64,
    pub click_us: f64,
    pub total_us: f64,
}

/// Cycle timings kept for the latency report; older samples are dropped
pub const MAX_TIMING_SAMPLES: usize = 2048;

/// Latency summary for one stage: (mean, p50, p95) in microseconds
pub type StageSummary = (f64, f64, f64);

/// Counters and latency samples for one run of the game loop
///
/// Counters cover the whole run; latency percentiles cover the most recent
/// `MAX_TIMING_SAMPLES` cycles.
#[derive(Debug, Default)]
pub struct SessionStats {
    pub rounds: u64,
    pub cycles: u64,
    pub capture_misses: u64,
    pub clicks: u64,
    timings: VecDeque<CycleTiming>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed perception cycle
    pub fn add_cycle(&mut self, timing: CycleTiming) {
        self.cycles += 1;
        if self.timings.len() == MAX_TIMING_SAMPLES {
            self.timings.pop_front();
        }
        self.timings.push_back(timing);
    }

    /// Retained samples, oldest first
    pub fn timings(&self) -> &VecDeque<CycleTiming> {
        &self.timings
    }

    /// Calculate percentile from sorted data
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx]
    }

    /// Mean, p50 and p95 for the stage picked by `extract`
    pub fn stage_summary(&self, extract: impl Fn(&CycleTiming) -> f64) -> StageSummary {
        if self.timings.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        let mut values: Vec<f64> = self.timings.iter().map(&extract).collect();
        values.sort_by(f64::total_cmp);

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let p50 = Self::percentile(&values, 50.0);
        let p95 = Self::percentile(&values, 95.0);

        (mean, p50, p95)
    }

    /// Log the session summary
    pub fn report(&self, elapsed: Duration) {
        tracing::info!(
            "Session: {} rounds, {} cycles, {} clicks, {} capture misses in {:.1}s",
            self.rounds,
            self.cycles,
            self.clicks,
            self.capture_misses,
            elapsed.as_secs_f64()
        );

        if self.timings.is_empty() {
            tracing::info!("No cycle timing data collected");
            return;
        }
        tracing::info!("Cycle latency over the last {} cycles:", self.timings.len());

        let stages: [(&str, StageSummary); 5] = [
            ("capture", self.stage_summary(|t| t.capture_us)),
            ("match", self.stage_summary(|t| t.match_us)),
            ("segment", self.stage_summary(|t| t.segment_us)),
            ("click", self.stage_summary(|t| t.click_us)),
            ("total", self.stage_summary(|t| t.total_us)),
        ];
        for (name, (mean, p50, p95)) in stages {
            tracing::info!(
                "  {:<8} mean {:>8.0} µs  p50 {:>8.0} µs  p95 {:>8.0} µs",
                name,
                mean,
                p50,
                p95
            );
        }

        if let Some((name, (_, _, p95))) = stages[..4]
            .iter()
            .max_by(|a, b| (a.1).2.total_cmp(&(b.1).2))
        {
            tracing::info!("Slowest stage: {} ({:.0} µs p95)", name, p95);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timer_measures_elapsed() {
        let timer = Timer::start();
        thread::sleep(Duration::from_millis(5));
        assert!(timer.elapsed_us() >= 5000.0);
    }

    #[test]
    fn test_timing_samples_are_bounded() {
        let mut stats = SessionStats::new();
        for i in 0..MAX_TIMING_SAMPLES + 500 {
            stats.add_cycle(CycleTiming {
                total_us: i as f64,
                ..Default::default()
            });
        }

        assert_eq!(stats.cycles, (MAX_TIMING_SAMPLES + 500) as u64);
        assert_eq!(stats.timings().len(), MAX_TIMING_SAMPLES);
        // Oldest samples went first
        assert_eq!(stats.timings().front().map(|t| t.total_us), Some(500.0));
    }

    #[test]
    fn test_session_stats_empty() {
        let stats = SessionStats::new();
        assert_eq!(stats.cycles, 0);
        assert!(stats.timings().is_empty());
        assert_eq!(stats.stage_summary(|t| t.total_us), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_add_cycle_counts() {
        let mut stats = SessionStats::new();
        stats.add_cycle(CycleTiming::default());
        stats.add_cycle(CycleTiming::default());
        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.timings().len(), 2);
    }

    #[test]
    fn test_stage_summary_percentiles() {
        let mut stats = SessionStats::new();
        for i in 1..=100 {
            stats.add_cycle(CycleTiming {
                total_us: i as f64,
                ..Default::default()
            });
        }

        let (mean, p50, p95) = stats.stage_summary(|t| t.total_us);
        assert_eq!(mean, 50.5);
        // round(0.5 * 99) = 50 -> value 51
        assert_eq!(p50, 51.0);
        // round(0.95 * 99) = 94 -> value 95
        assert_eq!(p95, 95.0);
    }
}
