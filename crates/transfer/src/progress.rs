use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

// ---------------------------------------------------------------------------
// ProgressThrottle
// ---------------------------------------------------------------------------

/// Decides when a progress report is due for one transfer.
///
/// At most one report per `interval`, except that reaching the total is
/// always reported, once.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit_at: Instant,
    last_reported: Option<u64>,
}

impl ProgressThrottle {
    /// Starts the first interval at `now`.
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_emit_at: now,
            last_reported: None,
        }
    }

    /// Returns `true` (and records the report) if `done` of `total` should be reported.
    pub fn should_emit(&mut self, done: u64, total: u64, now: Instant) -> bool {
        if done >= total {
            if self.last_reported == Some(done) {
                return false;
            }
        } else if now.duration_since(self.last_emit_at) < self.interval {
            return false;
        }
        self.last_emit_at = now;
        self.last_reported = Some(done);
        true
    }

    /// The value most recently reported, if any.
    pub fn last_reported(&self) -> Option<u64> {
        self.last_reported
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed using a sliding window of samples.
pub struct SpeedCalculator {
    samples: VecDeque<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            samples: VecDeque::new(),
            max_samples: max_samples.unwrap_or(100).max(2),
            window_size: window_size.unwrap_or(Duration::from_secs(5)),
        }
    }

    /// Records `bytes` transferred at `now`.
    pub fn add_sample(&mut self, bytes: u64, now: Instant) {
        self.samples.push_back(SpeedSample {
            bytes,
            timestamp: now,
        });

        while let Some(front) = self.samples.front() {
            if now.duration_since(front.timestamp) > self.window_size {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// Returns the average speed in bytes/second within the window.
    ///
    /// Returns 0.0 if fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        if self.samples.len() < 2 {
            return 0.0;
        }

        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        // The first sample marks the start of the window; its bytes were
        // transferred before it.
        let total_bytes: u64 = self.samples.iter().skip(1).map(|s| s.bytes).sum();
        total_bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Clears all recorded samples.
    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(500);

    #[test]
    fn throttle_suppresses_within_interval() {
        let start = Instant::now();
        let mut t = ProgressThrottle::new(INTERVAL, start);
        assert!(!t.should_emit(10, 100, start));
        assert!(!t.should_emit(20, 100, start + Duration::from_millis(499)));
        assert!(t.should_emit(30, 100, start + INTERVAL));
        assert!(!t.should_emit(40, 100, start + Duration::from_millis(900)));
        assert!(t.should_emit(50, 100, start + Duration::from_millis(1000)));
        assert_eq!(t.last_reported(), Some(50));
    }

    #[test]
    fn throttle_always_reports_completion_once() {
        let start = Instant::now();
        let mut t = ProgressThrottle::new(INTERVAL, start);
        assert!(t.should_emit(100, 100, start));
        assert!(!t.should_emit(100, 100, start + Duration::from_secs(5)));
    }

    #[test]
    fn throttle_reports_empty_file_completion() {
        let start = Instant::now();
        let mut t = ProgressThrottle::new(INTERVAL, start);
        assert!(t.should_emit(0, 0, start));
        assert!(!t.should_emit(0, 0, start));
    }

    #[test]
    fn speed_calculator_needs_two_samples() {
        let mut calc = SpeedCalculator::default();
        assert_eq!(calc.bytes_per_second(), 0.0);
        assert!(calc.eta(1000).is_none());
        calc.add_sample(100, Instant::now());
        assert_eq!(calc.bytes_per_second(), 0.0);
    }

    #[test]
    fn speed_calculator_rate_and_eta() {
        let start = Instant::now();
        let mut calc = SpeedCalculator::new(Some(Duration::from_secs(10)), None);
        calc.add_sample(0, start);
        calc.add_sample(500, start + Duration::from_millis(500));
        calc.add_sample(500, start + Duration::from_secs(1));

        assert_eq!(calc.bytes_per_second(), 1000.0);
        assert_eq!(calc.eta(2000), Some(Duration::from_secs(2)));
    }

    #[test]
    fn speed_calculator_drops_old_samples() {
        let start = Instant::now();
        let mut calc = SpeedCalculator::new(Some(Duration::from_secs(1)), None);
        calc.add_sample(1_000_000, start);
        calc.add_sample(10, start + Duration::from_secs(5));
        calc.add_sample(10, start + Duration::from_secs(6));
        assert_eq!(calc.bytes_per_second(), 10.0);
    }

    #[test]
    fn speed_calculator_max_samples() {
        let start = Instant::now();
        let mut calc = SpeedCalculator::new(Some(Duration::from_secs(60)), Some(5));
        for i in 0..20 {
            calc.add_sample(i * 10, start + Duration::from_millis(i));
        }
        assert!(calc.samples.len() <= 5);
    }

    #[test]
    fn speed_calculator_reset() {
        let start = Instant::now();
        let mut calc = SpeedCalculator::default();
        calc.add_sample(100, start);
        calc.add_sample(200, start + Duration::from_secs(1));
        calc.reset();
        assert_eq!(calc.bytes_per_second(), 0.0);
    }
}
