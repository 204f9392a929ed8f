// Timeout statistics

use serde::Serialize;
use std::time::Duration;

/// How a tracked operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

/// Point-in-time view of the manager's counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeoutStatistics {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub active: usize,
    /// Mean duration of finished operations (seconds)
    pub average_duration_secs: f64,
    /// timed_out / finished, 0.0 when nothing finished yet
    pub timeout_rate: f64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsAccumulator {
    started: u64,
    completed: u64,
    failed: u64,
    timed_out: u64,
    cancelled: u64,
    total_duration: Duration,
}

impl StatsAccumulator {
    pub(crate) fn record_start(&mut self) {
        self.started += 1;
    }

    pub(crate) fn record(&mut self, outcome: Outcome, elapsed: Duration) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::TimedOut => self.timed_out += 1,
            Outcome::Cancelled => self.cancelled += 1,
        }
        self.total_duration += elapsed;
    }

    fn finished(&self) -> u64 {
        self.completed + self.failed + self.timed_out + self.cancelled
    }

    pub(crate) fn snapshot(&self, active: usize) -> TimeoutStatistics {
        let finished = self.finished();
        let (average_duration_secs, timeout_rate) = if finished == 0 {
            (0.0, 0.0)
        } else {
            (
                self.total_duration.as_secs_f64() / finished as f64,
                self.timed_out as f64 / finished as f64,
            )
        };

        TimeoutStatistics {
            started: self.started,
            completed: self.completed,
            failed: self.failed,
            timed_out: self.timed_out,
            cancelled: self.cancelled,
            active,
            average_duration_secs,
            timeout_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let stats = StatsAccumulator::default().snapshot(0);
        assert_eq!(stats, TimeoutStatistics::default());
    }

    #[test]
    fn test_rates_and_average() {
        let mut acc = StatsAccumulator::default();
        for _ in 0..4 {
            acc.record_start();
        }
        acc.record(Outcome::Completed, Duration::from_secs(1));
        acc.record(Outcome::Completed, Duration::from_secs(3));
        acc.record(Outcome::TimedOut, Duration::from_secs(2));
        acc.record(Outcome::Cancelled, Duration::from_secs(2));

        let stats = acc.snapshot(0);
        assert_eq!(stats.started, 4);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.cancelled, 1);
        assert!((stats.average_duration_secs - 2.0).abs() < f64::EPSILON);
        assert!((stats.timeout_rate - 0.25).abs() < f64::EPSILON);
    }
}
