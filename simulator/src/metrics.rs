//! Simulation metrics.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

use crate::controller::{WorkOutcome, WorkStatus};

/// Simulation metrics.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationMetrics {
    /// Units of work run.
    pub units_of_work: u64,
    /// Units of work that settled.
    pub committed: u64,
    /// Units of work aborted by a ledger error.
    pub aborted: u64,
    /// Operations applied successfully.
    pub operations_applied: u64,
    /// Operations rejected as the scenario expected.
    pub expected_failures: u64,
    /// Payments handed to the recipient.
    pub payments_settled: u64,
    /// Units of work whose journal did not match the ledger.
    pub unreconciled: u64,
    /// Duration samples (µs).
    #[serde(skip)]
    duration_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    #[serde(skip)]
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            units_of_work: 0,
            committed: 0,
            aborted: 0,
            operations_applied: 0,
            expected_failures: 0,
            payments_settled: 0,
            unreconciled: 0,
            duration_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a finished unit of work.
    pub fn record(&mut self, outcome: &WorkOutcome, elapsed: Duration) {
        self.units_of_work += 1;
        self.operations_applied += outcome.operations as u64;
        self.expected_failures += outcome.expected_failures as u64;

        match outcome.status {
            WorkStatus::Committed => {
                self.committed += 1;
                self.payments_settled += outcome.settled.len() as u64;
            }
            WorkStatus::Aborted => self.aborted += 1,
        }

        if !outcome.reconciled {
            self.unreconciled += 1;
        }

        if self.duration_samples.len() >= self.max_samples {
            self.duration_samples.pop_front();
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.duration_samples.push_back(micros);
    }

    /// Get average unit-of-work duration in µs.
    pub fn average_duration_us(&self) -> u64 {
        if self.duration_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.duration_samples.iter().sum();
        sum / self.duration_samples.len() as u64
    }

    /// Get p99 duration in µs.
    pub fn p99_duration_us(&self) -> u64 {
        self.percentile_duration(99)
    }

    fn percentile_duration(&self, percentile: usize) -> u64 {
        if self.duration_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.duration_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Share of units of work that committed.
    pub fn commit_rate(&self) -> f64 {
        if self.units_of_work == 0 {
            return 0.0;
        }

        self.committed as f64 / self.units_of_work as f64
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}
