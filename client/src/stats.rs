//! Link statistics for the connection to the server.

use crate::view::ViewStats;
use std::collections::VecDeque;

/// Rolling round-trip samples plus totals of the corrections the views made.
#[derive(Debug, Clone)]
pub struct LinkStats {
    rtt_samples: VecDeque<f64>,
    max_samples: usize,
    pub packets_received: u64,
    pub packets_sent: u64,
    pub packets_dropped: u64,
}

impl LinkStats {
    pub fn new() -> Self {
        Self {
            rtt_samples: VecDeque::new(),
            // last 100 pings
            max_samples: 100,
            packets_received: 0,
            packets_sent: 0,
            packets_dropped: 0,
        }
    }

    pub fn record_rtt(&mut self, rtt: f64) {
        self.rtt_samples.push_back(rtt);
        while self.rtt_samples.len() > self.max_samples {
            self.rtt_samples.pop_front();
        }
    }

    pub fn sample_count(&self) -> usize {
        self.rtt_samples.len()
    }

    pub fn average_rtt_ms(&self) -> Option<f64> {
        if self.rtt_samples.is_empty() {
            return None;
        }
        let total: f64 = self.rtt_samples.iter().sum();
        Some(total / self.rtt_samples.len() as f64 * 1000.0)
    }

    pub fn max_rtt_ms(&self) -> Option<f64> {
        self.rtt_samples
            .iter()
            .copied()
            .reduce(f64::max)
            .map(|rtt| rtt * 1000.0)
    }

    /// Mean absolute deviation of the round trip, in milliseconds.
    pub fn jitter_ms(&self) -> Option<f64> {
        let average = self.average_rtt_ms()? / 1000.0;
        let deviation: f64 = self
            .rtt_samples
            .iter()
            .map(|rtt| (rtt - average).abs())
            .sum();
        Some(deviation / self.rtt_samples.len() as f64 * 1000.0)
    }

    /// One-line summary for the periodic log.
    pub fn summary(&self, views: impl IntoIterator<Item = ViewStats>) -> String {
        let totals = views
            .into_iter()
            .fold(ViewStats::default(), |total, view| ViewStats {
                applied: total.applied + view.applied,
                duplicates: total.duplicates + view.duplicates,
                stale: total.stale + view.stale,
                lag_adjustments: total.lag_adjustments + view.lag_adjustments,
                rest_snaps: total.rest_snaps + view.rest_snaps,
            });

        let rtt = match (self.average_rtt_ms(), self.jitter_ms()) {
            (Some(average), Some(jitter)) => format!("{:.1}ms (±{:.1})", average, jitter),
            _ => "n/a".to_string(),
        };

        format!(
            "rtt {} | sent {} recv {} lost {} | applied {} dup {} stale {} lag-adj {} snaps {}",
            rtt,
            self.packets_sent,
            self.packets_received,
            self.packets_dropped,
            totals.applied,
            totals.duplicates,
            totals.stale,
            totals.lag_adjustments,
            totals.rest_snaps
        )
    }
}

impl Default for LinkStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_empty_stats() {
        let stats = LinkStats::new();
        assert_eq!(stats.average_rtt_ms(), None);
        assert_eq!(stats.jitter_ms(), None);
        assert!(stats.summary(Vec::new()).starts_with("rtt n/a"));
    }

    #[test]
    fn test_rtt_window() {
        let mut stats = LinkStats::new();
        for _ in 0..150 {
            stats.record_rtt(0.05);
        }
        stats.record_rtt(0.15);

        assert_eq!(stats.sample_count(), 100);
        assert_approx_eq!(stats.max_rtt_ms().unwrap(), 150.0);
        assert_approx_eq!(stats.average_rtt_ms().unwrap(), 51.0);
    }

    #[test]
    fn test_summary_totals_views() {
        let mut stats = LinkStats::new();
        stats.record_rtt(0.02);
        let view = ViewStats {
            applied: 3,
            duplicates: 2,
            stale: 1,
            lag_adjustments: 4,
            rest_snaps: 0,
        };

        let summary = stats.summary([view, view]);
        assert!(summary.contains("applied 6"));
        assert!(summary.contains("dup 4"));
        assert!(summary.contains("lag-adj 8"));
    }
}
