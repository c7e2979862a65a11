//! Client estimate of the server's network clock.

use shared::NetworkClock;
use std::time::Instant;

/// Local monotonic time shifted by a smoothed offset to the server clock.
///
/// Every pong yields one sample: the server stamped its time roughly half a
/// round trip before the pong arrived.
#[derive(Debug, Clone)]
pub struct SyncedClock {
    start: Instant,
    offset: Option<f64>,
    rtt: f64,
}

impl SyncedClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: None,
            rtt: 0.0,
        }
    }

    /// Seconds since this clock was created.
    pub fn local_now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn is_synced(&self) -> bool {
        self.offset.is_some()
    }

    pub fn offset(&self) -> f64 {
        self.offset.unwrap_or(0.0)
    }

    pub fn on_pong(&mut self, client_time: f64, server_time: f64) {
        let local = self.local_now();
        self.on_pong_at(local, client_time, server_time);
    }

    /// Folds in a sample received at local time `received_at`.
    pub fn on_pong_at(&mut self, received_at: f64, client_time: f64, server_time: f64) {
        let rtt_sample = (received_at - client_time).max(0.0);
        let offset_sample = server_time + rtt_sample / 2.0 - received_at;

        match self.offset {
            Some(offset) => {
                self.offset = Some(offset * 0.9 + offset_sample * 0.1);
                self.rtt = self.rtt * 0.9 + rtt_sample * 0.1;
            }
            None => {
                self.offset = Some(offset_sample);
                self.rtt = rtt_sample;
            }
        }
    }
}

impl Default for SyncedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkClock for SyncedClock {
    fn now(&self) -> f64 {
        self.local_now() + self.offset()
    }

    fn rtt(&self) -> f64 {
        self.rtt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_first_sample_sets_offset() {
        let mut clock = SyncedClock::new();
        assert!(!clock.is_synced());

        // sent at 1.0, server stamped 100.0, back at 1.2
        clock.on_pong_at(1.2, 1.0, 100.0);
        assert!(clock.is_synced());
        assert_approx_eq!(clock.rtt(), 0.2);
        assert_approx_eq!(clock.offset(), 98.9);
    }

    #[test]
    fn test_later_samples_are_smoothed() {
        let mut clock = SyncedClock::new();
        clock.on_pong_at(1.2, 1.0, 100.0);
        clock.on_pong_at(2.4, 2.0, 101.0);

        // second sample: rtt 0.4, offset 98.8
        assert_approx_eq!(clock.rtt(), 0.22);
        assert_approx_eq!(clock.offset(), 98.89);
    }

    #[test]
    fn test_now_reads_server_time() {
        let mut clock = SyncedClock::new();
        let local = clock.local_now();
        clock.on_pong_at(local, local, local + 50.0);
        assert!(clock.now() >= local + 50.0 - 1e-9);
    }
}
