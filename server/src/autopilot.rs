//! Straight-line autopilot steering policy.

use shared::{Orientation, TilePos, AUTOPILOT_PERIOD};

/// Decision taken by one autopilot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Course {
    Arrived,
    Steer(Orientation),
    /// Already flying along a useful axis.
    Hold,
}

/// Periodic task re-armed by the server tick until the target is reached or
/// the autopilot is disabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Autopilot {
    pub target: TilePos,
    pub accuracy: f32,
    next_run_at: f64,
}

impl Autopilot {
    /// Armed to run on the next tick.
    pub fn new(target: TilePos, accuracy: f32, now: f64) -> Self {
        Self {
            target,
            accuracy,
            next_run_at: now,
        }
    }

    pub fn is_due(&self, now: f64) -> bool {
        now >= self.next_run_at
    }

    pub fn rearm(&mut self, now: f64) {
        self.next_run_at = now + AUTOPILOT_PERIOD;
    }

    /// Runs again on the next tick, e.g. after reaching a new tile.
    pub fn expedite(&mut self) {
        self.next_run_at = f64::NEG_INFINITY;
    }

    pub fn next_run_at(&self) -> f64 {
        self.next_run_at
    }

    pub fn plan(&self, position: TilePos, flying: Orientation) -> Course {
        let delta = self.target - position;
        let distance = ((delta.x * delta.x + delta.y * delta.y) as f32).sqrt();
        if distance <= self.accuracy {
            return Course::Arrived;
        }

        let x_desired = if delta.x > 0 {
            Orientation::Right
        } else {
            Orientation::Left
        };
        let y_desired = if delta.y > 0 {
            Orientation::Up
        } else {
            Orientation::Down
        };

        let x_rotations = if delta.x.abs() as f32 > self.accuracy {
            flying.rotations_to(x_desired)
        } else {
            u8::MAX
        };
        let y_rotations = if delta.y.abs() as f32 > self.accuracy {
            flying.rotations_to(y_desired)
        } else {
            u8::MAX
        };

        if x_rotations == 0 || y_rotations == 0 {
            return Course::Hold;
        }

        // fewer quarter turns first; ties go to the y axis
        if x_rotations < y_rotations {
            Course::Steer(x_desired)
        } else {
            Course::Steer(y_desired)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrived_within_accuracy() {
        let autopilot = Autopilot::new(TilePos::new(5, 5), 1.0, 0.0);
        assert_eq!(
            autopilot.plan(TilePos::new(5, 4), Orientation::Up),
            Course::Arrived
        );
        assert_ne!(
            autopilot.plan(TilePos::new(3, 5), Orientation::Up),
            Course::Arrived
        );
    }

    #[test]
    fn test_hold_when_already_aligned() {
        let autopilot = Autopilot::new(TilePos::new(10, 3), 1.0, 0.0);
        assert_eq!(
            autopilot.plan(TilePos::ZERO, Orientation::Right),
            Course::Hold
        );
        assert_eq!(autopilot.plan(TilePos::ZERO, Orientation::Up), Course::Hold);
    }

    #[test]
    fn test_steers_with_fewest_turns() {
        let autopilot = Autopilot::new(TilePos::new(10, -10), 1.0, 0.0);
        // flying left: down is one turn, right is two
        assert_eq!(
            autopilot.plan(TilePos::ZERO, Orientation::Left),
            Course::Steer(Orientation::Down)
        );
        // flying up: right is one turn, down is two
        assert_eq!(
            autopilot.plan(TilePos::ZERO, Orientation::Up),
            Course::Steer(Orientation::Right)
        );
    }

    #[test]
    fn test_only_axis_needing_change_is_used() {
        let autopilot = Autopilot::new(TilePos::new(0, -8), 1.0, 0.0);
        assert_eq!(
            autopilot.plan(TilePos::ZERO, Orientation::Up),
            Course::Steer(Orientation::Down)
        );
    }

    #[test]
    fn test_rearm_schedules_next_period() {
        let mut autopilot = Autopilot::new(TilePos::ZERO, 1.0, 3.0);
        assert!(autopilot.is_due(3.0));
        autopilot.rearm(3.0);
        assert!(!autopilot.is_due(3.5));
        assert!(autopilot.is_due(3.0 + AUTOPILOT_PERIOD));

        autopilot.rearm(10.0);
        autopilot.expedite();
        assert!(autopilot.is_due(10.0));
    }
}
