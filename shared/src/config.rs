use crate::orientation::{Orientation, TilePos};
use crate::DEFAULT_MAX_SPEED;
use serde::{Deserialize, Serialize};

/// Static description of a mover, sent to clients when it spawns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoverConfig {
    pub max_speed: f32,
    /// Speed used when the server starts movement on its own (autopilot,
    /// move-for) while stationary.
    pub cruise_speed: f32,
    /// Facing as laid out in the map; sensor offsets are relative to it.
    pub initial_facing: Orientation,
    /// Stop before entering a tile a sensor reports as impassable.
    pub safety_protocols_on: bool,
    pub requires_fuel: bool,
    /// Footprint tiles probed before each step, relative to the pivot.
    pub sensors: Vec<TilePos>,
    /// Footprint tiles probed before a rotation, relative to the pivot.
    pub rotation_sensors: Vec<TilePos>,
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED,
            cruise_speed: 5.0,
            initial_facing: Orientation::Up,
            safety_protocols_on: true,
            requires_fuel: false,
            sensors: vec![TilePos::ZERO],
            rotation_sensors: vec![TilePos::ZERO],
        }
    }
}

impl MoverConfig {
    /// Rectangular footprint of `width` x `length` tiles with the pivot on
    /// the rear centre. Outer tiles act as sensors for both checks.
    pub fn with_hull(mut self, width: i32, length: i32) -> Self {
        let half = width.max(1) / 2;
        let mut tiles = Vec::new();
        for x in -half..=half {
            for y in 0..length.max(1) {
                tiles.push(TilePos::new(x, y));
            }
        }
        self.sensors = tiles.clone();
        self.rotation_sensors = tiles;
        self
    }

    pub fn clamp_speed(&self, speed: f32) -> f32 {
        if speed.is_nan() {
            return 0.0;
        }
        speed.clamp(0.0, self.max_speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_speed() {
        let config = MoverConfig::default();
        assert_eq!(config.clamp_speed(9999.0), DEFAULT_MAX_SPEED);
        assert_eq!(config.clamp_speed(-3.0), 0.0);
        assert_eq!(config.clamp_speed(f32::NAN), 0.0);
        assert_eq!(config.clamp_speed(7.5), 7.5);
    }

    #[test]
    fn test_hull_footprint() {
        let config = MoverConfig::default().with_hull(3, 2);
        assert_eq!(config.sensors.len(), 6);
        assert!(config.sensors.contains(&TilePos::new(-1, 1)));
        assert_eq!(config.sensors, config.rotation_sensors);
    }
}
