//! Grid coordinates, continuous positions and the four cardinal orientations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Integer tile coordinate. Positive x is right, positive y is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const ZERO: TilePos = TilePos { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring tile one step in `direction`.
    pub fn step(self, direction: Orientation) -> TilePos {
        self + direction.vector()
    }

    pub fn dot(self, other: TilePos) -> i32 {
        self.x * other.x + self.y * other.y
    }

    pub fn manhattan(self, other: TilePos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// True for the four orthogonal unit vectors.
    pub fn is_unit(self) -> bool {
        self.x.abs() + self.y.abs() == 1
    }

    pub fn to_vector(self) -> Vector2 {
        Vector2 {
            x: self.x as f32,
            y: self.y as f32,
        }
    }
}

impl Add for TilePos {
    type Output = TilePos;

    fn add(self, rhs: TilePos) -> TilePos {
        TilePos::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for TilePos {
    type Output = TilePos;

    fn sub(self, rhs: TilePos) -> TilePos {
        TilePos::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for TilePos {
    type Output = TilePos;

    fn neg(self) -> TilePos {
        TilePos::new(-self.x, -self.y)
    }
}

impl Mul<i32> for TilePos {
    type Output = TilePos;

    fn mul(self, rhs: i32) -> TilePos {
        TilePos::new(self.x * rhs, self.y * rhs)
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Represents a continuous position in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    /// Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    /// Value along the y-axis.
    /// Positive direction is up.
    pub y: f32,
}

impl Vector2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    /// Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Returns the difference of two vectors.
    pub fn sub(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    pub fn dot(&self, other: &Vector2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Linear interpolation towards `to`; `t` is clamped to [0, 1].
    pub fn lerp(&self, to: &Vector2, t: f32) -> Vector2 {
        let t = t.clamp(0.0, 1.0);
        self.add(&to.sub(self).scale(t))
    }

    /// Nearest tile.
    pub fn round_to_tile(&self) -> TilePos {
        TilePos::new(self.x.round() as i32, self.y.round() as i32)
    }
}

/// One of the four cardinal directions, listed clockwise from `Up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Up,
    Right,
    Down,
    Left,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Up,
        Orientation::Right,
        Orientation::Down,
        Orientation::Left,
    ];

    fn index(self) -> i32 {
        match self {
            Orientation::Up => 0,
            Orientation::Right => 1,
            Orientation::Down => 2,
            Orientation::Left => 3,
        }
    }

    fn from_index(index: i32) -> Orientation {
        Self::ALL[index.rem_euclid(4) as usize]
    }

    /// Rotates by `steps` quarter turns; positive is clockwise.
    pub fn rotate(self, steps: i32) -> Orientation {
        Self::from_index(self.index() + steps)
    }

    pub fn opposite(self) -> Orientation {
        self.rotate(2)
    }

    /// Clockwise offset that turns `self` into `other`.
    pub fn offset_to(self, other: Orientation) -> RotationOffset {
        RotationOffset::from_quarter_turns(other.index() - self.index())
    }

    /// Fewest quarter turns (either way) between the two orientations.
    pub fn rotations_to(self, other: Orientation) -> u8 {
        match self.offset_to(other) {
            RotationOffset::Same => 0,
            RotationOffset::Right | RotationOffset::Left => 1,
            RotationOffset::Backwards => 2,
        }
    }

    /// Same or opposite axis.
    pub fn is_parallel(self, other: Orientation) -> bool {
        self == other || self == other.opposite()
    }

    /// Unit step vector.
    pub fn vector(self) -> TilePos {
        match self {
            Orientation::Up => TilePos::new(0, 1),
            Orientation::Right => TilePos::new(1, 0),
            Orientation::Down => TilePos::new(0, -1),
            Orientation::Left => TilePos::new(-1, 0),
        }
    }

    pub fn from_vector(vector: TilePos) -> Option<Orientation> {
        Self::ALL.into_iter().find(|o| o.vector() == vector)
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Orientation::Up => "up",
            Orientation::Right => "right",
            Orientation::Down => "down",
            Orientation::Left => "left",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown direction '{0}' (expected up, down, left or right)")]
pub struct ParseOrientationError(pub String);

impl FromStr for Orientation {
    type Err = ParseOrientationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "u" | "north" => Ok(Orientation::Up),
            "right" | "r" | "east" => Ok(Orientation::Right),
            "down" | "d" | "south" => Ok(Orientation::Down),
            "left" | "l" | "west" => Ok(Orientation::Left),
            _ => Err(ParseOrientationError(s.to_string())),
        }
    }
}

/// A clockwise rotation delta in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationOffset {
    Same,
    Right,
    Backwards,
    Left,
}

impl RotationOffset {
    pub fn from_quarter_turns(turns: i32) -> RotationOffset {
        match turns.rem_euclid(4) {
            0 => RotationOffset::Same,
            1 => RotationOffset::Right,
            2 => RotationOffset::Backwards,
            _ => RotationOffset::Left,
        }
    }

    pub fn quarter_turns(self) -> i32 {
        match self {
            RotationOffset::Same => 0,
            RotationOffset::Right => 1,
            RotationOffset::Backwards => 2,
            RotationOffset::Left => 3,
        }
    }

    /// Clockwise degrees: 0, 90, 180 or 270.
    pub fn degrees(self) -> f32 {
        self.quarter_turns() as f32 * 90.0
    }

    pub fn compose(self, other: RotationOffset) -> RotationOffset {
        Self::from_quarter_turns(self.quarter_turns() + other.quarter_turns())
    }

    pub fn inverse(self) -> RotationOffset {
        Self::from_quarter_turns(-self.quarter_turns())
    }

    /// Rotates a local tile offset clockwise around the origin.
    pub fn rotate_tile(self, tile: TilePos) -> TilePos {
        match self {
            RotationOffset::Same => tile,
            RotationOffset::Right => TilePos::new(tile.y, -tile.x),
            RotationOffset::Backwards => TilePos::new(-tile.x, -tile.y),
            RotationOffset::Left => TilePos::new(-tile.y, tile.x),
        }
    }
}

/// Interpolates between two clockwise angles along the shorter arc.
pub fn lerp_degrees(from: f32, to: f32, t: f32) -> f32 {
    let delta = (to - from + 540.0).rem_euclid(360.0) - 180.0;
    (from + delta * t.clamp(0.0, 1.0)).rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_rotate_wraps_both_ways() {
        assert_eq!(Orientation::Up.rotate(1), Orientation::Right);
        assert_eq!(Orientation::Up.rotate(-1), Orientation::Left);
        assert_eq!(Orientation::Left.rotate(5), Orientation::Up);
        assert_eq!(Orientation::Down.opposite(), Orientation::Up);
    }

    #[test]
    fn test_offset_composition_is_closed() {
        for a in Orientation::ALL {
            for b in Orientation::ALL {
                for c in Orientation::ALL {
                    let composed = a.offset_to(b).compose(b.offset_to(c));
                    assert_eq!(composed, a.offset_to(c));
                }
                assert_eq!(a.offset_to(b).inverse(), b.offset_to(a));
            }
        }
    }

    #[test]
    fn test_rotations_to() {
        assert_eq!(Orientation::Up.rotations_to(Orientation::Up), 0);
        assert_eq!(Orientation::Up.rotations_to(Orientation::Left), 1);
        assert_eq!(Orientation::Up.rotations_to(Orientation::Right), 1);
        assert_eq!(Orientation::Up.rotations_to(Orientation::Down), 2);
    }

    #[test]
    fn test_vectors_are_unit_and_invertible() {
        for o in Orientation::ALL {
            assert!(o.vector().is_unit());
            assert_eq!(Orientation::from_vector(o.vector()), Some(o));
        }
        assert_eq!(Orientation::from_vector(TilePos::new(1, 1)), None);
    }

    #[test]
    fn test_rotate_tile_matches_orientation_rotation() {
        for o in Orientation::ALL {
            for turns in 0..4 {
                let offset = RotationOffset::from_quarter_turns(turns);
                assert_eq!(offset.rotate_tile(o.vector()), o.rotate(turns).vector());
            }
        }
    }

    #[test]
    fn test_parse_orientation() {
        assert_eq!("Right".parse::<Orientation>(), Ok(Orientation::Right));
        assert_eq!(" down ".parse::<Orientation>(), Ok(Orientation::Down));
        assert!("sideways".parse::<Orientation>().is_err());
    }

    #[test]
    fn test_lerp_degrees_takes_short_arc() {
        assert_approx_eq!(lerp_degrees(0.0, 90.0, 0.5), 45.0);
        assert_approx_eq!(lerp_degrees(0.0, 270.0, 0.5), 315.0);
        assert_approx_eq!(lerp_degrees(270.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_vector_lerp_and_round() {
        let from = Vector2::new(0.0, 0.0);
        let to = Vector2::new(2.0, -1.0);
        let mid = from.lerp(&to, 0.5);
        assert_approx_eq!(mid.x, 1.0);
        assert_approx_eq!(mid.y, -0.5);
        assert_eq!(from.lerp(&to, 3.0).round_to_tile(), TilePos::new(2, -1));
    }
}
