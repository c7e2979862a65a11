//! Replicated snapshots of a mover's rotation and translation.

use crate::orientation::{Orientation, RotationOffset, TilePos};
use crate::ClientId;
use serde::{Deserialize, Serialize};

/// Rotation-related state of a mover.
///
/// `facing_direction` and `flying_direction` only differ while backing up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacingState {
    pub facing_direction: Orientation,
    pub flying_direction: Orientation,
    /// Rotation lerp rate. The interpolation parameter advances by
    /// `dt * rotation_duration` per tick; zero means the turn is instant.
    pub rotation_duration: f32,
    /// Network time of the last facing change.
    pub facing_changed_at: f64,
}

impl FacingState {
    pub fn new(initial_facing: Orientation) -> Self {
        Self {
            facing_direction: initial_facing,
            flying_direction: initial_facing,
            rotation_duration: 0.0,
            facing_changed_at: 0.0,
        }
    }

    pub fn offset_from_initial(&self, initial_facing: Orientation) -> RotationOffset {
        initial_facing.offset_to(self.facing_direction)
    }

    pub fn is_backing_up(&self) -> bool {
        self.facing_direction != self.flying_direction
    }

    pub fn is_animated(&self) -> bool {
        self.rotation_duration > 0.0
    }
}

/// Translation-related state of a mover.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub is_moving: bool,
    pub speed: f32,
    /// Last committed tile. Exact only while not mid-transit.
    pub position: TilePos,
    /// Network time of the last speed or position change pushed to clients.
    pub speed_changed_at: f64,
    /// Client that requested the last speed change, if any.
    pub interactee: Option<ClientId>,
}

impl MotionState {
    pub fn new(position: TilePos) -> Self {
        Self {
            is_moving: false,
            speed: 0.0,
            position,
            speed_changed_at: 0.0,
            interactee: None,
        }
    }

    pub fn is_moving_at_speed(&self) -> bool {
        self.is_moving && self.speed > 0.0
    }
}

/// A recorded tile arrival.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryNode {
    pub position: TilePos,
    pub timestamp: f64,
    pub direction: Orientation,
}

/// A thruster burn waiting for the current burn to finish.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingCommand {
    pub direction: Orientation,
    pub timestamp: f64,
    pub requester: Option<ClientId>,
}
