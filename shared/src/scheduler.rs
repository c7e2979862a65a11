//! Per-tick motion and rotation state machine shared by both roles.
//!
//! A mover is either rotating, translating one tile, or idle. Rotation always
//! takes priority: a step in flight is paused until the turn completes, then
//! resumes towards the same tile. Collision sensors are only consulted when a
//! new target is picked, never while a step is interpolating.

use crate::collision::CollisionProbe;
use crate::config::MoverConfig;
use crate::dedup::TimestampWindow;
use crate::error::Rejection;
use crate::events::{MoverEvents, NetworkSide, RotationInfo, RotationPhase};
use crate::move_nodes::MoveNodes;
use crate::orientation::{lerp_degrees, Orientation, RotationOffset, TilePos, Vector2};
use crate::state::{FacingState, HistoryNode, MotionState, PendingCommand};
use crate::{ClientId, MoverId, BURN_SPEED, DEDUP_WINDOW, MIN_ADJUSTED_SPEED};
use log::debug;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Rotating,
    Translating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnState {
    Idle,
    Burning,
}

/// Continuous pose used for presentation and collision footprints.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vector2,
    /// Clockwise degrees relative to the mover's initial facing.
    pub rotation: f32,
}

fn sensor_tiles(
    sensors: &[TilePos],
    origin: TilePos,
    offset: RotationOffset,
) -> impl Iterator<Item = TilePos> + '_ {
    sensors
        .iter()
        .map(move |sensor| origin + offset.rotate_tile(*sensor))
}

#[derive(Debug, Clone, Copy)]
struct Rotation {
    from_degrees: f32,
    to_degrees: f32,
    offset: RotationOffset,
    lerp: f32,
}

#[derive(Debug, Clone, Copy)]
struct Step {
    from: Vector2,
    to: TilePos,
    lerp: f32,
}

/// What happened during a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub rotation_completed: bool,
    pub arrival: Option<HistoryNode>,
    /// A cruising mover could not pick its next tile.
    pub blocked: bool,
}

pub struct MoverCore {
    id: MoverId,
    side: NetworkSide,
    config: MoverConfig,
    facing: FacingState,
    motion: MotionState,
    transform: Transform,
    engines_on: bool,
    rotation: Option<Rotation>,
    step: Option<Step>,
    resting: TilePos,
    move_nodes: MoveNodes,
    burn: BurnState,
    pending_burns: VecDeque<PendingCommand>,
    burn_window: TimestampWindow,
    speed_adjustment: f32,
    pending_adjustment: Option<f32>,
}

impl MoverCore {
    pub fn new(id: MoverId, side: NetworkSide, config: MoverConfig, position: TilePos) -> Self {
        let initial_facing = config.initial_facing;
        Self {
            id,
            side,
            facing: FacingState::new(initial_facing),
            motion: MotionState::new(position),
            transform: Transform {
                position: position.to_vector(),
                rotation: 0.0,
            },
            engines_on: false,
            rotation: None,
            step: None,
            resting: position,
            move_nodes: MoveNodes::new(position, initial_facing),
            burn: BurnState::Idle,
            pending_burns: VecDeque::new(),
            burn_window: TimestampWindow::new(DEDUP_WINDOW),
            speed_adjustment: 0.0,
            pending_adjustment: None,
            config,
        }
    }

    pub fn id(&self) -> MoverId {
        self.id
    }

    pub fn side(&self) -> NetworkSide {
        self.side
    }

    pub fn config(&self) -> &MoverConfig {
        &self.config
    }

    pub fn facing(&self) -> &FacingState {
        &self.facing
    }

    pub fn motion(&self) -> &MotionState {
        &self.motion
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn resting_tile(&self) -> TilePos {
        self.resting
    }

    pub fn move_nodes(&self) -> &MoveNodes {
        &self.move_nodes
    }

    pub fn engines_on(&self) -> bool {
        self.engines_on
    }

    pub fn burn_state(&self) -> BurnState {
        self.burn
    }

    pub fn pending_burns(&self) -> usize {
        self.pending_burns.len()
    }

    pub fn speed_adjustment(&self) -> f32 {
        self.speed_adjustment
    }

    pub fn pending_adjustment(&self) -> Option<f32> {
        self.pending_adjustment
    }

    /// Tile of the step in flight, if any.
    pub fn target_tile(&self) -> Option<TilePos> {
        self.step.map(|step| step.to)
    }

    pub fn phase(&self) -> Phase {
        if self.rotation.is_some() {
            Phase::Rotating
        } else if self.step.is_some() {
            Phase::Translating
        } else {
            Phase::Idle
        }
    }

    pub fn is_cruising(&self) -> bool {
        self.engines_on && self.motion.is_moving_at_speed()
    }

    pub fn set_safety_protocols(&mut self, on: bool) {
        self.config.safety_protocols_on = on;
    }

    /// Tile the next target is generated from.
    fn anchor(&self) -> TilePos {
        self.target_tile().unwrap_or(self.resting)
    }

    fn regenerate_nodes(&mut self) {
        let anchor = self.anchor();
        self.move_nodes
            .generate_move_nodes(anchor, self.facing.flying_direction.vector());
    }

    /// Starts turning towards `facing.facing_direction`, superseding any turn
    /// in progress from the current transform rotation.
    pub fn begin_rotation(&mut self, facing: FacingState, events: &mut dyn MoverEvents) {
        let offset = self.facing.facing_direction.offset_to(facing.facing_direction);
        self.facing = facing;
        self.rotation = Some(Rotation {
            from_degrees: self.transform.rotation,
            to_degrees: self
                .config
                .initial_facing
                .offset_to(facing.facing_direction)
                .degrees(),
            offset,
            lerp: 0.0,
        });

        events.on_rotate(RotationInfo {
            mover: self.id,
            offset,
            side: self.side,
            phase: RotationPhase::Start,
        });

        if !facing.is_animated() {
            self.complete_rotation(events);
        }
    }

    fn complete_rotation(&mut self, events: &mut dyn MoverEvents) {
        let Some(rotation) = self.rotation.take() else {
            return;
        };
        self.transform.rotation = rotation.to_degrees;
        self.regenerate_nodes();

        events.on_rotate(RotationInfo {
            mover: self.id,
            offset: rotation.offset,
            side: self.side,
            phase: RotationPhase::End,
        });
    }

    /// Replaces the facing fields without animating a turn.
    pub fn sync_facing(&mut self, facing: FacingState) {
        let flying_changed = facing.flying_direction != self.facing.flying_direction;
        self.facing = facing;
        if flying_changed && self.rotation.is_none() {
            self.regenerate_nodes();
        }
    }

    pub fn set_engines(&mut self, on: bool) {
        if on && !self.engines_on {
            self.regenerate_nodes();
        }
        self.engines_on = on;
    }

    /// Adopts a motion snapshot. The tile of a committed step is kept.
    pub fn apply_motion(&mut self, motion: MotionState) {
        let position = self.motion.position;
        self.motion = MotionState { position, ..motion };
        if !self.motion.is_moving_at_speed() {
            self.speed_adjustment = 0.0;
            self.pending_adjustment = None;
        }
    }

    /// Puts the mover on `position` immediately, dropping the step in flight
    /// and every queued burn.
    pub fn teleport(&mut self, position: TilePos) {
        self.step = None;
        self.resting = position;
        self.motion.position = position;
        self.transform.position = position.to_vector();
        self.pending_burns.clear();
        self.burn = BurnState::Idle;
        self.regenerate_nodes();
    }

    /// Speed delta that takes effect at the next tile arrival and lasts for
    /// one tile.
    pub fn queue_speed_adjustment(&mut self, adjustment: f32) {
        self.pending_adjustment = Some(adjustment);
    }

    /// World tiles covered by the footprint at rest and at the step target.
    pub fn footprint(&self) -> Vec<TilePos> {
        let offset = self.config.initial_facing.offset_to(self.facing.facing_direction);
        let mut tiles: Vec<TilePos> =
            sensor_tiles(&self.config.sensors, self.resting, offset).collect();
        if let Some(target) = self.target_tile() {
            tiles.extend(sensor_tiles(&self.config.sensors, target, offset));
        }
        tiles.sort_by_key(|tile| (tile.x, tile.y));
        tiles.dedup();
        tiles
    }

    /// Whether every movement sensor can advance one tile from `origin`.
    pub fn can_move_from(
        &self,
        origin: TilePos,
        direction: Orientation,
        probe: &dyn CollisionProbe,
    ) -> bool {
        let offset = self.config.initial_facing.offset_to(self.facing.facing_direction);
        let step = direction.vector();
        let exclude = [self.id];
        sensor_tiles(&self.config.sensors, origin, offset)
            .all(|tile| probe.is_passable(tile, tile + step, &exclude, false))
    }

    pub fn can_move_to(&self, direction: Orientation, probe: &dyn CollisionProbe) -> bool {
        self.can_move_from(self.anchor(), direction, probe)
    }

    /// Whether the footprint turned to `desired` fits around the pivot.
    pub fn can_rotate_to(&self, desired: Orientation, probe: &dyn CollisionProbe) -> bool {
        let offset = self.config.initial_facing.offset_to(desired);
        let origin = self.anchor();
        let exclude = [self.id];
        sensor_tiles(&self.config.rotation_sensors, origin, offset)
            .all(|tile| probe.is_passable(tile, tile, &exclude, true))
    }

    /// Requests a one-tile thruster burn.
    ///
    /// Each timestamp is honoured at most once, and only recorded once the
    /// burn started or was queued, so a rejected burn can still arrive again
    /// from the server. While a burn is animating the request is queued and
    /// validated when its turn comes.
    pub fn move_via_rcs(
        &mut self,
        direction: Orientation,
        timestamp: f64,
        requester: Option<ClientId>,
        probe: &dyn CollisionProbe,
    ) -> Result<(), Rejection> {
        if self.burn_window.contains(timestamp) {
            return Err(Rejection::DuplicateTimestamp(timestamp));
        }

        if self.burn == BurnState::Burning {
            if self.pending_burns.len() >= DEDUP_WINDOW {
                return Err(Rejection::BurnQueueFull);
            }
            self.burn_window.try_insert(timestamp);
            self.pending_burns.push_back(PendingCommand {
                direction,
                timestamp,
                requester,
            });
            debug!(
                "Mover {} queued burn {} ({} pending)",
                self.id,
                direction,
                self.pending_burns.len()
            );
            return Ok(());
        }

        self.start_burn(direction, probe)?;
        self.burn_window.try_insert(timestamp);
        Ok(())
    }

    fn start_burn(
        &mut self,
        direction: Orientation,
        probe: &dyn CollisionProbe,
    ) -> Result<(), Rejection> {
        let origin = self.anchor();
        if self.config.safety_protocols_on && !self.can_move_from(origin, direction, probe) {
            return Err(Rejection::Blocked);
        }

        let target = if self.is_cruising() {
            if direction.is_parallel(self.facing.flying_direction) {
                return Err(Rejection::ParallelBurn(direction));
            }
            self.move_nodes.adjust_future_nodes(direction.vector())
        } else {
            let target = origin.step(direction);
            self.move_nodes
                .generate_move_nodes(target, self.facing.flying_direction.vector());
            target
        };

        self.step = Some(Step {
            from: self.transform.position,
            to: target,
            lerp: 0.0,
        });
        self.burn = BurnState::Burning;
        Ok(())
    }

    fn process_pending_burns(&mut self, probe: &dyn CollisionProbe) {
        while let Some(pending) = self.pending_burns.pop_front() {
            match self.start_burn(pending.direction, probe) {
                Ok(()) => return,
                Err(rejection) => debug!(
                    "Mover {} dropped queued burn {} at {}: {}",
                    self.id, pending.direction, pending.timestamp, rejection
                ),
            }
        }
        self.burn = BurnState::Idle;
    }

    fn acquire_target(&mut self, probe: &dyn CollisionProbe) -> bool {
        let direction = self.facing.flying_direction;
        if self.config.safety_protocols_on && !self.can_move_from(self.resting, direction, probe) {
            return false;
        }

        let to = self.move_nodes.get_target_node(direction.vector());
        self.step = Some(Step {
            from: self.transform.position,
            to,
            lerp: 0.0,
        });
        true
    }

    fn step_rate(&self) -> f32 {
        if self.is_cruising() {
            let speed = self.motion.speed;
            (speed + self.speed_adjustment).max(MIN_ADJUSTED_SPEED.min(speed))
        } else {
            BURN_SPEED
        }
    }

    /// Advances the mover by `dt` seconds. `now` stamps history nodes.
    pub fn tick(
        &mut self,
        dt: f32,
        now: f64,
        probe: &dyn CollisionProbe,
        events: &mut dyn MoverEvents,
    ) -> TickReport {
        let mut report = TickReport::default();

        if let Some(rotation) = self.rotation.as_mut() {
            let rate = self.facing.rotation_duration;
            rotation.lerp = if rate > 0.0 {
                rotation.lerp + dt * rate
            } else {
                1.0
            };

            if rotation.lerp >= 1.0 {
                self.complete_rotation(events);
                report.rotation_completed = true;
            } else {
                self.transform.rotation =
                    lerp_degrees(rotation.from_degrees, rotation.to_degrees, rotation.lerp);
            }
            return report;
        }

        if self.step.is_none() && self.is_cruising() && !self.acquire_target(probe) {
            report.blocked = true;
        }

        let rate = self.step_rate();
        let Some(step) = self.step.as_mut() else {
            return report;
        };

        step.lerp += dt * rate;
        let target = step.to.to_vector();
        self.transform.position = step.from.lerp(&target, step.lerp);
        if step.lerp < 1.0 {
            return report;
        }

        let arrived = step.to;
        self.step = None;
        self.resting = arrived;
        self.motion.position = arrived;
        self.transform.position = target;
        let node = self
            .move_nodes
            .add_history_node(arrived, now, self.facing.flying_direction);
        self.speed_adjustment = self.pending_adjustment.take().unwrap_or(0.0);

        if self.burn == BurnState::Burning {
            self.process_pending_burns(probe);
        }

        report.arrival = Some(node);
        report
    }
}
