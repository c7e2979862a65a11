//! Authoritative control surface of a single mover.
//!
//! Every mutation goes through here, is validated against collision and
//! timestamp replay, and queues the pushes that replicate it. Pushes are
//! collected in an outbox and drained by the game loop in the same tick.

use crate::autopilot::{Autopilot, Course};
use log::{debug, info, warn};
use shared::{
    fire_motion_edges, ClientId, CollisionProbe, FacingState, MotionState, MoverConfig, MoverCore,
    MoverEvents, MoverId, NetworkClock, NetworkSide, Orientation, Push, Rejection, TickReport,
    TilePos, TimestampWindow, DEDUP_WINDOW, ROTATION_DURATION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    Only(ClientId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub push: Push,
    pub audience: Audience,
}

/// Thruster and fuel availability, owned by an external inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Propulsion {
    pub working_thrusters: u32,
    pub fueled: bool,
}

impl Default for Propulsion {
    fn default() -> Self {
        Self {
            working_thrusters: 1,
            fueled: true,
        }
    }
}

pub struct ServerMover {
    core: MoverCore,
    facing: FacingState,
    motion: MotionState,
    propulsion: Propulsion,
    rcs_mode_active: bool,
    rcs_operator: Option<ClientId>,
    facing_window: TimestampWindow,
    speed_window: TimestampWindow,
    autopilot: Option<Autopilot>,
    move_for: Option<u32>,
    outbox: Vec<Outbound>,
    events: Box<dyn MoverEvents>,
}

/// Gap between replicated stamps when a change is applied out of order.
const STAMP_STEP: f64 = 1e-6;

/// Rejects a timestamp already applied, without recording it. Server-issued
/// changes carry no timestamp and are stamped with the current network time.
fn admit(
    window: &TimestampWindow,
    timestamp: Option<f64>,
    clock: &dyn NetworkClock,
) -> Result<f64, Rejection> {
    match timestamp {
        Some(ts) if window.contains(ts) => Err(Rejection::DuplicateTimestamp(ts)),
        Some(ts) => Ok(ts),
        None => Ok(clock.now()),
    }
}

/// Records an applied timestamp and returns the one to replicate, which is
/// always newer than anything replicated before it.
fn record(window: &mut TimestampWindow, stamp: f64) -> f64 {
    let replicated = match window.latest() {
        Some(latest) if stamp <= latest => latest + STAMP_STEP,
        _ => stamp,
    };
    window.try_insert(stamp);
    if replicated != stamp {
        window.try_insert(replicated);
    }
    replicated
}

impl ServerMover {
    pub fn new(
        id: MoverId,
        config: MoverConfig,
        position: TilePos,
        events: Box<dyn MoverEvents>,
    ) -> Self {
        let core = MoverCore::new(id, NetworkSide::Server, config, position);
        Self {
            facing: *core.facing(),
            motion: *core.motion(),
            core,
            propulsion: Propulsion::default(),
            rcs_mode_active: false,
            rcs_operator: None,
            facing_window: TimestampWindow::new(DEDUP_WINDOW),
            speed_window: TimestampWindow::new(DEDUP_WINDOW),
            autopilot: None,
            move_for: None,
            outbox: Vec::new(),
            events,
        }
    }

    pub fn id(&self) -> MoverId {
        self.core.id()
    }

    pub fn core(&self) -> &MoverCore {
        &self.core
    }

    pub fn facing(&self) -> &FacingState {
        &self.facing
    }

    pub fn motion(&self) -> &MotionState {
        &self.motion
    }

    pub fn engines_on(&self) -> bool {
        self.core.engines_on()
    }

    pub fn rcs_mode_active(&self) -> bool {
        self.rcs_mode_active
    }

    pub fn rcs_operator(&self) -> Option<ClientId> {
        self.rcs_operator
    }

    pub fn autopilot(&self) -> Option<&Autopilot> {
        self.autopilot.as_ref()
    }

    pub fn move_for_remaining(&self) -> Option<u32> {
        self.move_for
    }

    fn broadcast(&mut self, push: Push) {
        self.outbox.push(Outbound {
            push,
            audience: Audience::All,
        });
    }

    fn notify(&mut self, client: ClientId, message: &str) {
        self.outbox.push(Outbound {
            push: Push::Notice {
                message: message.to_string(),
            },
            audience: Audience::Only(client),
        });
    }

    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// Pushes a newly connected client needs before any incremental update.
    pub fn snapshot(&self) -> Vec<Push> {
        vec![
            Push::Spawned {
                config: self.core.config().clone(),
                position: self.motion.position,
            },
            Push::FacingStateSync(self.facing),
            Push::MotionStateSync(self.motion),
            Push::OperationalStateSync {
                engines_on: self.core.engines_on(),
                rcs_mode_active: self.rcs_mode_active,
            },
        ]
    }

    fn push_operational_state(&mut self) {
        self.broadcast(Push::OperationalStateSync {
            engines_on: self.core.engines_on(),
            rcs_mode_active: self.rcs_mode_active,
        });
    }

    fn commit_facing(&mut self, facing: FacingState, animate: bool) {
        self.facing = facing;
        if animate {
            self.core.begin_rotation(facing, self.events.as_mut());
        } else {
            self.core.sync_facing(facing);
        }
        self.broadcast(Push::FacingStateSync(facing));
    }

    /// Turns the mover to face and fly towards `direction`.
    pub fn steer_to(
        &mut self,
        direction: Orientation,
        timestamp: Option<f64>,
        probe: &dyn CollisionProbe,
        clock: &dyn NetworkClock,
    ) -> Result<(), Rejection> {
        let stamp = admit(&self.facing_window, timestamp, clock)?;
        if !self.core.can_rotate_to(direction, probe) {
            debug!("Mover {} cannot rotate to {}", self.id(), direction);
            return Err(Rejection::Blocked);
        }
        let stamp = record(&mut self.facing_window, stamp);

        info!("Mover {} steering {}", self.id(), direction);
        self.commit_facing(
            FacingState {
                facing_direction: direction,
                flying_direction: direction,
                rotation_duration: ROTATION_DURATION,
                facing_changed_at: stamp,
            },
            true,
        );
        Ok(())
    }

    /// Rotates one quarter turn; positive steps are clockwise.
    pub fn try_rotate(
        &mut self,
        steps: i32,
        probe: &dyn CollisionProbe,
        clock: &dyn NetworkClock,
    ) -> Result<(), Rejection> {
        let direction = self.facing.facing_direction.rotate(steps);
        self.steer_to(direction, None, probe, clock)
    }

    /// Turns the hull while keeping the direction of travel, for reversing.
    pub fn change_facing_direction(
        &mut self,
        direction: Orientation,
        probe: &dyn CollisionProbe,
        clock: &dyn NetworkClock,
    ) -> Result<(), Rejection> {
        if !self.core.can_rotate_to(direction, probe) {
            return Err(Rejection::Blocked);
        }
        let stamp = record(&mut self.facing_window, clock.now());
        self.commit_facing(
            FacingState {
                facing_direction: direction,
                rotation_duration: ROTATION_DURATION,
                facing_changed_at: stamp,
                ..self.facing
            },
            true,
        );
        Ok(())
    }

    /// Changes the direction of travel without rotating the hull.
    pub fn change_flying_direction(&mut self, direction: Orientation, clock: &dyn NetworkClock) {
        let stamp = record(&mut self.facing_window, clock.now());
        self.commit_facing(
            FacingState {
                flying_direction: direction,
                facing_changed_at: stamp,
                ..self.facing
            },
            false,
        );
    }

    /// Sets the cruise speed, clamped into `[0, max_speed]`.
    pub fn set_speed(
        &mut self,
        value: f32,
        timestamp: Option<f64>,
        requester: Option<ClientId>,
        clock: &dyn NetworkClock,
    ) -> Result<(), Rejection> {
        let stamp = admit(&self.speed_window, timestamp, clock)?;
        let stamp = record(&mut self.speed_window, stamp);

        let speed = self.core.config().clamp_speed(value);
        let old = self.motion;
        // a step in flight always completes, so a stop comes to rest on its target
        let position = if speed > 0.0 {
            self.core.motion().position
        } else {
            self.core.target_tile().unwrap_or(self.core.resting_tile())
        };
        self.motion = MotionState {
            is_moving: speed > 0.0,
            speed,
            position,
            speed_changed_at: stamp,
            interactee: requester,
        };
        self.core.apply_motion(self.motion);
        fire_motion_edges(self.id(), &old, &self.motion, self.events.as_mut());

        self.broadcast(Push::MotionStateSync(self.motion));
        Ok(())
    }

    /// Applies a thruster burn for the bound RCS operator.
    pub fn process_rcs_move_request(
        &mut self,
        requester: ClientId,
        direction: Orientation,
        timestamp: f64,
        probe: &dyn CollisionProbe,
    ) -> Result<(), Rejection> {
        if !self.rcs_mode_active {
            return Err(Rejection::RcsInactive);
        }
        if self.rcs_operator != Some(requester) {
            return Err(Rejection::NotRcsOperator);
        }

        self.core
            .move_via_rcs(direction, timestamp, Some(requester), probe)?;
        debug!("Mover {} burn {} at {}", self.id(), direction, timestamp);
        self.broadcast(Push::RcsBurnBroadcast {
            direction,
            timestamp,
        });
        Ok(())
    }

    /// Advisory: recorded, never acted on.
    pub fn process_stop_request(&mut self, requester: ClientId, proposed_stop_tile: TilePos) {
        info!(
            "Mover {}: client {} proposed stopping at {}",
            self.id(),
            requester,
            proposed_stop_tile
        );
    }

    /// Authoritative stop: zero speed and cancel every server-driven maneuver.
    pub fn stop_movement(&mut self, clock: &dyn NetworkClock) {
        self.autopilot = None;
        self.move_for = None;
        if self.motion.is_moving {
            if let Err(e) = self.set_speed(0.0, None, None, clock) {
                warn!("Mover {} failed to stop: {}", self.id(), e);
            }
        }
    }

    pub fn start_movement(&mut self, clock: &dyn NetworkClock) -> Result<(), Rejection> {
        if !self.core.engines_on() {
            self.toggle_engines(true, None, clock)?;
        }
        if !self.motion.is_moving {
            let cruise = self.core.config().cruise_speed;
            self.set_speed(cruise, None, None, clock)?;
        }
        Ok(())
    }

    /// Moves `tiles` tiles (at least one) along the flying direction, then stops.
    pub fn move_for(&mut self, tiles: u32, clock: &dyn NetworkClock) -> Result<(), Rejection> {
        self.start_movement(clock)?;
        self.move_for = Some(tiles.max(1));
        Ok(())
    }

    pub fn toggle_engines(
        &mut self,
        on: bool,
        requester: Option<ClientId>,
        clock: &dyn NetworkClock,
    ) -> Result<(), Rejection> {
        if on {
            let missing = if self.propulsion.working_thrusters == 0 {
                Some(Rejection::NoWorkingThrusters)
            } else if self.core.config().requires_fuel && !self.propulsion.fueled {
                Some(Rejection::NoFuel)
            } else {
                None
            };

            if let Some(rejection) = missing {
                if let (Some(client), Some(message)) = (requester, rejection.user_message()) {
                    self.notify(client, message);
                }
                return Err(rejection);
            }
        }

        if on == self.core.engines_on() {
            return Ok(());
        }

        self.core.set_engines(on);
        if on {
            self.events.on_engines_started(self.id());
        } else {
            self.events.on_engines_stopped(self.id());
            self.stop_movement(clock);
        }
        self.push_operational_state();
        Ok(())
    }

    /// Binds or releases the RCS operator.
    pub fn toggle_rcs(&mut self, on: bool, requester: ClientId) -> Result<(), Rejection> {
        if on {
            if let Some(previous) = self.rcs_operator.filter(|&c| c != requester) {
                debug!(
                    "Mover {}: client {} replaced RCS operator {}",
                    self.id(),
                    requester,
                    previous
                );
            }
            self.rcs_mode_active = true;
            self.rcs_operator = Some(requester);
            info!("Mover {}: client {} took RCS control", self.id(), requester);
        } else {
            if self.rcs_operator != Some(requester) {
                return Err(Rejection::NotRcsOperator);
            }
            self.rcs_mode_active = false;
            self.rcs_operator = None;
            info!("Mover {}: RCS released", self.id());
        }
        self.push_operational_state();
        Ok(())
    }

    /// Drops any binding held by a client that left.
    pub fn release_client(&mut self, client: ClientId) {
        if self.rcs_operator == Some(client) {
            if let Err(e) = self.toggle_rcs(false, client) {
                warn!("Mover {} kept RCS bound to client {}: {}", self.id(), client, e);
            }
        }
    }

    pub fn set_propulsion(&mut self, propulsion: Propulsion, clock: &dyn NetworkClock) {
        self.propulsion = propulsion;
        let unpowered = propulsion.working_thrusters == 0
            || (self.core.config().requires_fuel && !propulsion.fueled);
        if unpowered && self.core.engines_on() {
            info!("Mover {} lost propulsion", self.id());
            if let Err(e) = self.toggle_engines(false, None, clock) {
                warn!("Mover {} could not cut engines: {}", self.id(), e);
            }
        }
    }

    pub fn set_safety_protocols(&mut self, on: bool) {
        self.core.set_safety_protocols(on);
    }

    /// Moves the mover straight onto `position`.
    pub fn set_position(&mut self, position: TilePos, clock: &dyn NetworkClock) {
        let stamp = record(&mut self.speed_window, clock.now());
        self.core.teleport(position);
        self.motion.position = position;
        self.motion.speed_changed_at = stamp;
        info!("Mover {} placed at {}", self.id(), position);
        self.broadcast(Push::Teleported(self.motion));
    }

    pub fn autopilot_to(&mut self, target: TilePos, accuracy: f32, clock: &dyn NetworkClock) {
        info!("Mover {} autopilot to {}", self.id(), target);
        self.autopilot = Some(Autopilot::new(target, accuracy, clock.now()));
    }

    pub fn disable_autopilot(&mut self) {
        if self.autopilot.take().is_some() {
            info!("Mover {} autopilot disengaged", self.id());
        }
    }

    fn run_autopilot(&mut self, probe: &dyn CollisionProbe, clock: &dyn NetworkClock) {
        let now = clock.now();
        let course = match self.autopilot.as_mut() {
            Some(autopilot) if autopilot.is_due(now) => {
                autopilot.rearm(now);
                autopilot.plan(self.motion.position, self.facing.flying_direction)
            }
            _ => return,
        };

        match course {
            Course::Arrived => {
                info!("Mover {} autopilot arrived", self.id());
                self.stop_movement(clock);
                return;
            }
            Course::Steer(direction) => {
                if let Err(rejection) = self.steer_to(direction, None, probe, clock) {
                    debug!("Mover {} autopilot steer failed: {}", self.id(), rejection);
                }
            }
            Course::Hold => {}
        }

        if !self.motion.is_moving {
            if let Err(rejection) = self.start_movement(clock) {
                debug!("Mover {} autopilot cannot start: {}", self.id(), rejection);
            }
        }
    }

    pub fn tick(
        &mut self,
        dt: f32,
        probe: &dyn CollisionProbe,
        clock: &dyn NetworkClock,
    ) -> TickReport {
        self.run_autopilot(probe, clock);

        let report = self
            .core
            .tick(dt, clock.now(), probe, self.events.as_mut());

        if let Some(node) = report.arrival {
            self.motion.position = node.position;
            self.broadcast(Push::HistoryNodeBroadcast(node));
            if let Some(autopilot) = self.autopilot.as_mut() {
                autopilot.expedite();
            }

            if let Some(remaining) = self.move_for.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    self.stop_movement(clock);
                }
            }
        }

        if report.blocked && self.motion.is_moving && self.core.config().safety_protocols_on {
            info!("Mover {} stopped by safety protocols", self.id());
            self.stop_movement(clock);
        }

        report
    }
}
