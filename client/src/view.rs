//! Client-side mirror of one mover.
//!
//! The server only pushes on discrete changes (facing, speed, tile arrivals),
//! so the client dead-reckons between pushes by running the same
//! [`MoverCore`] tick as the server. Every push is deduplicated by its
//! timestamp, and drift against the server's tile arrivals is corrected by a
//! transient speed adjustment instead of snapping the mover around.

use log::{debug, info};
use shared::{
    fire_motion_edges, BurnState, CollisionProbe, FacingState, HistoryNode, HistoryRing,
    MotionState, MoverConfig, MoverCore, MoverEvents, MoverId, NetworkSide, Orientation, Phase,
    Push, Rejection, TickReport, TilePos, TimestampWindow, DEDUP_WINDOW, HISTORY_CAPACITY,
    LAG_TOLERANCE_TILES, MAX_SPEED_ADJUSTMENT, MIN_ADJUSTED_SPEED,
};

/// Counters describing how much correction a view needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewStats {
    pub applied: u64,
    pub duplicates: u64,
    pub stale: u64,
    pub lag_adjustments: u64,
    pub rest_snaps: u64,
}

/// Last known tile the server reported the mover resting on, with the
/// network time of the report.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ServerRest {
    position: TilePos,
    at: f64,
}

pub struct ClientMover {
    core: MoverCore,
    server_facing: FacingState,
    server_motion: MotionState,
    server_rest: ServerRest,
    server_history: HistoryRing,
    facing_window: TimestampWindow,
    motion_window: TimestampWindow,
    received_initial_state: bool,
    pending_initial_rotation: bool,
    rest_check_pending: bool,
    rcs_mode_active: bool,
    last_gap: f32,
    stats: ViewStats,
    events: Box<dyn MoverEvents>,
}

/// Clamps a playback delta so the mover never drops below
/// `MIN_ADJUSTED_SPEED` (or stops) and never runs away.
pub fn clamp_speed_adjustment(adjustment: f32, speed: f32) -> f32 {
    let floor = (MIN_ADJUSTED_SPEED - speed).min(0.0);
    adjustment.clamp(floor, MAX_SPEED_ADJUSTMENT)
}

impl ClientMover {
    pub fn new(
        id: MoverId,
        config: MoverConfig,
        position: TilePos,
        events: Box<dyn MoverEvents>,
    ) -> Self {
        let core = MoverCore::new(id, NetworkSide::Client, config, position);
        Self {
            server_facing: *core.facing(),
            server_motion: *core.motion(),
            server_rest: ServerRest {
                position,
                at: f64::NEG_INFINITY,
            },
            core,
            server_history: HistoryRing::new(HISTORY_CAPACITY),
            facing_window: TimestampWindow::new(DEDUP_WINDOW),
            motion_window: TimestampWindow::new(DEDUP_WINDOW),
            received_initial_state: false,
            pending_initial_rotation: false,
            rest_check_pending: false,
            rcs_mode_active: false,
            last_gap: 0.0,
            stats: ViewStats::default(),
            events,
        }
    }

    pub fn id(&self) -> MoverId {
        self.core.id()
    }

    pub fn core(&self) -> &MoverCore {
        &self.core
    }

    /// Predicted facing, which may still be animating towards the server's.
    pub fn facing(&self) -> &FacingState {
        self.core.facing()
    }

    pub fn motion(&self) -> &MotionState {
        self.core.motion()
    }

    pub fn server_facing(&self) -> &FacingState {
        &self.server_facing
    }

    pub fn server_motion(&self) -> &MotionState {
        &self.server_motion
    }

    pub fn server_history(&self) -> &HistoryRing {
        &self.server_history
    }

    pub fn rcs_mode_active(&self) -> bool {
        self.rcs_mode_active
    }

    pub fn stats(&self) -> ViewStats {
        self.stats
    }

    /// True once the first server state arrived and any rotation into the
    /// initial facing has finished.
    pub fn is_initialized(&self) -> bool {
        self.received_initial_state && !self.pending_initial_rotation
    }

    /// Signed distance in tiles along the flying direction from this client to
    /// the server's last reported arrival. Positive means the client is behind.
    pub fn lag_behind_server(&self) -> f32 {
        self.last_gap
    }

    /// True when the client trails the server by more than the tolerance.
    /// Being ahead never counts.
    pub fn is_lagging(&self) -> bool {
        self.last_gap > LAG_TOLERANCE_TILES
    }

    /// Admits a pushed timestamp at most once and never after a newer one.
    fn admit(window: &mut TimestampWindow, stats: &mut ViewStats, timestamp: f64) -> bool {
        if window.contains(timestamp) {
            stats.duplicates += 1;
            return false;
        }
        if window.is_stale(timestamp) {
            stats.stale += 1;
            return false;
        }
        window.try_insert(timestamp);
        stats.applied += 1;
        true
    }

    /// Adopts a facing push. Returns false when it was a replay.
    pub fn apply_facing_update(&mut self, new: FacingState) -> bool {
        if !Self::admit(&mut self.facing_window, &mut self.stats, new.facing_changed_at) {
            debug!(
                "Mover {} ignored facing update at {}",
                self.id(),
                new.facing_changed_at
            );
            return false;
        }

        let changed = new.facing_direction != self.core.facing().facing_direction;
        if !self.received_initial_state {
            if changed {
                // snap into the facing the mover already had before we joined
                self.pending_initial_rotation = true;
                self.core.begin_rotation(
                    FacingState {
                        rotation_duration: 0.0,
                        ..new
                    },
                    self.events.as_mut(),
                );
                self.pending_initial_rotation = self.core.phase() == Phase::Rotating;
            }
            self.core.sync_facing(new);
            self.received_initial_state = true;
        } else if changed {
            self.core.begin_rotation(new, self.events.as_mut());
        } else {
            self.core.sync_facing(new);
        }

        self.server_facing = new;
        true
    }

    /// Adopts a motion push, firing start, stop and speed events on edges only.
    pub fn apply_motion_update(&mut self, new: MotionState) -> bool {
        if !Self::admit(&mut self.motion_window, &mut self.stats, new.speed_changed_at) {
            debug!(
                "Mover {} ignored motion update at {}",
                self.id(),
                new.speed_changed_at
            );
            return false;
        }

        let old = self.server_motion;
        self.core.apply_motion(new);
        fire_motion_edges(self.id(), &old, &new, self.events.as_mut());
        self.server_motion = new;
        self.received_initial_state = true;

        if !new.is_moving {
            self.record_rest(new.position, new.speed_changed_at);
        }
        true
    }

    /// Places the mover on a tile chosen by the server.
    pub fn apply_teleport(&mut self, new: MotionState) -> bool {
        if !Self::admit(&mut self.motion_window, &mut self.stats, new.speed_changed_at) {
            return false;
        }

        info!("Mover {} teleported to {}", self.id(), new.position);
        self.core.teleport(new.position);
        self.core.apply_motion(new);
        self.server_motion = new;
        self.server_rest = ServerRest {
            position: new.position,
            at: new.speed_changed_at,
        };
        self.rest_check_pending = false;
        true
    }

    pub fn apply_operational(&mut self, engines_on: bool, rcs_mode_active: bool) {
        let was_on = self.core.engines_on();
        self.core.set_engines(engines_on);
        if engines_on && !was_on {
            self.events.on_engines_started(self.id());
        } else if !engines_on && was_on {
            self.events.on_engines_stopped(self.id());
        }
        self.rcs_mode_active = rcs_mode_active;
    }

    /// Plays a thruster burn, either predicted locally or echoed by the
    /// server. The second sighting of a timestamp is dropped.
    pub fn apply_rcs_burn(
        &mut self,
        direction: Orientation,
        timestamp: f64,
        probe: &dyn CollisionProbe,
    ) -> Result<(), Rejection> {
        let result = self.core.move_via_rcs(direction, timestamp, None, probe);
        if let Err(rejection) = &result {
            if rejection.is_replay() {
                self.stats.duplicates += 1;
            }
            debug!("Mover {} skipped burn at {}: {}", self.id(), timestamp, rejection);
        }
        result
    }

    /// Records a tile arrival reported by the server and corrects playback
    /// speed when this client has drifted from it.
    pub fn receive_server_history_node(&mut self, node: HistoryNode) {
        if self
            .server_history
            .iter()
            .any(|known| known.timestamp == node.timestamp)
        {
            self.stats.duplicates += 1;
            return;
        }
        self.server_history.push(node);

        if self.server_motion.is_moving_at_speed() && self.core.is_cruising() {
            self.compensate_lag(node);
        }
        if !self.server_motion.is_moving || !self.core.engines_on() {
            self.record_rest(node.position, node.timestamp);
        }
    }

    /// Speeds the client up while it has not reached the server's tile yet.
    /// Clients that already passed it are left alone.
    fn compensate_lag(&mut self, node: HistoryNode) {
        let flying = self.core.facing().flying_direction.vector();
        let here = self.core.transform().position;
        let gap = node.position.to_vector().sub(&here).dot(&flying.to_vector());
        self.last_gap = gap;

        let reached = self
            .core
            .move_nodes()
            .history()
            .find_at(node.position)
            .is_some_and(|own| own.direction == node.direction);
        if reached {
            return;
        }

        // one tile may still be in flight while the push was on the wire
        let tiles_behind = (node.position - self.core.resting_tile()).dot(flying);
        if tiles_behind as f32 <= LAG_TOLERANCE_TILES {
            return;
        }

        let speed = self.server_motion.speed;
        let tiles_per_second = self
            .server_history
            .tiles_per_second()
            .filter(|rate| *rate > 0.0)
            .unwrap_or(speed);
        // close the gap over roughly one second of server travel
        let seconds_per_tile = 1.0 / tiles_per_second.max(f32::EPSILON);
        let adjustment = clamp_speed_adjustment(gap / seconds_per_tile, speed);

        debug!(
            "Mover {} is {:.2} tiles behind the server, adjusting speed by {:.2}",
            self.id(),
            gap,
            adjustment
        );
        self.core.queue_speed_adjustment(adjustment);
        self.stats.lag_adjustments += 1;
    }

    fn record_rest(&mut self, position: TilePos, at: f64) {
        if at < self.server_rest.at {
            return;
        }
        self.server_rest = ServerRest { position, at };
        self.rest_check_pending = true;
        self.reconcile_rest();
    }

    fn is_settled(&self) -> bool {
        self.core.phase() == Phase::Idle
            && self.core.burn_state() == BurnState::Idle
            && !self.core.is_cruising()
    }

    /// Once both sides are at rest the client adopts the server's tile.
    fn reconcile_rest(&mut self) {
        if !self.rest_check_pending || !self.is_settled() || self.server_motion.is_moving {
            return;
        }
        self.rest_check_pending = false;

        let server_tile = self.server_rest.position;
        if self.core.resting_tile() != server_tile {
            info!(
                "Mover {} settled on {} but server rests on {}, correcting",
                self.id(),
                self.core.resting_tile(),
                server_tile
            );
            self.core.teleport(server_tile);
            self.stats.rest_snaps += 1;
        }
    }

    /// Routes a push addressed to this mover. Returns false for pushes that
    /// were dropped or are not handled by the view.
    pub fn apply_push(&mut self, push: Push, probe: &dyn CollisionProbe) -> bool {
        match push {
            Push::FacingStateSync(facing) => self.apply_facing_update(facing),
            Push::MotionStateSync(motion) => self.apply_motion_update(motion),
            Push::Teleported(motion) => self.apply_teleport(motion),
            Push::HistoryNodeBroadcast(node) => {
                self.receive_server_history_node(node);
                true
            }
            Push::OperationalStateSync {
                engines_on,
                rcs_mode_active,
            } => {
                self.apply_operational(engines_on, rcs_mode_active);
                true
            }
            Push::RcsBurnBroadcast {
                direction,
                timestamp,
            } => self.apply_rcs_burn(direction, timestamp, probe).is_ok(),
            Push::Spawned { .. } | Push::Notice { .. } => false,
        }
    }

    pub fn tick(&mut self, dt: f32, now: f64, probe: &dyn CollisionProbe) -> TickReport {
        let report = self.core.tick(dt, now, probe, self.events.as_mut());
        if report.rotation_completed {
            self.pending_initial_rotation = false;
        }
        if report.arrival.is_some() || report.rotation_completed {
            self.reconcile_rest();
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{
        EventRecorder, MoverEvent, OpenSpace, RotationPhase, TileGrid, ROTATION_DURATION,
    };

    const DT: f32 = 0.05;

    fn view() -> (ClientMover, EventRecorder) {
        let recorder = EventRecorder::new();
        let view = ClientMover::new(
            1,
            MoverConfig::default(),
            TilePos::ZERO,
            Box::new(recorder.clone()),
        );
        (view, recorder)
    }

    fn facing(direction: Orientation, at: f64) -> FacingState {
        FacingState {
            facing_direction: direction,
            flying_direction: direction,
            rotation_duration: ROTATION_DURATION,
            facing_changed_at: at,
        }
    }

    fn motion(speed: f32, at: f64) -> MotionState {
        MotionState {
            is_moving: speed > 0.0,
            speed,
            position: TilePos::ZERO,
            speed_changed_at: at,
            interactee: None,
        }
    }

    fn rotation_starts(recorder: &EventRecorder) -> usize {
        recorder.count(|e| matches!(e, MoverEvent::Rotate(info) if info.phase == RotationPhase::Start))
    }

    fn run(view: &mut ClientMover, ticks: u32) {
        for i in 0..ticks {
            view.tick(DT, i as f64 * DT as f64, &OpenSpace);
        }
    }

    #[test]
    fn test_first_facing_update_rotates_instantly() {
        let (mut view, _) = view();
        assert!(!view.is_initialized());

        assert!(view.apply_facing_update(facing(Orientation::Left, 1.0)));
        assert!(view.is_initialized());
        assert_eq!(view.facing().facing_direction, Orientation::Left);
        assert_eq!(view.core().phase(), Phase::Idle);
        assert_approx_eq!(view.core().transform().rotation, 270.0);
    }

    #[test]
    fn test_duplicate_facing_update_fires_once() {
        let (mut view, recorder) = view();
        view.apply_facing_update(facing(Orientation::Up, 1.0));
        recorder.clear();

        let update = facing(Orientation::Right, 2.0);
        assert!(view.apply_facing_update(update));
        assert!(!view.apply_facing_update(update));

        assert_eq!(rotation_starts(&recorder), 1);
        assert_eq!(view.stats().duplicates, 1);
    }

    #[test]
    fn test_out_of_order_update_does_not_revert() {
        let (mut view, _) = view();
        view.apply_facing_update(facing(Orientation::Up, 1.0));

        assert!(view.apply_facing_update(facing(Orientation::Down, 5.0)));
        assert!(!view.apply_facing_update(facing(Orientation::Left, 3.0)));

        assert_eq!(view.server_facing().facing_direction, Orientation::Down);
        assert_eq!(view.facing().facing_direction, Orientation::Down);
        assert_eq!(view.stats().stale, 1);
    }

    #[test]
    fn test_motion_edges_fire_once() {
        let (mut view, recorder) = view();
        view.apply_motion_update(motion(5.0, 1.0));
        view.apply_motion_update(motion(5.0, 1.0));
        view.apply_motion_update(motion(8.0, 2.0));
        view.apply_motion_update(motion(0.0, 3.0));

        assert_eq!(
            recorder.count(|e| matches!(e, MoverEvent::StartMovement)),
            1
        );
        assert_eq!(
            recorder.count(|e| matches!(e, MoverEvent::StopMovement)),
            1
        );
        assert_eq!(
            recorder.count(|e| matches!(e, MoverEvent::SpeedChange { .. })),
            3
        );
    }

    #[test]
    fn test_cruise_follows_server_motion() {
        let (mut view, _) = view();
        view.apply_operational(true, false);
        view.apply_motion_update(motion(5.0, 1.0));

        run(&mut view, 20);
        assert!(view.motion().position.y >= 4);
        assert_eq!(view.motion().position.x, 0);
    }

    #[test]
    fn test_lagging_client_speeds_up() {
        let (mut view, _) = view();
        view.apply_operational(true, false);
        view.apply_motion_update(motion(5.0, 1.0));

        view.receive_server_history_node(HistoryNode {
            position: TilePos::new(0, 3),
            timestamp: 2.0,
            direction: Orientation::Up,
        });

        assert!(view.is_lagging());
        assert_approx_eq!(view.lag_behind_server(), 3.0);
        let adjustment = view.core().pending_adjustment().unwrap();
        assert!(adjustment > 0.0);
        assert_eq!(view.stats().lag_adjustments, 1);
    }

    #[test]
    fn test_leading_client_keeps_speed() {
        let (mut view, _) = view();
        view.apply_operational(true, false);
        view.apply_motion_update(motion(5.0, 1.0));
        run(&mut view, 60);

        view.receive_server_history_node(HistoryNode {
            position: TilePos::new(0, 1),
            timestamp: 2.0,
            direction: Orientation::Up,
        });

        assert!(view.lag_behind_server() < 0.0);
        assert!(!view.is_lagging());
        assert_eq!(view.core().pending_adjustment(), None);
        assert_eq!(view.stats().lag_adjustments, 0);
    }

    #[test]
    fn test_client_in_step_with_server_keeps_speed() {
        let (mut view, _) = view();
        view.apply_operational(true, false);
        view.apply_motion_update(motion(20.0, 1.0));

        // one tile per tick at speed 20; every push lands as the client
        // arrives on the same tile or is one step short of it
        for i in 1..=10 {
            view.tick(DT, i as f64 * DT as f64, &OpenSpace);
            let reached = view.core().resting_tile();
            view.receive_server_history_node(HistoryNode {
                position: reached,
                timestamp: 1.0 + i as f64 * DT as f64,
                direction: Orientation::Up,
            });
            view.receive_server_history_node(HistoryNode {
                position: reached + TilePos::new(0, 1),
                timestamp: 1.01 + i as f64 * DT as f64,
                direction: Orientation::Up,
            });
        }

        assert_eq!(view.core().pending_adjustment(), None);
        assert_eq!(view.stats().lag_adjustments, 0);
    }

    #[test]
    fn test_close_client_keeps_speed() {
        let (mut view, _) = view();
        view.apply_operational(true, false);
        view.apply_motion_update(motion(5.0, 1.0));

        view.receive_server_history_node(HistoryNode {
            position: TilePos::ZERO,
            timestamp: 2.0,
            direction: Orientation::Up,
        });
        assert!(!view.is_lagging());
        assert_eq!(view.core().pending_adjustment(), None);
    }

    #[test]
    fn test_clamp_speed_adjustment() {
        assert_eq!(clamp_speed_adjustment(500.0, 5.0), MAX_SPEED_ADJUSTMENT);
        assert_eq!(clamp_speed_adjustment(-10.0, 5.0), -3.0);
        // slow movers are never pushed below their own speed
        assert_eq!(clamp_speed_adjustment(-1.0, 1.0), 0.0);
        assert_eq!(clamp_speed_adjustment(0.5, 1.0), 0.5);
    }

    #[test]
    fn test_echoed_burn_is_dropped() {
        let (mut view, _) = view();
        view.apply_operational(false, true);

        assert!(view
            .apply_rcs_burn(Orientation::Right, 4.0, &OpenSpace)
            .is_ok());
        assert!(!view.apply_push(
            Push::RcsBurnBroadcast {
                direction: Orientation::Right,
                timestamp: 4.0,
            },
            &OpenSpace
        ));

        run(&mut view, 40);
        assert_eq!(view.motion().position, TilePos::new(1, 0));
    }

    #[test]
    fn test_blocked_prediction_accepts_server_burn() {
        let (mut view, _) = view();
        view.apply_operational(false, true);
        let walled = TileGrid::with_walls([TilePos::new(1, 0)]);

        assert_eq!(
            view.apply_rcs_burn(Orientation::Right, 4.0, &walled),
            Err(Rejection::Blocked)
        );
        assert!(view.apply_push(
            Push::RcsBurnBroadcast {
                direction: Orientation::Right,
                timestamp: 4.0,
            },
            &OpenSpace
        ));

        run(&mut view, 40);
        assert_eq!(view.motion().position, TilePos::new(1, 0));
    }

    #[test]
    fn test_settled_client_adopts_server_rest_tile() {
        let (mut view, _) = view();
        view.apply_motion_update(motion(0.0, 1.0));

        view.receive_server_history_node(HistoryNode {
            position: TilePos::new(2, 0),
            timestamp: 3.0,
            direction: Orientation::Right,
        });

        assert_eq!(view.core().resting_tile(), TilePos::new(2, 0));
        assert_eq!(view.stats().rest_snaps, 1);
    }

    #[test]
    fn test_rest_check_waits_for_step_to_finish() {
        let (mut view, _) = view();
        view.apply_operational(false, true);
        view.apply_rcs_burn(Orientation::Up, 1.0, &OpenSpace).unwrap();

        // server already finished the same burn
        view.receive_server_history_node(HistoryNode {
            position: TilePos::new(0, 1),
            timestamp: 2.0,
            direction: Orientation::Up,
        });
        assert_eq!(view.core().resting_tile(), TilePos::ZERO);

        run(&mut view, 40);
        assert_eq!(view.core().resting_tile(), TilePos::new(0, 1));
        assert_eq!(view.stats().rest_snaps, 0);
    }

    #[test]
    fn test_teleport_moves_view() {
        let (mut view, _) = view();
        let mut update = motion(0.0, 2.0);
        update.position = TilePos::new(-4, 7);

        assert!(view.apply_push(Push::Teleported(update), &OpenSpace));
        assert_eq!(view.core().resting_tile(), TilePos::new(-4, 7));
        assert!(!view.apply_push(Push::Teleported(update), &OpenSpace));
    }

    #[test]
    fn test_operational_edges() {
        let (mut view, recorder) = view();
        view.apply_operational(true, false);
        view.apply_operational(true, false);
        view.apply_operational(false, false);

        assert_eq!(
            recorder.count(|e| matches!(e, MoverEvent::EnginesStarted)),
            1
        );
        assert_eq!(
            recorder.count(|e| matches!(e, MoverEvent::EnginesStopped)),
            1
        );
    }
}
