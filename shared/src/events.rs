//! Presentation hooks fired by a mover.
//!
//! Every mover owns its own observer, injected at construction; nothing is
//! shared between movers.

use crate::orientation::RotationOffset;
use crate::state::MotionState;
use crate::MoverId;
use log::{debug, info};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkSide {
    Server,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPhase {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationInfo {
    pub mover: MoverId,
    /// Offset from the facing held before the rotation began.
    pub offset: RotationOffset,
    pub side: NetworkSide,
    pub phase: RotationPhase,
}

/// Observer interface for rotation, movement and engine transitions.
pub trait MoverEvents: Send {
    fn on_rotate(&mut self, _info: RotationInfo) {}
    fn on_start_movement(&mut self, _mover: MoverId) {}
    fn on_stop_movement(&mut self, _mover: MoverId) {}
    fn on_speed_change(&mut self, _mover: MoverId, _old: f32, _new: f32) {}
    fn on_engines_started(&mut self, _mover: MoverId) {}
    fn on_engines_stopped(&mut self, _mover: MoverId) {}
}

/// Fires movement events for the edges between two motion snapshots only.
pub fn fire_motion_edges(
    mover: MoverId,
    old: &MotionState,
    new: &MotionState,
    events: &mut dyn MoverEvents,
) {
    if !old.is_moving && new.is_moving {
        events.on_start_movement(mover);
    }
    if old.is_moving && !new.is_moving {
        events.on_stop_movement(mover);
    }
    if old.speed != new.speed {
        events.on_speed_change(mover, old.speed, new.speed);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl MoverEvents for NoEvents {}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEvents;

impl MoverEvents for LogEvents {
    fn on_rotate(&mut self, info: RotationInfo) {
        debug!(
            "Mover {} rotation {:?} ({:?}, {:?} side)",
            info.mover, info.phase, info.offset, info.side
        );
    }

    fn on_start_movement(&mut self, mover: MoverId) {
        info!("Mover {} started moving", mover);
    }

    fn on_stop_movement(&mut self, mover: MoverId) {
        info!("Mover {} stopped moving", mover);
    }

    fn on_speed_change(&mut self, mover: MoverId, old: f32, new: f32) {
        info!("Mover {} speed {:.1} -> {:.1}", mover, old, new);
    }

    fn on_engines_started(&mut self, mover: MoverId) {
        info!("Mover {} engines started", mover);
    }

    fn on_engines_stopped(&mut self, mover: MoverId) {
        info!("Mover {} engines stopped", mover);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoverEvent {
    Rotate(RotationInfo),
    StartMovement,
    StopMovement,
    SpeedChange { old: f32, new: f32 },
    EnginesStarted,
    EnginesStopped,
}

/// Records events into a shared list so they can be inspected after the
/// recorder has been handed to a mover.
#[derive(Debug, Default, Clone)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<MoverEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MoverEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, matches: impl Fn(&MoverEvent) -> bool) -> usize {
        self.events().iter().filter(|e| matches(e)).count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    fn record(&self, event: MoverEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl MoverEvents for EventRecorder {
    fn on_rotate(&mut self, info: RotationInfo) {
        self.record(MoverEvent::Rotate(info));
    }

    fn on_start_movement(&mut self, _mover: MoverId) {
        self.record(MoverEvent::StartMovement);
    }

    fn on_stop_movement(&mut self, _mover: MoverId) {
        self.record(MoverEvent::StopMovement);
    }

    fn on_speed_change(&mut self, _mover: MoverId, old: f32, new: f32) {
        self.record(MoverEvent::SpeedChange { old, new });
    }

    fn on_engines_started(&mut self, _mover: MoverId) {
        self.record(MoverEvent::EnginesStarted);
    }

    fn on_engines_stopped(&mut self, _mover: MoverId) {
        self.record(MoverEvent::EnginesStopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_clones_share_events() {
        let recorder = EventRecorder::new();
        let mut handle: Box<dyn MoverEvents> = Box::new(recorder.clone());

        handle.on_start_movement(1);
        handle.on_speed_change(1, 0.0, 4.0);

        assert_eq!(recorder.events().len(), 2);
        assert_eq!(
            recorder.count(|e| matches!(e, MoverEvent::SpeedChange { .. })),
            1
        );

        recorder.clear();
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_motion_edges_fire_once() {
        let recorder = EventRecorder::new();
        let mut events = recorder.clone();
        let idle = MotionState::new(crate::TilePos::ZERO);
        let moving = MotionState {
            is_moving: true,
            speed: 5.0,
            ..idle
        };

        fire_motion_edges(1, &idle, &moving, &mut events);
        fire_motion_edges(1, &moving, &moving, &mut events);
        assert_eq!(
            recorder.events(),
            vec![
                MoverEvent::StartMovement,
                MoverEvent::SpeedChange { old: 0.0, new: 5.0 }
            ]
        );

        fire_motion_edges(1, &moving, &idle, &mut events);
        assert_eq!(recorder.count(|e| *e == MoverEvent::StopMovement), 1);
    }
}
