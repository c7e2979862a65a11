use crate::mover::{Outbound, ServerMover};
use log::{debug, info};
use shared::{
    ClientId, Command, LogEvents, MoverConfig, MoverId, NetworkClock, Push, Rejection, TileGrid,
    TilePos, AUTOPILOT_ACCURACY,
};
use std::collections::BTreeMap;

/// Every mover on the server plus the obstacle grid they are checked against.
pub struct GameState {
    pub tick: u32,
    movers: BTreeMap<MoverId, ServerMover>,
    grid: TileGrid,
    next_mover_id: MoverId,
}

impl GameState {
    pub fn new(grid: TileGrid) -> Self {
        Self {
            tick: 0,
            movers: BTreeMap::new(),
            grid,
            next_mover_id: 1,
        }
    }

    pub fn spawn_mover(&mut self, config: MoverConfig, position: TilePos) -> MoverId {
        let id = self.next_mover_id;
        self.next_mover_id += 1;

        info!(
            "Spawned mover {} at {} facing {}",
            id, position, config.initial_facing
        );
        self.movers
            .insert(id, ServerMover::new(id, config, position, Box::new(LogEvents)));
        self.refresh_occupancy();
        id
    }

    pub fn mover(&self, id: MoverId) -> Option<&ServerMover> {
        self.movers.get(&id)
    }

    pub fn mover_mut(&mut self, id: MoverId) -> Option<&mut ServerMover> {
        self.movers.get_mut(&id)
    }

    pub fn mover_count(&self) -> usize {
        self.movers.len()
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut TileGrid {
        &mut self.grid
    }

    /// Routes a client request to the addressed mover.
    pub fn apply_command(
        &mut self,
        client: ClientId,
        mover_id: MoverId,
        command: Command,
        clock: &dyn NetworkClock,
    ) -> Result<(), Rejection> {
        let Some(mover) = self.movers.get_mut(&mover_id) else {
            return Err(Rejection::UnknownMover(mover_id));
        };
        let grid = &self.grid;

        match command {
            Command::Rotate {
                facing_direction,
                timestamp,
            } => mover.steer_to(facing_direction, Some(timestamp), grid, clock),
            Command::Speed { speed, timestamp } => {
                mover.set_speed(speed, Some(timestamp), Some(client), clock)
            }
            Command::Stop { proposed_stop_tile } => {
                mover.process_stop_request(client, proposed_stop_tile);
                Ok(())
            }
            Command::RcsMove {
                direction,
                timestamp,
            } => mover.process_rcs_move_request(client, direction, timestamp, grid),
            Command::Engines { on } => mover.toggle_engines(on, Some(client), clock),
            Command::RcsMode { on } => mover.toggle_rcs(on, client),
            Command::Autopilot {
                target: Some(target),
            } => {
                mover.autopilot_to(target, AUTOPILOT_ACCURACY, clock);
                Ok(())
            }
            Command::Autopilot { target: None } => {
                mover.disable_autopilot();
                Ok(())
            }
        }
    }

    fn refresh_occupancy(&mut self) {
        self.grid.clear_movers();
        for (id, mover) in &self.movers {
            for tile in mover.core().footprint() {
                self.grid.occupy(tile, *id);
            }
        }
    }

    /// Advances every mover by one tick.
    pub fn update(&mut self, dt: f32, clock: &dyn NetworkClock) {
        self.refresh_occupancy();
        for mover in self.movers.values_mut() {
            let report = mover.tick(dt, &self.grid, clock);
            if let Some(node) = report.arrival {
                debug!("Mover {} reached {}", mover.id(), node.position);
            }
        }
        self.tick = self.tick.wrapping_add(1);
    }

    /// Collects the pushes produced since the last call, in order.
    pub fn drain_outbound(&mut self) -> Vec<(MoverId, Outbound)> {
        let mut outbound = Vec::new();
        for (id, mover) in self.movers.iter_mut() {
            outbound.extend(mover.drain_outbox().into_iter().map(|o| (*id, o)));
        }
        outbound
    }

    /// Initial state for a client that just connected.
    pub fn snapshots(&self) -> Vec<(MoverId, Push)> {
        self.movers
            .iter()
            .flat_map(|(id, mover)| mover.snapshot().into_iter().map(move |push| (*id, push)))
            .collect()
    }

    pub fn release_client(&mut self, client: ClientId) {
        for mover in self.movers.values_mut() {
            mover.release_client(client);
        }
    }
}
