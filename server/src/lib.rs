//! # Mover Server Library
//!
//! Authoritative side of the mover synchronization. The server owns the
//! canonical facing and motion state of every mover, validates client
//! requests against it and pushes the results back out to every client.
//!
//! ## Module Organization
//!
//! ### Client Manager (`client_manager`)
//! Connection tracking, timeouts and the per-client command buffer. Buffered
//! commands are drained in timestamp order once per tick.
//!
//! ### Game (`game`)
//! The world: every [`mover::ServerMover`] plus the obstacle grid used for
//! safety and rotation checks.
//!
//! ### Mover (`mover`)
//! Per-mover command handling: steering, speed, RCS bursts, engines, the
//! autopilot and move-for.
//!
//! ### Network (`network`)
//! UDP socket tasks and the fixed-rate simulation loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::GameState;
//! use server::network::Server;
//! use shared::{MoverConfig, TileGrid, TilePos};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut game = GameState::new(TileGrid::new());
//!     game.spawn_mover(MoverConfig::default(), TilePos::ZERO);
//!
//!     // 60Hz tick, at most 16 clients
//!     let mut server = Server::new("127.0.0.1:8080", Duration::from_millis(16), 16, game).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod autopilot;
pub mod client_manager;
pub mod game;
pub mod mover;
pub mod network;
