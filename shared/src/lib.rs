//! Movement core shared by the authoritative server and every client.
//!
//! Both roles run the same [`MoverCore`] tick logic; the server mutates the
//! authoritative [`FacingState`]/[`MotionState`] and clients mirror them from
//! the pushes described in [`protocol`].

pub mod clock;
pub mod collision;
pub mod config;
pub mod dedup;
pub mod error;
pub mod events;
pub mod move_nodes;
pub mod orientation;
pub mod protocol;
pub mod scheduler;
pub mod state;

pub use clock::{ManualClock, NetworkClock, SystemClock};
pub use collision::{CollisionProbe, OpenSpace, TileGrid};
pub use config::MoverConfig;
pub use dedup::TimestampWindow;
pub use error::Rejection;
pub use events::{
    fire_motion_edges, EventRecorder, LogEvents, MoverEvent, MoverEvents, NetworkSide, NoEvents,
    RotationInfo, RotationPhase,
};
pub use move_nodes::{HistoryRing, MoveNodes};
pub use orientation::{Orientation, RotationOffset, TilePos, Vector2};
pub use protocol::{Command, Packet, Push};
pub use scheduler::{BurnState, MoverCore, Phase, TickReport, Transform};
pub use state::{FacingState, HistoryNode, MotionState, PendingCommand};

pub type ClientId = u32;
pub type MoverId = u32;

pub const CLIENT_VERSION: u32 = 1;
pub const MAX_PACKET_SIZE: usize = 2048;

pub const DEFAULT_MAX_SPEED: f32 = 20.0;
/// Rotation lerp rate used by steering commands.
pub const ROTATION_DURATION: f32 = 2.0;
pub const HISTORY_CAPACITY: usize = 8;
pub const DEDUP_WINDOW: usize = 60;
pub const MOVE_NODE_LOOKAHEAD: usize = 16;
/// Tiles per second of a burn while main engines are idle.
pub const BURN_SPEED: f32 = 1.0;
pub const MAX_SPEED_ADJUSTMENT: f32 = 200.0;
/// Lowest playback speed a negative adjustment may slow a mover to.
pub const MIN_ADJUSTED_SPEED: f32 = 2.0;
/// Gap, in tiles, between client and server before playback is corrected.
pub const LAG_TOLERANCE_TILES: f32 = 1.0;
pub const AUTOPILOT_PERIOD: f64 = 1.0;
pub const AUTOPILOT_ACCURACY: f32 = 1.0;
