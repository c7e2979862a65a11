//! Logical messages exchanged over the datagram transport.

use crate::config::MoverConfig;
use crate::orientation::{Orientation, TilePos};
use crate::state::{FacingState, HistoryNode, MotionState};
use crate::{ClientId, MoverId};
use serde::{Deserialize, Serialize};

/// Client intents. The server re-validates every one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Rotate {
        facing_direction: Orientation,
        timestamp: f64,
    },
    Speed {
        speed: f32,
        timestamp: f64,
    },
    /// Advisory only.
    Stop {
        proposed_stop_tile: TilePos,
    },
    RcsMove {
        direction: Orientation,
        timestamp: f64,
    },
    Engines {
        on: bool,
    },
    RcsMode {
        on: bool,
    },
    Autopilot {
        target: Option<TilePos>,
    },
}

impl Command {
    pub fn timestamp(&self) -> Option<f64> {
        match self {
            Command::Rotate { timestamp, .. }
            | Command::Speed { timestamp, .. }
            | Command::RcsMove { timestamp, .. } => Some(*timestamp),
            _ => None,
        }
    }
}

/// State the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Push {
    Spawned {
        config: MoverConfig,
        position: TilePos,
    },
    FacingStateSync(FacingState),
    MotionStateSync(MotionState),
    /// Motion snapshot after a manual position set; followers jump to it.
    Teleported(MotionState),
    HistoryNodeBroadcast(HistoryNode),
    OperationalStateSync {
        engines_on: bool,
        rcs_mode_active: bool,
    },
    RcsBurnBroadcast {
        direction: Orientation,
        timestamp: f64,
    },
    /// User-visible message for the requesting player.
    Notice {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Connected {
        client_id: ClientId,
    },
    Disconnect,
    Disconnected {
        reason: String,
    },

    Ping {
        client_time: f64,
    },
    Pong {
        client_time: f64,
        server_time: f64,
    },

    Command {
        mover_id: MoverId,
        command: Command,
    },
    Push {
        mover_id: MoverId,
        push: Push,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_serialization_command() {
        let packet = Packet::Command {
            mover_id: 3,
            command: Command::RcsMove {
                direction: Orientation::Left,
                timestamp: 12.5,
            },
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();
        assert_eq!(deserialized, packet);
    }

    #[test]
    fn test_packet_serialization_facing_sync() {
        let facing = FacingState {
            facing_direction: Orientation::Right,
            flying_direction: Orientation::Right,
            rotation_duration: 2.0,
            facing_changed_at: 99.25,
        };
        let packet = Packet::Push {
            mover_id: 1,
            push: Push::FacingStateSync(facing),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        match bincode::deserialize::<Packet>(&serialized).unwrap() {
            Packet::Push {
                mover_id,
                push: Push::FacingStateSync(received),
            } => {
                assert_eq!(mover_id, 1);
                assert_eq!(received, facing);
            }
            other => panic!("Wrong packet type after deserialization: {:?}", other),
        }
    }

    #[test]
    fn test_spawn_packet_fits_receive_buffer() {
        let packet = Packet::Push {
            mover_id: 1,
            push: Push::Spawned {
                config: MoverConfig::default().with_hull(5, 9),
                position: TilePos::new(-40, 12),
            },
        };
        let serialized = bincode::serialize(&packet).unwrap();
        assert!(serialized.len() < crate::MAX_PACKET_SIZE);
    }

    #[test]
    fn test_command_timestamps() {
        assert_eq!(
            Command::Speed {
                speed: 1.0,
                timestamp: 4.0
            }
            .timestamp(),
            Some(4.0)
        );
        assert_eq!(
            Command::Stop {
                proposed_stop_tile: TilePos::ZERO
            }
            .timestamp(),
            None
        );
    }
}
