//! # Mover Client Library
//!
//! Follower side of the mover synchronization. The client mirrors every
//! mover the server announces, dead-reckons it between pushes with the shared
//! tick logic and turns operator console lines into command requests.
//!
//! ## Module Organization
//!
//! ### View (`view`)
//! [`view::ClientMover`], the reconciliation engine: timestamp deduplication
//! of pushes, edge-triggered events, lag compensation through a transient
//! speed adjustment, and the rest-tile correction once both sides stop.
//!
//! ### Clock (`clock`)
//! Smoothed estimate of the server's network time from ping/pong samples.
//! Commands are stamped with it.
//!
//! ### Console (`console`)
//! Parsing of operator lines into maneuvers.
//!
//! ### Stats (`stats`)
//! Round-trip samples and correction counters, logged periodically.
//!
//! ### Network (`network`)
//! UDP socket loop with optional simulated latency, loss and duplication.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, Impairment};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 50ms fake ping, 5% loss, 5% duplicated datagrams, 60Hz local tick
//!     let impairment = Impairment::new(0.05, 0.05);
//!     let mut client = Client::new("127.0.0.1:8080", 50, impairment, 60).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod console;
pub mod network;
pub mod stats;
pub mod view;
