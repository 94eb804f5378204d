//! # Construction Server Library
//!
//! This library provides the authoritative server for shared base building.
//! It owns the canonical construction state of every placed piece, checks that
//! each change comes from a connected player, and forwards accepted changes to
//! everyone else.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! The server keeps the construction amount of every piece, keyed by the
//! piece's deterministic id. Late joiners receive a snapshot of it. Amounts are
//! stored exactly as received: last write wins and no range checks are made.
//!
//! ### Session Management
//! Handles the lifecycle of player sessions:
//! - `Connect` handshake with protocol version check
//! - Address-bound authentication of every later packet
//! - Disconnection and timeout cleanup, announced to remaining players
//!
//! ### Change Propagation
//! Every accepted world change is forwarded unchanged to all connected players
//! except the one who sent it. The sender already applied it locally and must
//! not see it twice.
//!
//! ## Architecture Design
//!
//! ### Single Processing Loop
//! Packets are decoded on a receiver task and handed over a FIFO channel to
//! one processing loop. Packets from one connection are therefore applied and
//! rebroadcast in arrival order. Outgoing packets go through a second FIFO
//! channel to a sender task, so socket writes never run under the store or
//! roster locks.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Player sessions, timeouts and the `AuthProvider` used to attribute packets.
//!
//! ### State Store Module (`state_store`)
//! The authoritative per-piece construction amounts.
//!
//! ### Processor Module (`processor`)
//! The authenticate → apply → rebroadcast pipeline for world-change packets.
//!
//! ### Broadcaster Module (`broadcaster`)
//! Recipient selection and the channel feeding the network sender task.
//!
//! ### Network Module (`network`)
//! UDP socket handling, the session handshake and the main server loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind to the address, allow 16 players, drop players silent for 5s
//!     let mut server = Server::new("127.0.0.1:8080", 16, Duration::from_secs(5)).await?;
//!
//!     // Runs until a Shutdown message is sent through `server.handle()`
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcaster;
pub mod client_manager;
pub mod network;
pub mod processor;
pub mod state_store;
