//! # Construction Client Library
//!
//! This library provides a headless participant for shared base building. It
//! keeps a local, non-authoritative mirror of every constructible piece,
//! reports local construction progress to the server, and applies progress
//! made by other players.
//!
//! ## Architecture Overview
//!
//! ### Deterministic Identity
//! Pieces have no id of their own. Each one is identified by a hash of its
//! spawn transform, so every client that spawns the same piece at the same
//! spot derives the same id. When the server announces a piece under a
//! different id, the local object is moved over to it.
//!
//! ### Echo Suppression
//! The change observer fires for every amount change, including the ones
//! applied from the network. Values received from the server are remembered
//! per id, and observing one of them again sends nothing back. Completion
//! packets are only ever produced by the client that made the final step.
//!
//! ## Module Organization
//!
//! ### World Module (`world`)
//! Object lifecycle and the session's identity registry:
//! - Spawning attaches an identity, destroying detaches it
//! - Lookup of live objects by id
//! - Adoption of server-supplied ids
//!
//! ### Building Module (`building`)
//! The construction change observer and remote application of world packets.
//!
//! ### Builder Module (`builder`)
//! A scripted player that places and constructs (or deconstructs) one piece.
//!
//! ### Network Module (`network`)
//! UDP connection to the server, handshake, heartbeat and the main loop.
//!
//! ## Usage Example
//!
//! ```rust
//! use client::building::Building;
//! use shared::{Packet, SpatialSignature};
//!
//! let mut building = Building::new();
//!
//! // Place a piece and build it up locally
//! let (handle, placed) = building.place(SpatialSignature::at(4.0, 0.0, 2.0));
//! let progress = building.construct(handle, 0.5);
//! assert_eq!(placed.len() + progress.len(), 2);
//!
//! // A change forwarded from another player is applied without echoing it back
//! let id = building.world().identity(handle).unwrap();
//! let echo = building.apply_remote(&Packet::ConstructionAmountChanged { id, amount: 0.8 });
//! assert!(echo.is_empty());
//! ```

pub mod builder;
pub mod building;
pub mod network;
pub mod world;
