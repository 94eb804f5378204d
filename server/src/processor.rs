//! Authenticated processing of world-change packets
//!
//! Every world-change packet goes through the same three steps:
//! authenticate the sender, apply the change to the [`StateStore`], then hand
//! the packet unchanged to the broadcaster for everyone but the sender.
//! Applying is unconditional; no plausibility checks are made on amounts.

use crate::broadcaster::Broadcaster;
use crate::client_manager::Player;
use crate::state_store::StateStore;
use log::{debug, info};
use shared::Packet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("{kind} packet has no authenticated sender")]
    Unauthenticated { kind: &'static str },
    #[error("{kind} packet is not handled by the processor")]
    UnexpectedPacket { kind: &'static str },
}

pub struct PacketProcessor<B> {
    store: Arc<StateStore>,
    broadcaster: B,
}

impl<B: Broadcaster> PacketProcessor<B> {
    pub fn new(store: Arc<StateStore>, broadcaster: B) -> Self {
        Self { store, broadcaster }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn broadcaster(&self) -> &B {
        &self.broadcaster
    }

    /// Single entry point for every received world-change packet.
    pub fn process(&self, packet: &Packet, sender: Option<&Player>) -> Result<(), ProcessError> {
        let player = sender.ok_or(ProcessError::Unauthenticated {
            kind: packet.kind(),
        })?;

        // The store lock is taken and released inside apply; the broadcast
        // below never runs under it.
        self.apply(packet, player)?;
        self.broadcaster.send_to_others(packet, player);
        Ok(())
    }

    fn apply(&self, packet: &Packet, player: &Player) -> Result<(), ProcessError> {
        match packet {
            Packet::PiecePlaced { id, signature } => {
                info!("Player {} placed piece {}", player.id, id);
                self.store.place(id, *signature);
            }
            Packet::ConstructionAmountChanged { id, amount } => {
                debug!("Construction changed {} {} by player {}", id, amount, player.id);
                self.store.set_amount(id, *amount);
            }
            Packet::ConstructionCompleted { id } => {
                info!("Construction completed {} by player {}", id, player.id);
                self.store.set_amount(id, 1.0);
            }
            Packet::DeconstructionCompleted { id } => {
                info!("Deconstruction completed {} by player {}", id, player.id);
                self.store.remove(id);
            }
            other => {
                return Err(ProcessError::UnexpectedPacket { kind: other.kind() });
            }
        }
        Ok(())
    }
}
