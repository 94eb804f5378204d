//! Fan-out of packets to connected players
//!
//! Recipients are resolved from the client roster when a packet is queued,
//! so a session that connects or reconnects afterwards never receives it.
//! The socket writes happen later on the network sender task.

use crate::client_manager::{ClientManager, Player};
use log::error;
use shared::Packet;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

/// Messages queued for the network sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        recipients: Vec<SocketAddr>,
    },
}

pub trait Broadcaster {
    /// Delivers `packet` to every connected player except `origin`.
    fn send_to_others(&self, packet: &Packet, origin: &Player);

    /// Delivers `packet` to every connected player.
    fn send_to_all(&self, packet: &Packet);
}

/// Queues packets on the sender task's channel; never blocks on I/O.
///
/// Takes a read lock on the roster, so it must not be called while the
/// caller holds the write lock.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    clients: Arc<RwLock<ClientManager>>,
}

impl ChannelBroadcaster {
    pub fn new(
        outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
        clients: Arc<RwLock<ClientManager>>,
    ) -> Self {
        Self {
            outbound_tx,
            clients,
        }
    }

    /// Unicast, used for handshake replies and snapshots.
    pub fn send_to(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.outbound_tx.send(OutboundMessage::SendPacket {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn queue_broadcast(&self, packet: &Packet, exclude: Option<SocketAddr>) {
        let recipients = {
            let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
            select_recipients(&clients.get_client_addrs(), exclude)
        };

        if recipients.is_empty() {
            return;
        }

        if let Err(e) = self.outbound_tx.send(OutboundMessage::BroadcastPacket {
            packet: packet.clone(),
            recipients,
        }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }
}

impl Broadcaster for ChannelBroadcaster {
    // Excluded by address: a reconnect keeps the address but not the id
    fn send_to_others(&self, packet: &Packet, origin: &Player) {
        self.queue_broadcast(packet, Some(origin.addr));
    }

    fn send_to_all(&self, packet: &Packet) {
        self.queue_broadcast(packet, None);
    }
}

/// Recipients of a broadcast: every connected address minus the excluded one.
pub fn select_recipients(
    clients: &[(u32, SocketAddr)],
    exclude: Option<SocketAddr>,
) -> Vec<SocketAddr> {
    clients
        .iter()
        .map(|(_, addr)| *addr)
        .filter(|addr| Some(*addr) != exclude)
        .collect()
}
