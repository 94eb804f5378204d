//! Player session tracking for the construction server
//!
//! This module handles the server-side bookkeeping of connected players:
//! - Session lifecycle (connect, disconnect, timeout)
//! - Address-based authentication of inbound packets
//! - Capacity limits and the address list used for broadcasting
//!
//! A packet is only attributed to a player if it arrives from the address
//! that completed the `Connect` handshake. Everything else is unauthenticated.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Authenticated principal attached to every processed packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub addr: SocketAddr,
}

/// Resolves the sender of a datagram to a live player.
pub trait AuthProvider {
    fn authenticate(&self, addr: SocketAddr) -> Option<Player>;
}

/// A connected player and its liveness state
#[derive(Debug)]
pub struct Client {
    pub player: Player,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(player: Player) -> Self {
        Self {
            player,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing arrived from this client within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Roster of connected players
///
/// Player ids start at 1 and are never reused within a server run, so a
/// stale id in a late packet can never alias a newer session.
#[derive(Debug)]
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Registers a new session. Returns None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, name: &str) -> Option<Player> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let player = Player {
            id: self.next_client_id,
            name: name.to_string(),
            addr,
        };
        self.next_client_id += 1;

        info!("Player {} ({}) connected from {}", player.id, player.name, addr);
        self.clients.insert(player.id, Client::new(player.clone()));

        Some(player)
    }

    pub fn remove_client(&mut self, client_id: &u32) -> Option<Player> {
        let client = self.clients.remove(client_id)?;
        info!("Player {} ({}) disconnected", client.player.id, client.player.name);
        Some(client.player)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.player.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Refreshes the liveness of whoever is connected from `addr`.
    pub fn touch(&mut self, addr: SocketAddr) -> bool {
        match self
            .clients
            .values_mut()
            .find(|client| client.player.addr == addr)
        {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Removes and returns every player silent for longer than the timeout.
    pub fn check_timeouts(&mut self) -> Vec<Player> {
        let timeout = self.timeout;
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .iter()
            .filter_map(|client_id| self.remove_client(client_id))
            .collect()
    }

    /// (player id, address) for every connected player.
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.player.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl AuthProvider for ClientManager {
    fn authenticate(&self, addr: SocketAddr) -> Option<Player> {
        self.find_client_by_addr(addr)
            .and_then(|id| self.clients.get(&id))
            .map(|client| client.player.clone())
    }
}
