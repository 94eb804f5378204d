//! Server network layer handling UDP communications and session coordination

use crate::broadcaster::{Broadcaster, ChannelBroadcaster, OutboundMessage};
use crate::client_manager::{AuthProvider, ClientManager};
use crate::processor::PacketProcessor;
use crate::state_store::StateStore;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Pieces per `WorldState` packet, keeps snapshots under `MAX_PACKET_SIZE`
const SNAPSHOT_CHUNK: usize = 48;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { player_id: u32 },
    Shutdown,
}

/// Authoritative construction server
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    processor: PacketProcessor<ChannelBroadcaster>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_rx: Option<mpsc::UnboundedReceiver<OutboundMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_clients: usize,
        client_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let clients = Arc::new(RwLock::new(ClientManager::new(max_clients, client_timeout)));
        let store = Arc::new(StateStore::new());
        let processor = PacketProcessor::new(
            store,
            ChannelBroadcaster::new(outbound_tx, Arc::clone(&clients)),
        );

        Ok(Server {
            socket,
            clients,
            processor,
            server_tx,
            server_rx,
            outbound_rx: Some(outbound_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn store(&self) -> Arc<StateStore> {
        Arc::clone(self.processor.store())
    }

    // Roster guards are never held across an await or while broadcasting
    fn roster(&self) -> RwLockReadGuard<'_, ClientManager> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn roster_mut(&self) -> RwLockWriteGuard<'_, ClientManager> {
        self.clients.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sender that can stop `run` from another task.
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[0..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that drains the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let Some(mut outbound_rx) = self.outbound_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    OutboundMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, &[addr]).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutboundMessage::BroadcastPacket { packet, recipients } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, &recipients).await
                        {
                            error!("Failed to broadcast {}: {}", packet.kind(), e);
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = clients
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .check_timeouts();

                for player in timed_out {
                    info!("Player {} timed out", player.id);
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout {
                        player_id: player.id,
                    }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        recipients: &[SocketAddr],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        for &addr in recipients {
            if let Err(e) = socket.send_to(&data, addr).await {
                error!("Failed to send {} to {}: {}", packet.kind(), addr, e);
            }
        }
        Ok(())
    }

    async fn handle_connect(&self, client_version: u32, player_name: &str, addr: SocketAddr) {
        info!(
            "Player '{}' connecting from {} (version: {})",
            player_name, addr, client_version
        );
        let broadcaster = self.processor.broadcaster();

        if client_version != PROTOCOL_VERSION {
            let response = Packet::Disconnected {
                reason: format!(
                    "Version mismatch: server {}, client {}",
                    PROTOCOL_VERSION, client_version
                ),
            };
            broadcaster.send_to(&response, addr);
            return;
        }

        // A reconnect from the same address replaces the old session. The
        // others hear about it before the new session joins the roster.
        let replaced = {
            let mut clients = self.roster_mut();
            clients
                .find_client_by_addr(addr)
                .and_then(|existing_id| clients.remove_client(&existing_id))
        };
        if let Some(old) = replaced {
            info!("Replaced existing session {} from {}", old.id, addr);
            broadcaster.send_to_all(&Packet::PlayerLeft { player_id: old.id });
        }

        let player = self.roster_mut().add_client(addr, player_name);

        match player {
            Some(player) => {
                broadcaster.send_to(&Packet::Connected { player_id: player.id }, addr);

                let pieces = self.processor.store().snapshot();
                debug!("Sending {} pieces to player {}", pieces.len(), player.id);
                for chunk in pieces.chunks(SNAPSHOT_CHUNK) {
                    let snapshot = Packet::WorldState {
                        pieces: chunk.to_vec(),
                    };
                    broadcaster.send_to(&snapshot, addr);
                }
            }
            None => {
                let response = Packet::Disconnected {
                    reason: "Server full".to_string(),
                };
                broadcaster.send_to(&response, addr);
            }
        }
    }

    async fn handle_disconnect(&self, addr: SocketAddr) {
        let player = {
            let mut clients = self.roster_mut();
            clients
                .find_client_by_addr(addr)
                .and_then(|id| clients.remove_client(&id))
        };

        if let Some(player) = player {
            self.processor
                .broadcaster()
                .send_to_all(&Packet::PlayerLeft { player_id: player.id });
        }
    }

    /// Routes an incoming packet. Session packets are handled here, every
    /// other kind goes through the processor after authentication.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                player_name,
            } => self.handle_connect(client_version, &player_name, addr).await,

            Packet::Disconnect => self.handle_disconnect(addr).await,

            Packet::Heartbeat => {
                self.roster_mut().touch(addr);
            }

            packet => {
                let sender = {
                    let mut clients = self.roster_mut();
                    clients.touch(addr);
                    clients.authenticate(addr)
                };

                if let Err(e) = self.processor.process(&packet, sender.as_ref()) {
                    warn!("Dropped packet from {}: {}", addr, e);
                }
            }
        }
    }

    /// Main server loop, runs until a `Shutdown` message arrives
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::ClientTimeout { player_id } => {
                    self.processor
                        .broadcaster()
                        .send_to_all(&Packet::PlayerLeft { player_id });
                }
                ServerMessage::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
