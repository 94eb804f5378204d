use crate::builder::{BuildPlan, Builder};
use crate::building::Building;
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    player_name: String,
    player_id: Option<u32>,
    connected: bool,

    building: Building,

    fake_ping_ms: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        player_name: &str,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            player_name: player_name.to_string(),
            player_id: None,
            connected: false,
            building: Building::new(),
            fake_ping_ms,
        })
    }

    pub fn building(&self) -> &Building {
        &self.building
    }

    pub fn player_id(&self) -> Option<u32> {
        self.player_id
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server as '{}'...", self.player_name);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            player_name: self.player_name.clone(),
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn send_all(&self, packets: Vec<Packet>) {
        for packet in packets {
            if let Err(e) = self.send_packet(&packet).await {
                error!("Error sending {}: {}", packet.kind(), e);
            }
        }
    }

    async fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { player_id } => {
                info!("Connected! Player ID: {}", player_id);
                self.player_id = Some(player_id);
                self.connected = true;
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.player_id = None;
            }

            Packet::PlayerLeft { player_id } => {
                info!("Player {} left", player_id);
            }

            packet => {
                let echo = self.building.apply_remote(&packet);
                if !echo.is_empty() {
                    warn!(
                        "Applying remote {} produced {} outbound packets",
                        packet.kind(),
                        echo.len()
                    );
                }
                self.send_all(echo).await;
            }
        }
    }

    /// Connects, then advances `plan` every `tick` until Ctrl+C.
    pub async fn run(
        &mut self,
        plan: BuildPlan,
        tick: Duration,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut builder = Builder::new(plan);
        let mut rng = StdRng::from_entropy();

        let mut build_interval = interval(tick);
        let mut heartbeat_interval = interval(Duration::from_secs(1));

        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => self.handle_packet(packet).await,
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = build_interval.tick() => {
                    if self.connected && !builder.is_finished() {
                        let packets = builder.tick(&mut self.building, &mut rng);
                        self.send_all(packets).await;

                        if builder.is_finished() {
                            info!("Build plan finished");
                        }
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        self.send_all(vec![Packet::Heartbeat]).await;
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, disconnecting...");
                    break;
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
