use crate::bot::ScriptedPlayer;
use crate::mirror::ClientMirror;
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{Packet, Request, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    join_code: String,
    sequence: u32,
    fake_ping_ms: u64,

    mirror: ClientMirror,
    player: ScriptedPlayer,
    decision_interval: Duration,
}

impl Client {
    /// `join_code` must already be normalized
    pub async fn new(
        server_addr: SocketAddr,
        join_code: String,
        player: ScriptedPlayer,
        decision_interval: Duration,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;

        let mut mirror = ClientMirror::new();
        mirror.subscribe(|packet, mirror| match packet {
            Packet::LivesChanged {
                client_id, current, ..
            } => info!("Player {} has {} lives", client_id, current),
            Packet::ItemChanged {
                client_id, current, ..
            } => info!("Player {} now holds {}", client_id, current),
            Packet::GameOverChanged { is_game_over: true } => match mirror.winner() {
                Some(winner) => info!("Game over, player {} wins", winner),
                None => info!("Game over, draw"),
            },
            Packet::BoostActivated {
                client_id,
                multiplier,
                duration_ms,
            } => info!(
                "Player {} boosting x{} for {}ms",
                client_id, multiplier, duration_ms
            ),
            _ => {}
        });

        Ok(Client {
            socket,
            server_addr,
            join_code,
            sequence: 0,
            fake_ping_ms,
            mirror,
            player,
            decision_interval,
        })
    }

    pub fn mirror(&self) -> &ClientMirror {
        &self.mirror
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to {} with code {}...", self.server_addr, self.join_code);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            join_code: self.join_code.clone(),
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

    async fn send_request(&mut self, request: Request) -> Result<(), Box<dyn std::error::Error>> {
        self.sequence += 1;
        let packet = Packet::Request {
            sequence: self.sequence,
            request,
        };
        self.send_packet(&packet).await
    }

    /// Runs until the authority disconnects us or Ctrl+C
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut heartbeat_interval = interval(Duration::from_secs(1));
        let mut decision_interval = interval(self.decision_interval);
        let mut buffer = [0u8; 2048];
        let mut was_connected = false;

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => {
                                    self.mirror.apply(&packet);
                                    if let Packet::Disconnected { reason } = packet {
                                        warn!("Server closed the connection: {}", reason);
                                        break;
                                    }
                                    was_connected |= self.mirror.is_connected();
                                }
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if was_connected {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },

                _ = decision_interval.tick() => {
                    if let Some(request) = self.player.next_request(&self.mirror) {
                        if let Err(e) = self.send_request(request).await {
                            error!("Error sending request: {}", e);
                        }
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, leaving session");
                    break;
                },
            }
        }

        if self.mirror.is_connected() {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
