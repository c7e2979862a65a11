//! Server network layer handling UDP communications and the simulation loop

use crate::client_manager::ClientManager;
use crate::game::GameState;
use crate::mover::Audience;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    ClientId, NetworkClock, Packet, SystemClock, CLIENT_VERSION, MAX_PACKET_SIZE,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Longest simulated step; longer stalls are clamped.
const MAX_DELTA_TIME: f32 = 1.0 / 20.0;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: ClientId,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<ClientId>,
    },
}

/// Main server coordinating networking and mover simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    clock: SystemClock,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        game_state: GameState,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            game_state,
            clock: SystemClock::new(),
            tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
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

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = clients.read().await.get_client_addrs();

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
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

                let timed_out = clients.write().await.check_timeouts();
                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
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
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<ClientId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    async fn client_for(&self, addr: SocketAddr) -> Option<ClientId> {
        self.clients.read().await.find_client_by_addr(addr)
    }

    async fn drop_client(&mut self, client_id: ClientId) {
        self.clients.write().await.remove_client(&client_id);
        self.game_state.release_client(client_id);
    }

    /// Processes one incoming packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != CLIENT_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: format!(
                                "Version mismatch: server {}, client {}",
                                CLIENT_VERSION, client_version
                            ),
                        },
                        addr,
                    );
                    return;
                }

                if let Some(existing_id) = self.client_for(addr).await {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.drop_client(existing_id).await;
                }

                let client_id = self.clients.write().await.add_client(addr);
                match client_id {
                    Some(client_id) => {
                        self.send_packet(Packet::Connected { client_id }, addr);
                        for (mover_id, push) in self.game_state.snapshots() {
                            self.send_packet(Packet::Push { mover_id, push }, addr);
                        }
                    }
                    None => self.send_packet(
                        Packet::Disconnected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    ),
                }
            }

            Packet::Ping { client_time } => {
                if let Some(client_id) = self.client_for(addr).await {
                    self.clients.write().await.touch(client_id);
                    let server_time = self.clock.now();
                    self.send_packet(
                        Packet::Pong {
                            client_time,
                            server_time,
                        },
                        addr,
                    );
                }
            }

            Packet::Command { mover_id, command } => match self.client_for(addr).await {
                Some(client_id) => {
                    self.clients
                        .write()
                        .await
                        .add_command(client_id, mover_id, command);
                }
                None => warn!("Command from unknown address {}", addr),
            },

            Packet::Disconnect => {
                if let Some(client_id) = self.client_for(addr).await {
                    self.drop_client(client_id).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Applies queued commands in timestamp order, then advances every mover
    async fn process_commands(&mut self, dt: f32) {
        let commands = self.clients.write().await.take_chronological_commands();

        for (client_id, queued) in commands {
            let result = self.game_state.apply_command(
                client_id,
                queued.mover_id,
                queued.command.clone(),
                &self.clock,
            );
            match result {
                Ok(()) => {}
                Err(rejection) if rejection.is_replay() => {
                    debug!("Dropped replayed command from {}: {}", client_id, rejection)
                }
                Err(rejection) => warn!(
                    "Rejected {:?} from client {}: {}",
                    queued.command, client_id, rejection
                ),
            }
        }

        self.game_state.update(dt, &self.clock);
    }

    /// Sends every push produced this tick
    async fn flush_outbound(&mut self) {
        let outbound = self.game_state.drain_outbound();
        if outbound.is_empty() {
            return;
        }

        for (mover_id, message) in outbound {
            let packet = Packet::Push {
                mover_id,
                push: message.push,
            };
            match message.audience {
                Audience::All => self.broadcast_packet(packet, None),
                Audience::Only(client_id) => {
                    let addr = self.clients.read().await.get_addr(client_id);
                    match addr {
                        Some(addr) => self.send_packet(packet, addr),
                        None => debug!("Client {} left before notice was sent", client_id),
                    }
                }
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!(
            "Server started with {} mover(s)",
            self.game_state.mover_count()
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.game_state.release_client(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let mut dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    if dt > MAX_DELTA_TIME {
                        debug!("Large delta time detected ({:.3}s), capping", dt);
                        dt = MAX_DELTA_TIME;
                    }

                    self.process_commands(dt).await;
                    self.flush_outbound().await;

                    if self.game_state.tick % 60 == 0 {
                        let client_count = self.clients.read().await.len();
                        if client_count > 0 {
                            debug!("Tick {}: {} clients, {:.1}Hz",
                                   self.game_state.tick, client_count, 1.0 / dt);
                        }
                    }
                },
            }
        }

        Ok(())
    }
}
