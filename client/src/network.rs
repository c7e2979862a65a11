use crate::clock::SyncedClock;
use crate::console::{ConsoleAction, HELP};
use crate::stats::LinkStats;
use crate::view::ClientMover;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    ClientId, LogEvents, MoverId, NetworkClock, OpenSpace, Packet, Push, CLIENT_VERSION,
    MAX_PACKET_SIZE,
};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Simulated packet loss and duplication on the link to the server.
pub struct Impairment {
    loss: f64,
    duplicate: f64,
    rng: StdRng,
}

impl Impairment {
    pub fn new(loss: f64, duplicate: f64) -> Self {
        Self::with_rng(loss, duplicate, StdRng::from_entropy())
    }

    pub fn with_seed(loss: f64, duplicate: f64, seed: u64) -> Self {
        Self::with_rng(loss, duplicate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(loss: f64, duplicate: f64, rng: StdRng) -> Self {
        Self {
            loss: loss.clamp(0.0, 1.0),
            duplicate: duplicate.clamp(0.0, 1.0),
            rng,
        }
    }

    pub fn is_active(&self) -> bool {
        self.loss > 0.0 || self.duplicate > 0.0
    }

    /// How many copies of a datagram make it through: 0, 1 or 2.
    pub fn copies(&mut self) -> usize {
        if self.loss > 0.0 && self.rng.gen_bool(self.loss) {
            0
        } else if self.duplicate > 0.0 && self.rng.gen_bool(self.duplicate) {
            2
        } else {
            1
        }
    }
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<ClientId>,
    connected: bool,
    running: bool,

    movers: BTreeMap<MoverId, ClientMover>,
    controlled: Option<MoverId>,

    clock: SyncedClock,
    link: LinkStats,
    impairment: Impairment,
    fake_ping_ms: u64,
    tick_rate: u32,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        fake_ping_ms: u64,
        impairment: Impairment,
        tick_rate: u32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            running: true,
            movers: BTreeMap::new(),
            controlled: None,
            clock: SyncedClock::new(),
            link: LinkStats::new(),
            impairment,
            fake_ping_ms,
            tick_rate: tick_rate.max(1),
        })
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn mover(&self, id: MoverId) -> Option<&ClientMover> {
        self.movers.get(&id)
    }

    pub fn controlled_mover(&self) -> Option<&ClientMover> {
        self.controlled.and_then(|id| self.movers.get(&id))
    }

    pub fn clock(&self) -> &SyncedClock {
        &self.clock
    }

    pub fn link(&self) -> &LinkStats {
        &self.link
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: CLIENT_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&mut self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        let copies = self.impairment.copies();
        if copies == 0 {
            self.link.packets_dropped += 1;
        }
        for _ in 0..copies {
            self.socket.send_to(&data, self.server_addr).await?;
            self.link.packets_sent += 1;
        }
        Ok(())
    }

    fn handle_push(&mut self, mover_id: MoverId, push: Push) {
        match push {
            Push::Spawned { config, position } => {
                info!("Mover {} spawned at {}", mover_id, position);
                self.movers.insert(
                    mover_id,
                    ClientMover::new(mover_id, config, position, Box::new(LogEvents)),
                );
                if self.controlled.is_none() {
                    self.controlled = Some(mover_id);
                }
            }
            Push::Notice { message } => {
                warn!("Mover {}: {}", mover_id, message);
            }
            push => match self.movers.get_mut(&mover_id) {
                Some(view) => {
                    view.apply_push(push, &OpenSpace);
                }
                None => debug!("Push for unknown mover {}", mover_id),
            },
        }
    }

    pub fn handle_packet(&mut self, packet: Packet) {
        self.link.packets_received += 1;

        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.connected = true;
            }

            Packet::Pong {
                client_time,
                server_time,
            } => {
                self.clock.on_pong(client_time, server_time);
                self.link
                    .record_rtt(self.clock.local_now() - client_time);
            }

            Packet::Push { mover_id, push } => self.handle_push(mover_id, push),

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                self.running = false;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Advances every mirrored mover by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let now = self.clock.now();
        for view in self.movers.values_mut() {
            view.tick(dt, now, &OpenSpace);
        }
    }

    fn print_status(&self) {
        let Some(view) = self.controlled_mover() else {
            println!("no mover yet");
            return;
        };
        let facing = view.facing();
        let motion = view.motion();
        println!(
            "mover {} at {} facing {} flying {} speed {:.1} engines {} rcs {} phase {:?}{}",
            view.id(),
            motion.position,
            facing.facing_direction,
            facing.flying_direction,
            motion.speed,
            if view.core().engines_on() { "on" } else { "off" },
            if view.rcs_mode_active() { "on" } else { "off" },
            view.core().phase(),
            if view.is_lagging() { " (lagging)" } else { "" },
        );
    }

    /// Runs one console line. Returns false when the operator quits.
    pub async fn handle_console_line(
        &mut self,
        line: &str,
    ) -> Result<bool, Box<dyn std::error::Error>> {
        let action = match ConsoleAction::parse(line) {
            Ok(Some(action)) => action,
            Ok(None) => return Ok(true),
            Err(e) => {
                println!("{}", e);
                println!("{}", HELP);
                return Ok(true);
            }
        };

        match action {
            ConsoleAction::Quit => return Ok(false),
            ConsoleAction::Status => {
                self.print_status();
                return Ok(true);
            }
            _ => {}
        }

        let (Some(mover_id), true) = (self.controlled, self.connected) else {
            println!("not connected to a mover yet");
            return Ok(true);
        };
        let Some(view) = self.movers.get_mut(&mover_id) else {
            return Ok(true);
        };

        let now = self.clock.now();
        let commands = action.into_commands(
            view.facing().facing_direction,
            view.core().resting_tile(),
            now,
        );

        // burns play locally right away; the server echo is then a duplicate
        if let ConsoleAction::Rcs(direction) = action {
            if view.rcs_mode_active() {
                if let Err(e) = view.apply_rcs_burn(direction, now, &OpenSpace) {
                    debug!("Local burn {} not predicted: {}", direction, e);
                }
            }
        }

        for command in commands {
            self.send_packet(&Packet::Command { mover_id, command })
                .await?;
        }
        Ok(true)
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let tick_duration = Duration::from_secs_f64(1.0 / self.tick_rate as f64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ping_interval = interval(Duration::from_secs(1));
        let mut stats_interval = interval(Duration::from_secs(10));
        let mut last_tick = Instant::now();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let mut buffer = [0u8; MAX_PACKET_SIZE];
        println!("{}", HELP);

        while self.running {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[..len]) {
                                Ok(packet) => {
                                    let copies = self.impairment.copies();
                                    if copies == 0 {
                                        self.link.packets_dropped += 1;
                                    }
                                    for _ in 0..copies {
                                        self.handle_packet(packet.clone());
                                    }
                                }
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                line = lines.next_line(), if stdin_open => {
                    match line {
                        Ok(Some(line)) => {
                            match self.handle_console_line(&line).await {
                                Ok(true) => {}
                                Ok(false) => break,
                                Err(e) => error!("Error sending command: {}", e),
                            }
                        }
                        Ok(None) => stdin_open = false,
                        Err(e) => {
                            error!("Error reading console: {}", e);
                            stdin_open = false;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    self.update(dt);
                },

                _ = ping_interval.tick() => {
                    let client_time = self.clock.local_now();
                    if let Err(e) = self.send_packet(&Packet::Ping { client_time }).await {
                        error!("Error sending ping: {}", e);
                    }
                },

                _ = stats_interval.tick() => {
                    if self.connected {
                        let views = self.movers.values().map(|view| view.stats());
                        info!("{}", self.link.summary(views));
                    }
                },

                _ = &mut ctrl_c => {
                    info!("Received Ctrl+C, shutting down");
                    break;
                },
            }
        }

        if self.connected {
            if let Err(e) = self.send_packet(&Packet::Disconnect).await {
                error!("Error sending disconnect: {}", e);
            }
        }

        Ok(())
    }
}
