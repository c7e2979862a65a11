//! Connected clients and their buffered command requests.
//!
//! Commands are held per client until the next tick, then drained across all
//! clients in timestamp order so maneuvers issued close together are applied
//! in the order they were issued, not the order their datagrams arrived.
//! Commands without a timestamp stay behind whatever their client sent
//! before them, so a mode switch still precedes the maneuver it enables.

use log::info;
use shared::{ClientId, Command, MoverId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A command waiting for the next simulation tick.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
    pub mover_id: MoverId,
    pub command: Command,
    /// Arrival order, used for commands that carry no timestamp.
    pub arrival: u64,
}

#[derive(Debug)]
pub struct Client {
    pub id: ClientId,
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    pub pending_commands: Vec<QueuedCommand>,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            pending_commands: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn add_command(&mut self, command: QueuedCommand) {
        self.touch();
        self.pending_commands.push(command);
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub struct ClientManager {
    clients: HashMap<ClientId, Client>,
    next_client_id: ClientId,
    next_arrival: u64,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            next_arrival: 0,
            max_clients,
        }
    }

    /// Returns None when the server is full.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: &ClientId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks the client as alive without queuing anything (pings).
    pub fn touch(&mut self, client_id: ClientId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Returns false if the client ID is unknown.
    pub fn add_command(&mut self, client_id: ClientId, mover_id: MoverId, command: Command) -> bool {
        let arrival = self.next_arrival;
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                self.next_arrival += 1;
                client.add_command(QueuedCommand {
                    mover_id,
                    command,
                    arrival,
                });
                true
            }
            None => false,
        }
    }

    /// Removes every buffered command, oldest timestamp first. An untimed
    /// command sorts at the newest timestamp its client sent before it, and
    /// ties keep arrival order.
    pub fn take_chronological_commands(&mut self) -> Vec<(ClientId, QueuedCommand)> {
        let mut keyed: Vec<(f64, ClientId, QueuedCommand)> = Vec::new();
        for (client_id, client) in self.clients.iter_mut() {
            let mut watermark = f64::NEG_INFINITY;
            for command in client.pending_commands.drain(..) {
                let key = match command.command.timestamp() {
                    Some(ts) => {
                        watermark = watermark.max(ts);
                        ts
                    }
                    None => watermark,
                };
                keyed.push((key, *client_id, command));
            }
        }

        keyed.sort_by(|(a_key, _, a), (b_key, _, b)| {
            a_key.total_cmp(b_key).then(a.arrival.cmp(&b.arrival))
        });
        keyed
            .into_iter()
            .map(|(_, client_id, command)| (client_id, command))
            .collect()
    }

    /// Removes and returns clients that went silent.
    pub fn check_timeouts(&mut self) -> Vec<ClientId> {
        let timed_out: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(ClientId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn get_addr(&self, client_id: ClientId) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
