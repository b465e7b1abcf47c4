//! Client sessions and per-client input queues for the arena server
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Session lifecycle (handshake, replacement, optional timeout eviction)
//! - Buffering of input events as Update datagrams arrive
//! - Merging every client's buffer into one timestamp-ordered timeline per tick
//!
//! Queues are only touched from the tick-owning task, so appends from
//! datagram arrival and the per-tick drain never interleave.

use log::{debug, info};
use shared::InputEvent;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client and the inputs it has sent since the last tick
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address broadcasts are sent to
    pub addr: SocketAddr,
    /// Last time we received any datagram from this client
    pub last_seen: Instant,
    /// Buffered inputs tagged with their global arrival number
    pub pending_inputs: Vec<(u64, InputEvent)>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            pending_inputs: Vec::new(),
        }
    }

    /// Checks if the client has been silent for longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// The buffered events in arrival order, without arrival numbers
    pub fn pending_events(&self) -> Vec<InputEvent> {
        self.pending_inputs.iter().map(|(_, event)| *event).collect()
    }
}

/// Owns every client session and its input queue
///
/// Client IDs start from 1 and increment for each new session. The manager
/// enforces a capacity limit and produces the per-tick timeline that the
/// simulation replays.
pub struct ClientManager {
    clients: BTreeMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
    /// Running count of every input ever queued, used to break timestamp ties
    arrivals: u64,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            next_client_id: 1,
            max_clients,
            arrivals: 0,
        }
    }

    /// Attempts to add a new client session
    ///
    /// Returns Some(client_id) if successful, None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Removes a client session. Returns false if it was already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.id)
    }

    pub fn contains(&self, client_id: &u32) -> bool {
        self.clients.contains_key(client_id)
    }

    /// Appends an Update's inputs to the sender's queue
    ///
    /// Returns false, leaving every queue untouched, when the client ID is
    /// unknown or the datagram came from a different address than the
    /// session was opened from.
    pub fn add_inputs(&mut self, client_id: u32, addr: SocketAddr, inputs: Vec<InputEvent>) -> bool {
        let Some(client) = self.clients.get_mut(&client_id) else {
            return false;
        };
        if client.addr != addr {
            debug!(
                "Client {} update from {} does not match session address {}",
                client_id, addr, client.addr
            );
            return false;
        }

        client.last_seen = Instant::now();
        for event in inputs {
            client.pending_inputs.push((self.arrivals, event));
            self.arrivals += 1;
        }
        true
    }

    /// Flattens every client's queue into one sequence ordered by input timestamp
    ///
    /// Events with equal timestamps keep the order in which they arrived at
    /// the server. Queues are left intact; they are cleared separately once
    /// the tick has been broadcast.
    pub fn build_timeline(&self) -> Vec<(u32, InputEvent)> {
        let mut timeline: Vec<(u64, u32, InputEvent)> = self
            .clients
            .values()
            .flat_map(|client| {
                client
                    .pending_inputs
                    .iter()
                    .map(move |(arrival, event)| (*arrival, client.id, *event))
            })
            .collect();

        timeline.sort_by(|a, b| {
            a.2.timestamp
                .total_cmp(&b.2.timestamp)
                .then(a.0.cmp(&b.0))
        });

        timeline
            .into_iter()
            .map(|(_, client_id, event)| (client_id, event))
            .collect()
    }

    /// Every client's undrained queue, echoed to all clients for remote-ship smoothing
    pub fn pending_echo(&self) -> BTreeMap<u32, Vec<InputEvent>> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.pending_events()))
            .collect()
    }

    /// Drains a client's queue. Returns how many inputs were dropped.
    pub fn clear_inputs(&mut self, client_id: u32) -> usize {
        self.clients
            .get_mut(&client_id)
            .map(|client| std::mem::take(&mut client.pending_inputs).len())
            .unwrap_or(0)
    }

    /// Removes clients silent for longer than `timeout` and returns their IDs
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
