//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::ClientManager;
use crate::game::GameState;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::protocol::MAX_DATAGRAM_SIZE;
use shared::{timestamp, ClientMessage, InputEvent, Ship, WorldView, DEFAULT_TICK_MS};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How often the tick loop logs a stats line at debug level.
const STATS_INTERVAL_TICKS: u32 = 100;

/// Datagrams decoded by the receiver task, forwarded to the main loop
#[derive(Debug)]
pub enum NetworkEvent {
    Datagram {
        message: ClientMessage,
        addr: SocketAddr,
    },
}

/// Encoded datagrams queued by the main loop for the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendDatagram { bytes: Vec<u8>, addr: SocketAddr },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_duration: Duration,
    pub max_clients: usize,
    /// Evict clients silent for this long. `None` keeps every session forever.
    pub client_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_millis(DEFAULT_TICK_MS),
            max_clients: 32,
            client_timeout: None,
        }
    }
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: ClientManager,
    game_state: GameState,
    config: ServerConfig,
    rng: StdRng,

    // Communication channels
    event_tx: Option<mpsc::UnboundedSender<NetworkEvent>>,
    event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, BoxError> {
        Self::with_rng(addr, config, StdRng::from_entropy()).await
    }

    /// Same as `new` with a caller-supplied RNG for spawn positions.
    pub async fn with_rng(addr: &str, config: ServerConfig, rng: StdRng) -> Result<Self, BoxError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: ClientManager::new(config.max_clients),
            game_state: GameState::new(),
            config,
            rng,
            event_tx: Some(event_tx),
            event_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BoxError> {
        Ok(self.socket.local_addr()?)
    }

    /// Spawns task that continuously listens for incoming datagrams
    fn spawn_network_receiver(&mut self) {
        let Some(event_tx) = self.event_tx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match ClientMessage::decode(&buffer[..len]) {
                        Ok(message) => {
                            if let Err(e) = event_tx.send(NetworkEvent::Datagram { message, addr }) {
                                error!("Failed to send datagram to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Discarding datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing datagram queue
    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendDatagram { bytes, addr } => {
                        if let Err(e) = socket.send_to(&bytes, addr).await {
                            error!("Failed to send datagram to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    fn send_datagram(&self, bytes: Vec<u8>, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendDatagram { bytes, addr }) {
            error!("Failed to queue datagram for sending: {}", e);
        }
    }

    /// Processes one decoded datagram
    fn handle_message(&mut self, message: ClientMessage, addr: SocketAddr) {
        match message {
            ClientMessage::Handshake => {
                // A repeated handshake replaces the session from that address
                if let Some(existing_id) = self.clients.find_client_by_addr(addr) {
                    info!("Replacing client {} from {}", existing_id, addr);
                    self.clients.remove_client(&existing_id);
                    self.game_state.remove_ship(&existing_id);
                }

                let Some(client_id) = self.clients.add_client(addr) else {
                    warn!("Server full, ignoring handshake from {}", addr);
                    return;
                };

                let ship = self.game_state.add_ship(client_id, &mut self.rng).clone();
                let welcome = WorldView {
                    client_id,
                    time_stamp: None,
                    ships: BTreeMap::from([(client_id, ship)]),
                    inputs: BTreeMap::new(),
                };
                match welcome.encode_welcome() {
                    Ok(bytes) => self.send_datagram(bytes, addr),
                    Err(e) => error!("Failed to encode welcome for client {}: {}", client_id, e),
                }
            }

            ClientMessage::Update(update) => {
                let count = update.inputs.len();
                if !self.clients.add_inputs(update.client_id, addr, update.inputs) {
                    debug!(
                        "Discarding update for unknown client {} from {}",
                        update.client_id, addr
                    );
                } else if count > 0 {
                    debug!("Queued {} inputs from client {}", count, update.client_id);
                }
            }
        }
    }

    /// Replays queued inputs, advances the world and broadcasts the result
    fn run_tick(&mut self, now: f64) {
        let timeline = self.clients.build_timeline();
        let echo = self.clients.pending_echo();
        let previous = self.game_state.ships.clone();

        match self.game_state.step(&timeline, now, &mut self.rng) {
            Ok(report) => {
                self.broadcast_state(previous, echo, now);

                if self.game_state.tick % STATS_INTERVAL_TICKS == 0 && !self.clients.is_empty() {
                    debug!(
                        "Tick {}: {} clients, {} inputs, {} bullet hits, {} barrier contacts, {} respawns",
                        self.game_state.tick,
                        self.clients.len(),
                        report.inputs,
                        report.bullet_hits,
                        report.barrier_contacts,
                        report.respawns
                    );
                }
            }
            Err(e) => {
                error!("Tick {} aborted: {}", self.game_state.tick, e);
                for (client_id, _) in self.clients.get_client_addrs() {
                    self.clients.clear_inputs(client_id);
                }
            }
        }
    }

    /// Sends every client the world tagged with its own ID, then drains its queue
    ///
    /// Other clients' ships go out as they were before this tick, alongside
    /// the echoed inputs that move them forward. Only the recipient's own
    /// ship is shown after the step.
    fn broadcast_state(
        &mut self,
        previous: BTreeMap<u32, Ship>,
        echo: BTreeMap<u32, Vec<InputEvent>>,
        now: f64,
    ) {
        let mut view = WorldView {
            client_id: 0,
            time_stamp: Some(now),
            ships: previous,
            inputs: echo,
        };

        for (client_id, addr) in self.clients.get_client_addrs() {
            view.client_id = client_id;
            let previous_own = view.ships.get(&client_id).cloned();
            match self.game_state.ships.get(&client_id) {
                Some(current) => view.ships.insert(client_id, current.clone()),
                None => view.ships.remove(&client_id),
            };
            match view.encode_broadcast() {
                Ok(bytes) => self.send_datagram(bytes, addr),
                Err(e) => error!("Failed to encode state for client {}: {}", client_id, e),
            }
            match previous_own {
                Some(ship) => view.ships.insert(client_id, ship),
                None => view.ships.remove(&client_id),
            };
            self.clients.clear_inputs(client_id);
        }
    }

    fn evict_timed_out(&mut self) {
        let Some(timeout) = self.config.client_timeout else {
            return;
        };
        for client_id in self.clients.check_timeouts(timeout) {
            info!("Client {} timed out", client_id);
            self.game_state.remove_ship(&client_id);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timeout_interval = interval(Duration::from_secs(1));
        let evict = self.config.client_timeout.is_some();

        info!(
            "Server started, ticking every {:?}",
            self.config.tick_duration
        );

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(NetworkEvent::Datagram { message, addr }) => {
                            self.handle_message(message, addr);
                        }
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.run_tick(timestamp());
                },

                _ = timeout_interval.tick(), if evict => {
                    self.evict_timed_out();
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Keys, ServerMessage, Update};

    async fn test_server(max_clients: usize) -> Server {
        let config = ServerConfig {
            max_clients,
            ..ServerConfig::default()
        };
        Server::with_rng("127.0.0.1:0", config, StdRng::seed_from_u64(3))
            .await
            .unwrap()
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn drain_outgoing(server: &mut Server) -> Vec<(ServerMessage, SocketAddr)> {
        let game_rx = server.game_rx.as_mut().unwrap();
        let mut sent = Vec::new();
        while let Ok(GameMessage::SendDatagram { bytes, addr }) = game_rx.try_recv() {
            sent.push((ServerMessage::decode(&bytes).unwrap(), addr));
        }
        sent
    }

    fn update(client_id: u32, inputs: Vec<InputEvent>) -> ClientMessage {
        ClientMessage::Update(Update {
            client_id,
            inputs,
            time_stamp: 1.0,
        })
    }

    fn thrust_at(timestamp: f64) -> InputEvent {
        InputEvent {
            pressed: Keys {
                up: true,
                ..Keys::default()
            },
            delta: 1.0,
            timestamp,
        }
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_duration, Duration::from_millis(50));
        assert_eq!(config.client_timeout, None);
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let server = test_server(4).await;
        let local = tokio_test::assert_ok!(server.local_addr());
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn test_handshake_sends_welcome() {
        let mut server = test_server(4).await;
        server.handle_message(ClientMessage::Handshake, addr(5000));

        let sent = drain_outgoing(&mut server);
        assert_eq!(sent.len(), 1);
        let (message, to) = &sent[0];
        assert_eq!(*to, addr(5000));
        match message {
            ServerMessage::Welcome(view) => {
                assert_eq!(view.client_id, 1);
                assert_eq!(view.ships.len(), 1);
                assert!(view.ships.contains_key(&1));
                assert!(view.inputs.is_empty());
                assert_eq!(view.time_stamp, None);
            }
            other => panic!("Expected welcome, got {:?}", other),
        }
        assert!(server.game_state.ships.contains_key(&1));
    }

    #[tokio::test]
    async fn test_repeat_handshake_replaces_session() {
        let mut server = test_server(4).await;
        server.handle_message(ClientMessage::Handshake, addr(5000));
        server.handle_message(ClientMessage::Handshake, addr(5000));

        assert_eq!(server.clients.len(), 1);
        assert_eq!(server.clients.find_client_by_addr(addr(5000)), Some(2));
        assert!(!server.game_state.ships.contains_key(&1));
        assert!(server.game_state.ships.contains_key(&2));
    }

    #[tokio::test]
    async fn test_handshake_over_capacity_is_ignored() {
        let mut server = test_server(1).await;
        server.handle_message(ClientMessage::Handshake, addr(5000));
        drain_outgoing(&mut server);

        server.handle_message(ClientMessage::Handshake, addr(5001));
        assert!(drain_outgoing(&mut server).is_empty());
        assert_eq!(server.game_state.ships.len(), 1);
    }

    #[tokio::test]
    async fn test_update_from_unknown_client_is_dropped() {
        let mut server = test_server(4).await;
        server.handle_message(update(42, vec![thrust_at(1.0)]), addr(5000));
        assert!(server.clients.build_timeline().is_empty());
    }

    #[tokio::test]
    async fn test_tick_broadcasts_per_recipient_and_drains() {
        let mut server = test_server(4).await;
        server.handle_message(ClientMessage::Handshake, addr(5000));
        server.handle_message(ClientMessage::Handshake, addr(5001));
        drain_outgoing(&mut server);
        for (id, x) in [(1, 500), (2, 1000)] {
            if let Some(ship) = server.game_state.ships.get_mut(&id) {
                ship.rect.x = x;
                ship.rect.y = 400;
            }
        }

        let before = server.game_state.ships[&1].position();
        server.handle_message(update(1, vec![thrust_at(10.0)]), addr(5000));
        server.run_tick(100.0);

        let sent = drain_outgoing(&mut server);
        assert_eq!(sent.len(), 2);
        for (message, to) in &sent {
            let ServerMessage::Broadcast(view) = message else {
                panic!("Expected broadcast, got {:?}", message);
            };
            let expected_id = if *to == addr(5000) { 1 } else { 2 };
            assert_eq!(view.client_id, expected_id);
            assert_eq!(view.time_stamp, Some(100.0));
            assert_eq!(view.ships.len(), 2);
            assert_eq!(view.inputs[&1].len(), 1);
            assert!(view.inputs[&2].is_empty());
            if expected_id == 1 {
                // own ship after the step
                assert_eq!(view.ships[&1].velocity, 5.0);
                assert_ne!(view.ships[&1].position(), before);
            } else {
                // others see it before the step, with the echo to replay
                assert_eq!(view.ships[&1].velocity, 0.0);
                assert_eq!(view.ships[&1].position(), before);
            }
        }
        assert_ne!(server.game_state.ships[&1].position(), before);

        // queues drained: the next tick echoes nothing
        server.run_tick(100.05);
        for (message, _) in drain_outgoing(&mut server) {
            assert!(message.view().inputs.values().all(|inputs| inputs.is_empty()));
        }
    }

    #[tokio::test]
    async fn test_aborted_tick_drains_without_broadcast() {
        let mut server = test_server(4).await;
        server.handle_message(ClientMessage::Handshake, addr(5000));
        drain_outgoing(&mut server);

        // session whose ship vanished out from under it
        server.game_state.remove_ship(&1);
        server.handle_message(update(1, vec![thrust_at(10.0)]), addr(5000));
        server.run_tick(100.0);

        assert!(drain_outgoing(&mut server).is_empty());
        assert!(server.clients.build_timeline().is_empty());
        assert_eq!(server.game_state.tick, 0);
    }

    #[tokio::test]
    async fn test_timeout_eviction_removes_ship() {
        let mut server = test_server(4).await;
        server.config.client_timeout = Some(Duration::ZERO);
        server.handle_message(ClientMessage::Handshake, addr(5000));
        tokio::time::sleep(Duration::from_millis(5)).await;

        server.evict_timed_out();
        assert!(server.clients.is_empty());
        assert!(server.game_state.ships.is_empty());
    }
}
