use crate::game::{ClientGameState, Reconciliation};
use crate::input::{InputManager, KeySource};
use log::{debug, error, info, warn};
use shared::protocol::MAX_DATAGRAM_SIZE;
use shared::{
    timestamp, ClientMessage, ServerMessage, DEFAULT_PORT, DEFAULT_SEND_RATE, MAX_INPUT_DELTA,
    TRUST_CAPACITY,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, sleep_until, timeout_at, Instant, MissedTickBehavior};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const HANDSHAKE_ATTEMPTS: u32 = 5;
const HANDSHAKE_RETRY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    /// Updates sent per second
    pub send_rate: u32,
    /// Local simulation frames per second
    pub frame_rate: u32,
    pub trust_capacity: usize,
    /// Artificial one-way delay is half of this, applied on send and on receive
    pub fake_ping_ms: u64,
    /// Stop after this long. `None` runs until the socket fails.
    pub duration: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            send_rate: DEFAULT_SEND_RATE,
            frame_rate: 60,
            trust_capacity: TRUST_CAPACITY,
            fake_ping_ms: 0,
            duration: None,
        }
    }
}

/// Counters collected over a client run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClientStats {
    pub frames: u64,
    pub updates_sent: u64,
    pub broadcasts: u64,
    pub snaps: u64,
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    config: ClientConfig,
    key_source: Box<dyn KeySource + Send>,
    game_state: Option<ClientGameState>,
    input_manager: InputManager,
    stats: ClientStats,
}

impl Client {
    pub async fn new(
        config: ClientConfig,
        key_source: Box<dyn KeySource + Send>,
    ) -> Result<Self, BoxError> {
        let server_addr: SocketAddr = config.server_addr.parse()?;
        let bind_addr = if server_addr.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = UdpSocket::bind(bind_addr).await?;

        Ok(Client {
            socket,
            server_addr,
            input_manager: InputManager::new(config.send_rate, timestamp()),
            config,
            key_source,
            game_state: None,
            stats: ClientStats::default(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BoxError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn client_id(&self) -> Option<u32> {
        self.game_state.as_ref().map(|state| state.client_id())
    }

    pub fn game_state(&self) -> Option<&ClientGameState> {
        self.game_state.as_ref()
    }

    pub fn stats(&self) -> ClientStats {
        self.stats
    }

    async fn send_datagram(&self, bytes: &[u8]) -> Result<(), BoxError> {
        if self.config.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.config.fake_ping_ms / 2)).await;
        }
        self.socket.send_to(bytes, self.server_addr).await?;
        Ok(())
    }

    /// Sends handshakes until the server welcomes us, returning the assigned client ID
    pub async fn connect(&mut self) -> Result<u32, BoxError> {
        let handshake = ClientMessage::Handshake.encode()?;
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        for attempt in 1..=HANDSHAKE_ATTEMPTS {
            info!("Connecting to {} (attempt {})", self.server_addr, attempt);
            self.send_datagram(&handshake).await?;

            let deadline = Instant::now() + HANDSHAKE_RETRY;
            while let Ok(result) = timeout_at(deadline, self.socket.recv_from(&mut buffer)).await {
                let (len, addr) = result?;
                if addr != self.server_addr {
                    continue;
                }
                match ServerMessage::decode(&buffer[..len]) {
                    Ok(ServerMessage::Welcome(view)) => {
                        let client_id = view.client_id;
                        let mut state = ClientGameState::new(client_id, self.config.trust_capacity);
                        state.apply_server_state(view);
                        self.game_state = Some(state);
                        info!("Connected! Client ID: {}", client_id);
                        return Ok(client_id);
                    }
                    Ok(ServerMessage::Broadcast(_)) => {
                        debug!("Ignoring broadcast received before welcome");
                    }
                    Err(e) => warn!("Discarding datagram from server: {}", e),
                }
            }
        }

        Err(format!(
            "no welcome from {} after {} attempts",
            self.server_addr, HANDSHAKE_ATTEMPTS
        )
        .into())
    }

    fn handle_datagram(&mut self, bytes: &[u8]) {
        let Some(state) = self.game_state.as_mut() else {
            return;
        };
        match ServerMessage::decode(bytes) {
            Ok(ServerMessage::Broadcast(view)) => {
                self.stats.broadcasts += 1;
                if state.apply_server_state(view) == Reconciliation::Snapped {
                    self.stats.snaps += 1;
                }
            }
            Ok(ServerMessage::Welcome(_)) => debug!("Ignoring duplicate welcome"),
            Err(e) => warn!("Discarding datagram from server: {}", e),
        }
    }

    /// Simulates one local frame and sends an update when the throttle allows
    async fn frame(&mut self, delta: f64, now: f64) -> Result<(), BoxError> {
        let Some(state) = self.game_state.as_mut() else {
            return Ok(());
        };
        let keys = self.key_source.poll(now);
        let event = state.step_frame(keys, delta, now);
        let client_id = state.client_id();
        self.stats.frames += 1;

        self.input_manager.record(event);
        if let Some(update) = self.input_manager.poll_update(client_id, now) {
            let bytes = ClientMessage::Update(update).encode()?;
            match self.send_datagram(&bytes).await {
                Ok(()) => self.stats.updates_sent += 1,
                Err(e) => error!("Error sending update: {}", e),
            }
        }
        Ok(())
    }

    /// Connects if needed, then runs the frame loop until the configured
    /// duration elapses or receiving from the socket fails
    pub async fn run(&mut self) -> Result<ClientStats, BoxError> {
        if self.game_state.is_none() {
            self.connect().await?;
        }

        let frame_duration = Duration::from_secs_f64(1.0 / self.config.frame_rate.max(1) as f64);
        let mut frame_interval = interval(frame_duration);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let deadline = self.config.duration.map(|d| Instant::now() + d);
        let stop = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(stop);

        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut last_frame = timestamp();

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    let (len, addr) = result?;
                    if addr != self.server_addr {
                        continue;
                    }
                    if self.config.fake_ping_ms > 0 {
                        sleep(Duration::from_millis(self.config.fake_ping_ms / 2)).await;
                    }
                    self.handle_datagram(&buffer[..len]);
                },

                _ = frame_interval.tick() => {
                    let now = timestamp();
                    let delta = (now - last_frame).clamp(0.0, MAX_INPUT_DELTA);
                    last_frame = now;
                    self.frame(delta, now).await?;
                },

                _ = &mut stop => {
                    info!("Run time elapsed, stopping client");
                    break;
                },
            }
        }

        Ok(self.stats)
    }
}
