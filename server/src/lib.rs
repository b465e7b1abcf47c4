//! # Arena Server Library
//!
//! Authoritative server for the multiplayer ship arena. Clients only ever
//! send the keys they held each frame; the server replays those inputs in
//! timestamp order, resolves combat and broadcasts the resulting world.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! - Session tracking and client ID assignment
//! - Per-client input queues and the per-tick timeline
//! - Optional timeout eviction
//!
//! ### Game Module (`game`)
//! - Ships keyed by client ID plus the arena walls
//! - One simulation step per tick using the shared movement and collision rules
//! - Random respawn positions
//!
//! ### Network Module (`network`)
//! - UDP socket with separate receive and send tasks
//! - Handshake and update handling
//! - Tick loop and per-recipient broadcasts
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new("127.0.0.1:9999", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
