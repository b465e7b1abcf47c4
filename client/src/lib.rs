//! # Arena Client Library
//!
//! Client side of the ship arena. The local ship is predicted every frame
//! from the keys held, inputs are batched to the server at a throttled rate,
//! and server broadcasts are reconciled against recently predicted positions.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! - Local prediction using the same movement and collision rules as the server
//! - Reconciliation of broadcasts (keep local, snap or adopt)
//! - Smoothing of remote ships from echoed inputs
//!
//! ### History Module (`history`)
//! - Bounded buffer of recently predicted local positions
//!
//! ### Input Module (`input`)
//! - `KeySource` seam for whatever produces held keys
//! - Scripted `Autopilot` for headless runs
//! - Throttled batching of frame inputs into updates
//!
//! ### Network Module (`network`)
//! - Handshake with retry until the welcome arrives
//! - Frame loop interleaved with datagram receipt
//! - Optional artificial latency for testing
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::Autopilot;
//! use client::network::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ClientConfig::default();
//!     let mut client = Client::new(config, Box::new(Autopilot::new())).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod history;
pub mod input;
pub mod network;
