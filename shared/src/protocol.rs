//! JSON datagram protocol between arena clients and the server.
//!
//! Every datagram is one JSON object whose integer `handshake` field selects
//! the message kind:
//!
//! * client → server `{"handshake":1}` asks to join;
//! * server → client `handshake: 1` is the welcome carrying the assigned id;
//! * client → server `handshake: 0` is an `Update` with buffered inputs;
//! * server → client `handshake: 0` is a per-recipient `Broadcast`.
//!
//! Decoding reads the envelope first and then the typed body, so a datagram
//! with a bad discriminant or missing keys is rejected as a whole.

use crate::entity::{Keys, Ship};
use crate::MAX_INPUT_DELTA;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

const HANDSHAKE: u8 = 1;
const STATE: u8 = 0;

/// Largest datagram either side will read.
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown handshake value {0}")]
    UnknownHandshake(u8),
    #[error("invalid input event: {0}")]
    InvalidInput(String),
}

/// One client frame of input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub pressed: Keys,
    /// Frame duration in seconds.
    pub delta: f64,
    /// Sender's wall-clock when the frame was sampled, in epoch seconds.
    pub timestamp: f64,
}

impl InputEvent {
    fn validate(&self) -> Result<(), ProtocolError> {
        if !(0.0..=MAX_INPUT_DELTA).contains(&self.delta) {
            return Err(ProtocolError::InvalidInput(format!("delta {}", self.delta)));
        }
        if !self.timestamp.is_finite() {
            return Err(ProtocolError::InvalidInput(format!(
                "timestamp {}",
                self.timestamp
            )));
        }
        Ok(())
    }
}

/// Batch of inputs a client has produced since its previous update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub client_id: u32,
    pub inputs: Vec<InputEvent>,
    pub time_stamp: f64,
}

/// The world as the server shows it to one client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldView {
    /// The recipient's own id.
    pub client_id: u32,
    /// Server wall-clock at broadcast; absent on the welcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<f64>,
    pub ships: BTreeMap<u32, Ship>,
    /// Inputs the server is about to replay for each client, echoed for smoothing.
    #[serde(default)]
    pub inputs: BTreeMap<u32, Vec<InputEvent>>,
}

impl WorldView {
    pub fn encode_welcome(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_tagged(HANDSHAKE, self)
    }

    pub fn encode_broadcast(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_tagged(STATE, self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Handshake,
    Update(Update),
}

impl ClientMessage {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            ClientMessage::Handshake => Ok(serde_json::to_vec(&Envelope {
                handshake: HANDSHAKE,
            })?),
            ClientMessage::Update(update) => encode_tagged(STATE, update),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        match read_envelope(bytes)? {
            HANDSHAKE => Ok(ClientMessage::Handshake),
            STATE => {
                let update: Update = serde_json::from_slice(bytes)?;
                for event in &update.inputs {
                    event.validate()?;
                }
                Ok(ClientMessage::Update(update))
            }
            other => Err(ProtocolError::UnknownHandshake(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Welcome(WorldView),
    Broadcast(WorldView),
}

impl ServerMessage {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            ServerMessage::Welcome(view) => view.encode_welcome(),
            ServerMessage::Broadcast(view) => view.encode_broadcast(),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        match read_envelope(bytes)? {
            HANDSHAKE => Ok(ServerMessage::Welcome(serde_json::from_slice(bytes)?)),
            STATE => Ok(ServerMessage::Broadcast(serde_json::from_slice(bytes)?)),
            other => Err(ProtocolError::UnknownHandshake(other)),
        }
    }

    pub fn view(&self) -> &WorldView {
        match self {
            ServerMessage::Welcome(view) | ServerMessage::Broadcast(view) => view,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    handshake: u8,
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    handshake: u8,
    #[serde(flatten)]
    body: &'a T,
}

fn read_envelope(bytes: &[u8]) -> Result<u8, ProtocolError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    Ok(envelope.handshake)
}

fn encode_tagged<T: Serialize>(handshake: u8, body: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(&Tagged { handshake, body })?)
}
