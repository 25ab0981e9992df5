//! TCP front end: producers stream frames in, consumers receive vitals.

pub mod server;
pub mod wire;

use thiserror::Error;

use crate::config::ConfigError;
use crate::hub::HubError;

pub use server::{LineFrameReceiver, TcpSink, VitalsServer};
pub use wire::{ClientMessage, FrameMessage, PeerRole, ServerMessage, VitalsMessage};

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Hub error: {0}")]
    Hub(#[from] HubError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
