// Vitalcast - Contactless vitals estimation and broadcast

pub mod config;
pub mod hub;
pub mod network;
pub mod session;
pub mod signal;
pub mod types;
pub mod vision;

pub use config::{ConfigError, ServiceConfig};
pub use hub::{BroadcastHub, HubError, HubMessage};
pub use session::{InboundFrame, SessionContext, SessionError, SourceSession};
pub use types::{Baseline, VitalsResult};
