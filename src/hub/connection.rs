//! Consumer-side connection abstraction for the broadcast hub.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::HubError;
use crate::types::VitalsResult;

/// A message fanned out to consumers.
#[derive(Clone, Debug, PartialEq)]
pub enum HubMessage {
    Vitals(Arc<VitalsResult>),
    /// The producer for `source_id` went away; no further results follow.
    SourceClosed { source_id: String },
}

impl HubMessage {
    pub fn source_id(&self) -> &str {
        match self {
            HubMessage::Vitals(result) => &result.source_id,
            HubMessage::SourceClosed { source_id } => source_id,
        }
    }
}

/// The sending half of one consumer connection.
///
/// A sink is driven by exactly one writer task, so calls to `send` never
/// overlap for the same sink.
#[async_trait]
pub trait ConsumerSink: Send + Sync {
    async fn send(&self, message: &HubMessage) -> Result<(), HubError>;
}

/// In-process consumer backed by a bounded tokio channel.
pub struct ChannelSink {
    tx: mpsc::Sender<HubMessage>,
}

impl ChannelSink {
    /// Create a sink and the receiver its messages arrive on.
    pub fn pair(capacity: usize) -> (Arc<Self>, mpsc::Receiver<HubMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl ConsumerSink for ChannelSink {
    async fn send(&self, message: &HubMessage) -> Result<(), HubError> {
        self.tx
            .send(message.clone())
            .await
            .map_err(|_| HubError::Closed)
    }
}
