//! Alert notifications, raised once per rising edge of a source's alert flag.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub source_id: String,
    pub risk_score: f64,
    pub timestamp: DateTime<Utc>,
}

impl AlertNotification {
    pub fn new(source_id: impl Into<String>, risk_score: f64) -> Self {
        Self {
            source_id: source_id.into(),
            risk_score,
            timestamp: Utc::now(),
        }
    }
}

/// Receives alert notifications. Must not block the calling session.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, notification: AlertNotification);
}

/// Writes alerts to the log at warn level.
#[derive(Clone, Debug, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, notification: AlertNotification) {
        log::warn!(
            "ALERT source {} risk {:.2} at {}",
            notification.source_id,
            notification.risk_score,
            notification.timestamp.to_rfc3339()
        );
    }
}

/// Forwards alerts into an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelAlertSink {
    tx: mpsc::UnboundedSender<AlertNotification>,
}

impl ChannelAlertSink {
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<AlertNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AlertSink for ChannelAlertSink {
    async fn notify(&self, notification: AlertNotification) {
        if self.tx.send(notification).is_err() {
            log::debug!("Alert receiver dropped; notification discarded");
        }
    }
}
