//! Per-source state, owned by exactly one session task.

use std::fmt;

use tokio::time::Instant;

use crate::config::PipelineConfig;
use crate::signal::SignalState;
use crate::types::Baseline;

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    ProducerDisconnected,
    Stopped,
    IdleTimeout,
    TooManyDecodeFailures,
    /// The source id was already being produced by another connection.
    SourceInUse,
    ReceiveError,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CloseReason::ProducerDisconnected => "producer disconnected",
            CloseReason::Stopped => "stopped",
            CloseReason::IdleTimeout => "idle timeout",
            CloseReason::TooManyDecodeFailures => "too many undecodable frames",
            CloseReason::SourceInUse => "source already in use",
            CloseReason::ReceiveError => "receive error",
        };
        f.write_str(text)
    }
}

/// Lifecycle of a source session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted, no frame processed yet.
    Connecting,
    Active,
    /// Frames keep flowing but heart and respiratory estimates are frozen.
    Degraded,
    Closed(CloseReason),
}

impl SessionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed(_))
    }

    /// State after a processed frame reported `degraded`.
    pub(crate) fn after_frame(self, degraded: bool) -> SessionState {
        match self {
            SessionState::Closed(_) => self,
            _ if degraded => SessionState::Degraded,
            _ => SessionState::Active,
        }
    }
}

/// Everything one source accumulates between frames.
///
/// A reconnecting producer always starts from a fresh `SourceState`; nothing
/// here outlives its session.
#[derive(Debug)]
pub struct SourceState {
    pub source_id: String,
    pub signal: SignalState,
    pub baseline: Baseline,
    /// Alert flag of the previous result, for edge detection.
    pub alerting: bool,
    pub frames_processed: u64,
    /// When the last frame for this source arrived.
    pub last_activity: Instant,
}

impl SourceState {
    pub fn new(source_id: impl Into<String>, baseline: Baseline, config: &PipelineConfig) -> Self {
        Self {
            source_id: source_id.into(),
            signal: SignalState::new(config),
            baseline,
            alerting: false,
            frames_processed: 0,
            last_activity: Instant::now(),
        }
    }

    /// Record the alert flag of a new result; true on a false -> true edge.
    pub fn alert_edge(&mut self, alert: bool) -> bool {
        let rising = alert && !self.alerting;
        self.alerting = alert;
        rising
    }
}
