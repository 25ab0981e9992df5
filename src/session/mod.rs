//! Source sessions
//!
//! One `SourceSession` runs per producer connection, inside its own tokio
//! task. It owns the source's rolling state exclusively, pulls frames from a
//! `FrameReceiver`, runs each through the `FramePipeline` and publishes the
//! result to the broadcast hub. Sessions for different sources share
//! nothing except the hub.

pub mod alerts;
pub mod baseline;
pub mod pipeline;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::config::{ConfigError, PipelineConfig, SessionConfig};
use crate::hub::{BroadcastHub, HubError};
use crate::vision::LandmarkDetector;

pub use alerts::{AlertNotification, AlertSink, ChannelAlertSink, LogAlertSink};
pub use baseline::{BaselineProvider, StaticBaselineProvider};
pub use pipeline::FramePipeline;
pub use state::{CloseReason, SessionState, SourceState};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Closed after {0} consecutive undecodable frames")]
    TooManyDecodeFailures(u32),

    #[error("No frame received for {0:?}")]
    IdleTimeout(Duration),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Failed to receive frame: {0}")]
    Receive(String),

    #[error("Hub error: {0}")]
    Hub(#[from] HubError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SessionError {
    fn close_reason(&self) -> CloseReason {
        match self {
            SessionError::TooManyDecodeFailures(_) => CloseReason::TooManyDecodeFailures,
            SessionError::IdleTimeout(_) => CloseReason::IdleTimeout,
            SessionError::Hub(HubError::SourceInUse(_)) => CloseReason::SourceInUse,
            _ => CloseReason::ReceiveError,
        }
    }
}

/// One encoded frame as delivered by a producer.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundFrame {
    pub source_id: String,
    /// Producer-supplied sequence number or timestamp.
    pub sequence: u64,
    pub payload: Vec<u8>,
}

/// Where a session's frames come from.
///
/// `Ok(None)` means the producer went away. `SessionError::MalformedFrame`
/// is not fatal: the session skips the frame and keeps reading. Any other
/// error ends the session.
#[async_trait]
pub trait FrameReceiver: Send {
    async fn next_frame(&mut self) -> Result<Option<InboundFrame>, SessionError>;
}

#[async_trait]
impl FrameReceiver for mpsc::Receiver<InboundFrame> {
    async fn next_frame(&mut self) -> Result<Option<InboundFrame>, SessionError> {
        Ok(self.recv().await)
    }
}

/// Everything a session needs that outlives it.
#[derive(Clone)]
pub struct SessionContext {
    pub pipeline: PipelineConfig,
    pub session: SessionConfig,
    pub detector: Arc<dyn LandmarkDetector>,
    pub hub: Arc<BroadcastHub>,
    pub baselines: Arc<dyn BaselineProvider>,
    pub alerts: Arc<dyn AlertSink>,
}

impl SessionContext {
    /// A context with default configuration, no known baselines and alerts
    /// written to the log.
    pub fn new(hub: Arc<BroadcastHub>, detector: Arc<dyn LandmarkDetector>) -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            session: SessionConfig::default(),
            detector,
            hub,
            baselines: Arc::new(StaticBaselineProvider::new()),
            alerts: Arc::new(LogAlertSink),
        }
    }
}

/// Summary of a finished session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionReport {
    pub connection_id: Uuid,
    pub source_id: Option<String>,
    pub frames_processed: u64,
    pub close_reason: CloseReason,
}

pub struct SourceSession {
    connection_id: Uuid,
    config: SessionConfig,
    pipeline: FramePipeline,
    hub: Arc<BroadcastHub>,
    baselines: Arc<dyn BaselineProvider>,
    alerts: Arc<dyn AlertSink>,
    state: SessionState,
    source: Option<SourceState>,
    /// Consecutive frames that could not be decoded, counted from the
    /// first line the producer sends.
    decode_failures: u32,
}

impl SourceSession {
    pub fn new(connection_id: Uuid, context: &SessionContext) -> Result<Self, ConfigError> {
        context.session.validate()?;
        Ok(Self {
            connection_id,
            config: context.session.clone(),
            pipeline: FramePipeline::new(context.pipeline.clone(), context.detector.clone())?,
            hub: context.hub.clone(),
            baselines: context.baselines.clone(),
            alerts: context.alerts.clone(),
            state: SessionState::Connecting,
            source: None,
            decode_failures: 0,
        })
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn source(&self) -> Option<&SourceState> {
        self.source.as_ref()
    }

    /// Time since the bound source last delivered a frame.
    pub fn idle_for(&self) -> Option<Duration> {
        self.source.as_ref().map(|s| s.last_activity.elapsed())
    }

    /// Process frames until the producer disconnects, `shutdown` fires, the
    /// idle timeout elapses or too many frames fail to decode. The producer
    /// is unregistered from the hub on every exit path.
    pub async fn run<R>(
        &mut self,
        receiver: &mut R,
        mut shutdown: Option<broadcast::Receiver<()>>,
    ) -> Result<SessionReport, SessionError>
    where
        R: FrameReceiver + ?Sized,
    {
        let idle_timeout = self.config.idle_timeout;

        let outcome = loop {
            let next = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break Ok(CloseReason::Stopped),
                next = tokio::time::timeout(idle_timeout, receiver.next_frame()) => next,
            };

            match next {
                Err(_) => break Err(SessionError::IdleTimeout(idle_timeout)),
                Ok(Ok(None)) => break Ok(CloseReason::ProducerDisconnected),
                Ok(Ok(Some(frame))) => {
                    if let Err(e) = self.handle_frame(frame).await {
                        break Err(e);
                    }
                }
                Ok(Err(SessionError::MalformedFrame(reason))) => {
                    log::warn!("Connection {}: skipping malformed frame: {}", self.connection_id, reason);
                    if let Err(e) = self.record_decode_failure() {
                        break Err(e);
                    }
                }
                Ok(Err(e)) => break Err(e),
            }
        };

        let reason = match &outcome {
            Ok(reason) => *reason,
            Err(e) => e.close_reason(),
        };
        self.close(reason).await;
        outcome.map(|close_reason| self.report(close_reason))
    }

    async fn handle_frame(&mut self, frame: InboundFrame) -> Result<(), SessionError> {
        if self.source.is_none() {
            self.open_source(&frame.source_id).await?;
        }
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return Ok(()),
        };

        if frame.source_id != source.source_id {
            log::warn!(
                "Connection {}: dropping frame for {} on session bound to {}",
                self.connection_id,
                frame.source_id,
                source.source_id
            );
            return Ok(());
        }
        source.last_activity = tokio::time::Instant::now();

        let result = match self.pipeline.process(source, frame.sequence, &frame.payload) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Source {}: skipping frame {}: {}", source.source_id, frame.sequence, e);
                return self.record_decode_failure();
            }
        };
        self.decode_failures = 0;

        let next_state = self.state.after_frame(result.degraded);
        if next_state != self.state {
            log::info!("Source {}: {:?} -> {:?}", source.source_id, self.state, next_state);
            self.state = next_state;
        }

        if source.alert_edge(result.alert) {
            self.alerts
                .notify(AlertNotification::new(source.source_id.clone(), result.risk_score))
                .await;
        }

        let report = self.hub.publish(result).await;
        if report.dropped > 0 {
            log::debug!("Publish dropped {} consumer(s)", report.dropped);
        }
        Ok(())
    }

    async fn open_source(&mut self, source_id: &str) -> Result<(), SessionError> {
        self.hub.register_producer(self.connection_id, source_id).await?;
        let baseline = self.baselines.baseline(source_id).await.unwrap_or_default();
        log::info!(
            "Connection {} producing source {} (baseline hr {} rr {} risk {:.2})",
            self.connection_id,
            source_id,
            baseline.baseline_hr,
            baseline.baseline_rr,
            baseline.baseline_risk
        );
        self.source = Some(SourceState::new(source_id, baseline, self.pipeline.config()));
        Ok(())
    }

    fn record_decode_failure(&mut self) -> Result<(), SessionError> {
        self.decode_failures += 1;
        if self.decode_failures > self.config.max_decode_failures {
            return Err(SessionError::TooManyDecodeFailures(self.decode_failures));
        }
        Ok(())
    }

    async fn close(&mut self, reason: CloseReason) {
        if self.state.is_closed() {
            return;
        }
        self.state = SessionState::Closed(reason);
        if self.source.is_some() {
            self.hub.unregister(self.connection_id).await;
        }
        log::info!(
            "Session {} for {} closed: {} (idle {:?})",
            self.connection_id,
            self.source.as_ref().map(|s| s.source_id.as_str()).unwrap_or("<no source>"),
            reason,
            self.idle_for().unwrap_or_default()
        );
    }

    fn report(&self, close_reason: CloseReason) -> SessionReport {
        SessionReport {
            connection_id: self.connection_id,
            source_id: self.source.as_ref().map(|s| s.source_id.clone()),
            frames_processed: self.source.as_ref().map(|s| s.frames_processed).unwrap_or(0),
            close_reason,
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut Option<broadcast::Receiver<()>>) {
    match shutdown {
        // Lagged or closed both mean the owner wants us gone.
        Some(rx) => {
            let _ = rx.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}
