//! Broadcast hub: the fan-out point between source sessions and viewers
//!
//! Keeps the registry of producer and consumer connections and delivers
//! every published result to every consumer registered at publish time.
//!
//! Each consumer owns a bounded outbox drained by its own writer task, so a
//! slow or dead consumer never delays the others and never blocks the
//! producer. A consumer is dropped when a send fails, when a send exceeds
//! the configured timeout, or when its outbox overflows. Messages are
//! written to a consumer in the order they were published, which gives
//! per-source FIFO delivery.

pub mod connection;

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{ConfigError, HubConfig};
use crate::types::VitalsResult;

pub use connection::{ChannelSink, ConsumerSink, HubMessage};

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Send to consumer failed: {0}")]
    SendFailed(String),

    #[error("Send to consumer timed out after {0:?}")]
    SendTimeout(Duration),

    #[error("Consumer outbox is full")]
    OutboxFull,

    #[error("Consumer connection closed")]
    Closed,

    #[error("Source `{0}` already has an active producer")]
    SourceInUse(String),

    #[error("Connection {0} is already registered with a different role")]
    RoleConflict(Uuid),
}

/// What a connection does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Producer { source_id: String },
    Consumer,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionRegistration {
    pub connection_id: Uuid,
    pub role: Role,
    pub registered_at: DateTime<Utc>,
}

impl ConnectionRegistration {
    fn new(connection_id: Uuid, role: Role) -> Self {
        Self {
            connection_id,
            role,
            registered_at: Utc::now(),
        }
    }
}

/// Outcome of one `publish` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Consumers whose outbox accepted the message.
    pub enqueued: usize,
    /// Consumers dropped because their outbox was full or gone.
    pub dropped: usize,
}

struct ConsumerEntry {
    registration: ConnectionRegistration,
    outbox: mpsc::Sender<HubMessage>,
    writer: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    producers: HashMap<Uuid, ConnectionRegistration>,
    /// source_id -> producing connection.
    sources: HashMap<String, Uuid>,
    consumers: HashMap<Uuid, ConsumerEntry>,
}

pub struct BroadcastHub {
    config: HubConfig,
    registry: RwLock<Registry>,
    /// Handle to ourselves for writer tasks; they must not keep the hub alive.
    this: Weak<BroadcastHub>,
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        Ok(Arc::new_cyclic(|this| Self {
            config,
            registry: RwLock::new(Registry::default()),
            this: this.clone(),
        }))
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a producer connection as the sole source of `source_id`.
    ///
    /// Returns `Ok(false)` when this exact registration already exists.
    pub async fn register_producer(
        &self,
        connection_id: Uuid,
        source_id: &str,
    ) -> Result<bool, HubError> {
        let mut registry = self.registry.write().await;

        if registry.consumers.contains_key(&connection_id) {
            return Err(HubError::RoleConflict(connection_id));
        }
        if let Some(existing) = registry.producers.get(&connection_id) {
            return match &existing.role {
                Role::Producer { source_id: s } if s == source_id => Ok(false),
                _ => Err(HubError::RoleConflict(connection_id)),
            };
        }
        if registry.sources.contains_key(source_id) {
            return Err(HubError::SourceInUse(source_id.to_string()));
        }

        let role = Role::Producer {
            source_id: source_id.to_string(),
        };
        registry
            .producers
            .insert(connection_id, ConnectionRegistration::new(connection_id, role));
        registry.sources.insert(source_id.to_string(), connection_id);
        log::info!("Producer {} registered for source {}", connection_id, source_id);
        Ok(true)
    }

    /// Register a consumer connection and start its writer task.
    ///
    /// Returns `Ok(false)` when the consumer is already registered.
    pub async fn register_consumer(
        &self,
        connection_id: Uuid,
        sink: Arc<dyn ConsumerSink>,
    ) -> Result<bool, HubError> {
        let mut registry = self.registry.write().await;

        if registry.producers.contains_key(&connection_id) {
            return Err(HubError::RoleConflict(connection_id));
        }
        if registry.consumers.contains_key(&connection_id) {
            return Ok(false);
        }

        let (outbox, rx) = mpsc::channel(self.config.outbox_capacity);
        let writer = tokio::spawn(run_writer(
            self.this.clone(),
            connection_id,
            sink,
            rx,
            self.config.send_timeout,
        ));
        registry.consumers.insert(
            connection_id,
            ConsumerEntry {
                registration: ConnectionRegistration::new(connection_id, Role::Consumer),
                outbox,
                writer,
            },
        );
        log::info!("Consumer {} registered", connection_id);
        Ok(true)
    }

    /// Remove a connection of either role. Unknown ids are ignored.
    ///
    /// Returns whether anything was removed.
    pub async fn unregister(&self, connection_id: Uuid) -> bool {
        let (closed_source, removed) = {
            let mut registry = self.registry.write().await;

            if let Some(entry) = registry.consumers.remove(&connection_id) {
                entry.writer.abort();
                log::info!("Consumer {} unregistered", connection_id);
                (None, true)
            } else if let Some(registration) = registry.producers.remove(&connection_id) {
                match registration.role {
                    Role::Producer { source_id } => {
                        registry.sources.remove(&source_id);
                        log::info!("Producer {} for source {} unregistered", connection_id, source_id);
                        (Some(source_id), true)
                    }
                    Role::Consumer => (None, true),
                }
            } else {
                (None, false)
            }
        };

        if let Some(source_id) = closed_source {
            if self.config.announce_source_close {
                self.broadcast(HubMessage::SourceClosed { source_id }).await;
            }
        }
        removed
    }

    /// Deliver a result to every currently registered consumer.
    pub async fn publish(&self, result: VitalsResult) -> PublishReport {
        self.broadcast(HubMessage::Vitals(Arc::new(result))).await
    }

    async fn broadcast(&self, message: HubMessage) -> PublishReport {
        let outboxes: Vec<(Uuid, mpsc::Sender<HubMessage>)> = {
            let registry = self.registry.read().await;
            registry
                .consumers
                .iter()
                .map(|(id, entry)| (*id, entry.outbox.clone()))
                .collect()
        };

        let mut report = PublishReport::default();
        let mut overflowed = Vec::new();
        for (id, outbox) in outboxes {
            match outbox.try_send(message.clone()) {
                Ok(()) => report.enqueued += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("Dropping consumer {}: {}", id, HubError::OutboxFull);
                    overflowed.push(id);
                }
                // Writer already gone; it removes itself.
                Err(mpsc::error::TrySendError::Closed(_)) => report.dropped += 1,
            }
        }

        if !overflowed.is_empty() {
            report.dropped += self.remove_consumers(&overflowed).await;
        }
        report
    }

    /// Drop consumers under a single write lock, aborting their writers.
    ///
    /// Never broadcasts, so it is safe to call from `broadcast` itself.
    async fn remove_consumers(&self, ids: &[Uuid]) -> usize {
        let mut registry = self.registry.write().await;
        let mut removed = 0;
        for id in ids {
            if let Some(entry) = registry.consumers.remove(id) {
                entry.writer.abort();
                log::info!("Consumer {} unregistered", id);
                removed += 1;
            }
        }
        removed
    }

    /// Called by a writer task whose consumer failed.
    async fn drop_failed_consumer(&self, connection_id: Uuid) {
        let mut registry = self.registry.write().await;
        // Dropping the entry detaches the handle; the writer is already exiting.
        if registry.consumers.remove(&connection_id).is_some() {
            log::info!("Consumer {} removed after failed delivery", connection_id);
        }
    }

    pub async fn consumer_count(&self) -> usize {
        self.registry.read().await.consumers.len()
    }

    pub async fn producer_count(&self) -> usize {
        self.registry.read().await.producers.len()
    }

    pub async fn is_registered(&self, connection_id: Uuid) -> bool {
        let registry = self.registry.read().await;
        registry.consumers.contains_key(&connection_id)
            || registry.producers.contains_key(&connection_id)
    }

    /// Snapshot of every registration, producers first.
    pub async fn registrations(&self) -> Vec<ConnectionRegistration> {
        let registry = self.registry.read().await;
        registry
            .producers
            .values()
            .cloned()
            .chain(registry.consumers.values().map(|e| e.registration.clone()))
            .collect()
    }

    /// Stop every writer and forget every connection.
    pub async fn shutdown(&self) {
        let mut registry = self.registry.write().await;
        for (_, entry) in registry.consumers.drain() {
            entry.writer.abort();
        }
        registry.producers.clear();
        registry.sources.clear();
        log::info!("Broadcast hub shut down");
    }
}

async fn run_writer(
    hub: Weak<BroadcastHub>,
    connection_id: Uuid,
    sink: Arc<dyn ConsumerSink>,
    mut rx: mpsc::Receiver<HubMessage>,
    send_timeout: Duration,
) {
    while let Some(message) = rx.recv().await {
        let error = match tokio::time::timeout(send_timeout, sink.send(&message)).await {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(_) => HubError::SendTimeout(send_timeout),
        };

        log::warn!("Delivery to consumer {} failed: {}", connection_id, error);
        if let Some(hub) = hub.upgrade() {
            hub.drop_failed_consumer(connection_id).await;
        }
        return;
    }
}
