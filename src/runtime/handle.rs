use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    core::cache::{Applied, RosterCache},
    roster::RosterItem,
    types::Jid,
};

use super::events::RosterEvent;

/// Failure to reach the roster actor.
#[derive(Debug, Error)]
pub enum RosterError {
    /// The actor task has stopped and its queue is closed.
    #[error("roster actor is no longer running")]
    ActorGone,
}

/// Queue sizing for one roster actor. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Capacity of the actor's command queue. Senders wait when it is full.
    pub command_queue_bound: usize,
    /// Capacity of the change-event broadcast ring.
    pub event_capacity: usize,
    /// Capacity of the push filter's downstream queue.
    pub filter_queue_bound: usize,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
            filter_queue_bound: 64,
        }
    }
}

impl RosterConfig {
    /// Parses a JSON object; missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Cloneable handle to one session's roster actor.
///
/// Updates and reads share a single FIFO queue, so a read submitted after an
/// update has been submitted always observes that update.
#[derive(Clone)]
pub struct RosterHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<RosterEvent>,
    shutdown: CancellationToken,
}

enum Command {
    Update {
        item: RosterItem,
    },
    Snapshot {
        resp: oneshot::Sender<Vec<RosterItem>>,
    },
    Get {
        address: Jid,
        resp: oneshot::Sender<Option<RosterItem>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Starts a roster actor with an empty cache.
///
/// The actor runs until `parent` is cancelled, [`RosterHandle::shutdown`] or
/// [`RosterHandle::cancel`] is called, or every handle is dropped.
pub fn spawn_roster(config: RosterConfig, parent: &CancellationToken) -> RosterHandle {
    spawn_roster_with(RosterCache::new(), config, parent)
}

/// Starts a roster actor over an existing cache.
pub fn spawn_roster_with(
    cache: RosterCache,
    config: RosterConfig,
    parent: &CancellationToken,
) -> RosterHandle {
    let shutdown = parent.child_token();
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<RosterEvent>(config.event_capacity.max(1));

    let events_tx_loop = events_tx.clone();
    let cancel = shutdown.clone();

    tokio::spawn(async move {
        let mut cache = cache;
        info!(entries = cache.len(), "roster actor started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("roster actor cancelled");
                    break;
                }
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if handle_command(cmd, &mut cache, &events_tx_loop, &cancel) {
                        break;
                    }
                }
            }
        }

        info!(entries = cache.len(), "roster actor stopped");
    });

    RosterHandle {
        cmd_tx,
        events_tx,
        shutdown,
    }
}

impl RosterHandle {
    /// Receives change events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RosterEvent> {
        self.events_tx.subscribe()
    }

    /// Queues one upsert or tombstone. Returns once the actor has accepted it.
    pub async fn apply_update(&self, item: RosterItem) -> Result<(), RosterError> {
        self.cmd_tx
            .send(Command::Update { item })
            .await
            .map_err(|_| RosterError::ActorGone)
    }

    /// Queues each item in order. Items are applied independently.
    pub async fn apply_all(
        &self,
        items: impl IntoIterator<Item = RosterItem>,
    ) -> Result<(), RosterError> {
        for item in items {
            self.apply_update(item).await?;
        }
        Ok(())
    }

    /// Copy of the roster as of every update queued before this call.
    pub async fn snapshot(&self) -> Result<Vec<RosterItem>, RosterError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Snapshot { resp: tx })
            .await
            .map_err(|_| RosterError::ActorGone)?;
        rx.await.map_err(|_| RosterError::ActorGone)
    }

    /// Same as [`RosterHandle::snapshot`] for callers outside the runtime.
    ///
    /// Panics if called from within an async context, as tokio's blocking
    /// channel operations do.
    pub fn blocking_snapshot(&self) -> Result<Vec<RosterItem>, RosterError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .blocking_send(Command::Snapshot { resp: tx })
            .map_err(|_| RosterError::ActorGone)?;
        rx.blocking_recv().map_err(|_| RosterError::ActorGone)
    }

    /// Current entry for `address`, if any.
    pub async fn get(&self, address: impl Into<Jid>) -> Result<Option<RosterItem>, RosterError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Get {
                address: address.into(),
                resp: tx,
            })
            .await
            .map_err(|_| RosterError::ActorGone)?;
        rx.await.map_err(|_| RosterError::ActorGone)
    }

    /// Stops the actor after everything queued ahead of this call is applied.
    pub async fn shutdown(&self) -> Result<(), RosterError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RosterError::ActorGone)?;
        rx.await.map_err(|_| RosterError::ActorGone)
    }

    /// Stops the actor without draining the queue. Pending callers get
    /// [`RosterError::ActorGone`].
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// True once the actor has stopped or been told to stop.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.cmd_tx.is_closed()
    }
}

fn handle_command(
    cmd: Command,
    cache: &mut RosterCache,
    events_tx: &broadcast::Sender<RosterEvent>,
    shutdown: &CancellationToken,
) -> bool {
    match cmd {
        Command::Update { item } => {
            let address = item.address.clone();
            let subscription = item.subscription;
            let applied = cache.apply(item);
            debug!(jid = %address, %subscription, ?applied, "roster update applied");

            let event = match applied {
                Applied::Added => Some(RosterEvent::Added { address }),
                Applied::Updated { .. } => Some(RosterEvent::Updated { address }),
                Applied::Removed { .. } => Some(RosterEvent::Removed { address }),
                Applied::Unchanged | Applied::RemovedAbsent => None,
            };
            if let Some(event) = event {
                let _ = events_tx.send(event);
            }
        }
        Command::Snapshot { resp } => {
            let _ = resp.send(cache.snapshot_cloned());
        }
        Command::Get { address, resp } => {
            let _ = resp.send(cache.get(&address).cloned());
        }
        Command::Shutdown { resp } => {
            // Mark the handle closed before the caller resumes.
            shutdown.cancel();
            let _ = resp.send(());
            return true;
        }
    }

    false
}
