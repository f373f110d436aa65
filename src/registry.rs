//! Per-client roster actors, keyed by session.
//!
//! A [`RosterRegistry`] is an ordinary owned value. Hosts that run several
//! client sessions keep one and pass it where needed; single-session hosts
//! can skip it and hold the [`RosterHandle`] directly.

use std::sync::{Arc, PoisonError, RwLock};

use hashbrown::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    roster::RosterItem,
    runtime::handle::{RosterConfig, RosterError, RosterHandle, spawn_roster},
    session::Session,
    stanza::Stanza,
    sync::{
        fetch::{FetchError, fetch_roster},
        push::spawn_push_filter,
    },
    types::ClientKey,
};

/// Registry lookup and lifecycle failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A live roster is already registered for this client.
    #[error("client {0} already has a roster")]
    AlreadyRegistered(ClientKey),
    /// No live roster is registered for this client.
    #[error("no roster registered for client {0}")]
    UnknownClient(ClientKey),
    /// The client's actor could not be reached.
    #[error(transparent)]
    Roster(#[from] RosterError),
    /// The initial fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Maps each client key to its running roster actor.
#[derive(Default)]
pub struct RosterRegistry {
    config: RosterConfig,
    clients: RwLock<HashMap<ClientKey, RosterHandle>>,
}

impl RosterRegistry {
    /// Empty registry whose actors use `config`.
    pub fn new(config: RosterConfig) -> Self {
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Starts the roster actor for `session` and installs the push filter on
    /// its inbound stream.
    ///
    /// Returns the actor handle and the filtered stream, which carries every
    /// inbound stanza unchanged for the next pipeline stage. The actor stops
    /// when the session's shutdown token fires. An entry whose actor has
    /// already stopped is replaced, so a key can be started again after its
    /// session closes.
    pub fn start<S: Session + ?Sized + 'static>(
        &self,
        session: Arc<S>,
        inbound: mpsc::Receiver<Stanza>,
    ) -> Result<(RosterHandle, mpsc::Receiver<Stanza>), RegistryError> {
        let key = session.key().clone();
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        match clients.get(&key) {
            Some(existing) if !existing.is_closed() => {
                return Err(RegistryError::AlreadyRegistered(key));
            }
            Some(_) => debug!(client = %key, "replacing stopped roster"),
            None => {}
        }

        let roster = spawn_roster(self.config.clone(), &session.shutdown_token());
        let downstream = spawn_push_filter(
            session,
            roster.clone(),
            inbound,
            self.config.filter_queue_bound,
        );
        clients.insert(key.clone(), roster.clone());
        info!(client = %key, "roster registered");

        Ok((roster, downstream))
    }

    /// Runs the initial fetch for a registered session.
    pub async fn fetch<S: Session + ?Sized>(&self, session: &S) -> Result<usize, RegistryError> {
        let roster = self.require(session.key())?;
        Ok(fetch_roster(session, &roster).await?)
    }

    /// Current roster of the client registered under `key`.
    pub async fn snapshot(&self, key: &ClientKey) -> Result<Vec<RosterItem>, RegistryError> {
        let roster = self.require(key)?;
        Ok(roster.snapshot().await?)
    }

    /// Handle for `key` while its actor is running.
    pub fn handle(&self, key: &ClientKey) -> Option<RosterHandle> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .filter(|roster| !roster.is_closed())
            .cloned()
    }

    /// Forgets `key` and stops its actor.
    pub fn remove(&self, key: &ClientKey) -> Option<RosterHandle> {
        let removed = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if let Some(roster) = &removed {
            roster.cancel();
            info!(client = %key, "roster unregistered");
        }
        removed
    }

    /// Number of clients with a running actor.
    pub fn len(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|roster| !roster.is_closed())
            .count()
    }

    /// Drops entries whose actor has stopped. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        let before = clients.len();
        clients.retain(|key, roster| {
            let live = !roster.is_closed();
            if !live {
                debug!(client = %key, "pruning stopped roster");
            }
            live
        });
        before - clients.len()
    }

    /// True when no client has a running actor.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn require(&self, key: &ClientKey) -> Result<RosterHandle, RegistryError> {
        self.handle(key)
            .ok_or_else(|| RegistryError::UnknownClient(key.clone()))
    }
}
