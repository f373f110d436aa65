use std::sync::{Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    stanza::{Stanza, StanzaType},
    types::StanzaId,
};

/// Routes correlated `iq` replies to the one-shot handler waiting for them.
#[derive(Debug, Default)]
pub struct ResponseRouter {
    pending: Mutex<Pending>,
}

#[derive(Debug, Default)]
struct Pending {
    closed: bool,
    handlers: HashMap<StanzaId, oneshot::Sender<Stanza>>,
}

impl ResponseRouter {
    /// Open router with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `id`. A handler already waiting on the same id
    /// is replaced and its receiver errors. After [`ResponseRouter::close`]
    /// the returned receiver errors immediately.
    pub fn expect(&self, id: &str) -> oneshot::Receiver<Stanza> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.lock();
        if !pending.closed {
            pending.handlers.insert(id.to_string(), tx);
        }
        rx
    }

    /// Hands `stanza` to the handler waiting on its id and forgets that
    /// handler. Stanzas that are not `iq` result/error replies, or whose id
    /// nobody waits on, are returned to the caller untouched.
    pub fn route(&self, stanza: Stanza) -> Option<Stanza> {
        let is_reply =
            stanza.is_iq_of(&StanzaType::Result) || stanza.is_iq_of(&StanzaType::Error);
        if !is_reply {
            return Some(stanza);
        }
        let Some(id) = stanza.id.as_deref() else {
            return Some(stanza);
        };

        let handler = self.lock().handlers.remove(id);
        match handler {
            Some(tx) => {
                debug!(id, "routing correlated reply");
                // A dropped receiver means the waiter gave up; the reply is consumed either way.
                let _ = tx.send(stanza);
                None
            }
            None => Some(stanza),
        }
    }

    /// Drops every pending handler so their waiters unblock.
    pub fn close(&self) {
        let mut pending = self.lock();
        pending.closed = true;
        pending.handlers.clear();
    }

    /// Number of requests still waiting for a reply.
    pub fn pending(&self) -> usize {
        self.lock().handlers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
