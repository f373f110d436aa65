use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    runtime::handle::RosterHandle,
    session::Session,
    stanza::{Stanza, StanzaType},
};

/// What [`observe`] did with one inbound stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Not a roster push.
    Ignored,
    /// A roster push whose items were forwarded and acknowledged.
    Applied {
        /// Number of items forwarded to the actor.
        items: usize,
    },
    /// A roster push from a sender other than the account itself.
    Rejected,
    /// A roster push that arrived after the actor stopped. Not acknowledged,
    /// so the server can redeliver it to a later session.
    Dropped {
        /// Number of items the actor accepted before it stopped.
        items: usize,
    },
}

/// Applies `stanza` to `roster` when it is a roster push, then acknowledges it.
///
/// Every accepted push is acknowledged, including pushes that change nothing.
/// A push the actor can no longer take is not acknowledged.
pub async fn observe<S: Session + ?Sized>(
    session: &S,
    roster: &RosterHandle,
    stanza: &Stanza,
) -> PushOutcome {
    if !stanza.is_iq_of(&StanzaType::Set) {
        return PushOutcome::Ignored;
    }
    let Some(query) = stanza.roster_query() else {
        return PushOutcome::Ignored;
    };

    // RFC 6121 2.1.6: only the account's own bare address may push.
    if let Some(from) = &stanza.from {
        if from.bare() != session.jid().bare() {
            warn!(client = %session.key(), from = %from, "ignoring roster push from foreign sender");
            return PushOutcome::Rejected;
        }
    }

    if roster.is_closed() {
        warn!(client = %session.key(), id = ?stanza.id, "roster actor stopped, dropping push");
        return PushOutcome::Dropped { items: 0 };
    }

    let mut items = 0;
    for item in &query.items {
        if let Err(err) = roster.apply_update(item.clone()).await {
            warn!(client = %session.key(), id = ?stanza.id, error = %err, "dropping roster push");
            return PushOutcome::Dropped { items };
        }
        items += 1;
    }

    let ack = stanza.result_reply();
    match session.send(ack) {
        Ok(()) => debug!(client = %session.key(), id = ?stanza.id, items, "roster push acknowledged"),
        Err(err) => warn!(client = %session.key(), error = %err, "failed to acknowledge roster push"),
    }

    PushOutcome::Applied { items }
}

/// Pass-through stage for the session's inbound pipeline.
///
/// Every stanza read from `upstream` is offered to [`observe`] and then
/// forwarded unmodified and in order on the returned receiver. The stage
/// ends when `upstream` closes, the downstream receiver is dropped, or the
/// session shuts down.
pub fn spawn_push_filter<S: Session + ?Sized + 'static>(
    session: Arc<S>,
    roster: RosterHandle,
    mut upstream: mpsc::Receiver<Stanza>,
    capacity: usize,
) -> mpsc::Receiver<Stanza> {
    let (downstream, rx) = mpsc::channel(capacity.max(1));
    let shutdown = session.shutdown_token();

    tokio::spawn(async move {
        loop {
            let stanza = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = upstream.recv() => match next {
                    Some(stanza) => stanza,
                    None => break,
                },
            };

            observe(session.as_ref(), &roster, &stanza).await;

            if downstream.send(stanza).await.is_err() {
                debug!(client = %session.key(), "push filter downstream closed");
                break;
            }
        }
    });

    rx
}
