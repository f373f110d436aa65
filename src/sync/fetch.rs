use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    roster::RosterQuery,
    runtime::handle::{RosterError, RosterHandle},
    session::{Session, SessionError},
    stanza::{Payload, Stanza, StanzaError, StanzaType},
};

/// Why the initial roster fetch failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered the roster request with an error stanza.
    #[error("server rejected roster request: {0}")]
    Protocol(StanzaError),
    /// The reply carried no roster query.
    #[error("roster result carried no roster query: {0}")]
    UnexpectedResponse(String),
    /// The session ended before the reply arrived.
    #[error("session closed before the roster reply arrived")]
    SessionClosed,
    /// The request could not be sent.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The roster actor stopped while items were being forwarded.
    #[error(transparent)]
    Roster(#[from] RosterError),
    /// [`fetch_roster_with_timeout`] gave up waiting.
    #[error("no roster reply within {0:?}")]
    TimedOut(Duration),
}

/// Requests the full roster and feeds every returned item into `roster`.
///
/// Suspends until the correlated reply arrives or the session closes; there
/// is no internal timeout. Returns the number of items forwarded. On error
/// nothing is forwarded.
pub async fn fetch_roster<S: Session + ?Sized>(
    session: &S,
    roster: &RosterHandle,
) -> Result<usize, FetchError> {
    let id = session.next_id();
    let request = Stanza::iq(StanzaType::Get, id.clone())
        .with_from(session.jid().clone())
        .with_payload(Payload::Roster(RosterQuery::default()));

    // Register before sending so a fast reply cannot slip past.
    let reply = session.expect_reply(&id);
    session.send(request)?;
    debug!(client = %session.key(), id = %id, "roster request sent");

    let reply = reply.await.map_err(|_| FetchError::SessionClosed)?;
    apply_reply(reply, roster).await
}

/// [`fetch_roster`] bounded by `limit`.
pub async fn fetch_roster_with_timeout<S: Session + ?Sized>(
    session: &S,
    roster: &RosterHandle,
    limit: Duration,
) -> Result<usize, FetchError> {
    tokio::time::timeout(limit, fetch_roster(session, roster))
        .await
        .map_err(|_| FetchError::TimedOut(limit))?
}

async fn apply_reply(mut reply: Stanza, roster: &RosterHandle) -> Result<usize, FetchError> {
    if reply.is_iq_of(&StanzaType::Error) {
        let err = reply
            .error
            .unwrap_or_else(|| StanzaError::new("cancel", "undefined-condition"));
        warn!(error = %err, "roster request rejected");
        return Err(FetchError::Protocol(err));
    }

    let Some(query) = reply.take_roster_query() else {
        return Err(FetchError::UnexpectedResponse(reply.to_string()));
    };

    let count = query.items.len();
    roster.apply_all(query.items).await?;
    debug!(items = count, "roster fetched");
    Ok(count)
}
