//! Narrow view of the client session the roster flows run against.
//!
//! The real transport, XML codec and filter chain live elsewhere. The
//! [`Session`] trait is the seam; [`ClientSession`] is an in-process
//! rendition used by the registry and the tests.

mod client;
mod ids;
mod router;

pub use client::ClientSession;
pub use ids::IdSupply;
pub use router::ResponseRouter;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{
    stanza::Stanza,
    types::{ClientKey, Jid},
};

/// Failure on the session's outbound path.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session has been torn down.
    #[error("session is closed")]
    Closed,
}

/// Capabilities a connected client exposes to the roster flows.
pub trait Session: Send + Sync {
    /// Key identifying this session within the process.
    fn key(&self) -> &ClientKey;

    /// The client's own full address.
    fn jid(&self) -> &Jid;

    /// Fresh correlation id from the client-wide supply.
    fn next_id(&self) -> String;

    /// Registers a one-shot handler for the reply correlated to `id`.
    ///
    /// The receiver resolves at most once. It errors when the session
    /// closes before a reply arrives.
    fn expect_reply(&self, id: &str) -> oneshot::Receiver<Stanza>;

    /// Queues an outbound stanza.
    fn send(&self, stanza: Stanza) -> Result<(), SessionError>;

    /// Token cancelled when the session is torn down.
    fn shutdown_token(&self) -> CancellationToken;
}
