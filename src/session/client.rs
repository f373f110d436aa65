use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    stanza::Stanza,
    types::{ClientKey, Jid},
};

use super::{IdSupply, ResponseRouter, Session, SessionError};

/// In-process session: outbound stanzas go to an unbounded queue, inbound
/// replies are matched by a [`ResponseRouter`].
#[derive(Debug)]
pub struct ClientSession {
    key: ClientKey,
    jid: Jid,
    ids: IdSupply,
    router: Arc<ResponseRouter>,
    outbound: mpsc::UnboundedSender<Stanza>,
    shutdown: CancellationToken,
}

impl ClientSession {
    /// Returns the session and the receiving end of its outbound queue.
    pub fn new(
        key: impl Into<ClientKey>,
        jid: impl Into<Jid>,
        ids: IdSupply,
    ) -> (Self, mpsc::UnboundedReceiver<Stanza>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let session = Self {
            key: key.into(),
            jid: jid.into(),
            ids,
            router: Arc::new(ResponseRouter::new()),
            outbound,
            shutdown: CancellationToken::new(),
        };
        (session, outbound_rx)
    }

    /// Reply correlation table for this session.
    pub fn router(&self) -> &Arc<ResponseRouter> {
        &self.router
    }

    /// Offers an inbound stanza to the reply router. Returns it back when no
    /// handler claimed it, so the caller can pass it down the filter chain.
    pub fn deliver(&self, stanza: Stanza) -> Option<Stanza> {
        self.router.route(stanza)
    }

    /// True once [`ClientSession::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Tears the session down: cancels its token and unblocks reply waiters.
    pub fn close(&self) {
        info!(client = %self.key, "closing session");
        self.shutdown.cancel();
        self.router.close();
    }
}

impl Session for ClientSession {
    fn key(&self) -> &ClientKey {
        &self.key
    }

    fn jid(&self) -> &Jid {
        &self.jid
    }

    fn next_id(&self) -> String {
        self.ids.next_id()
    }

    fn expect_reply(&self, id: &str) -> oneshot::Receiver<Stanza> {
        self.router.expect(id)
    }

    fn send(&self, stanza: Stanza) -> Result<(), SessionError> {
        if self.shutdown.is_cancelled() {
            return Err(SessionError::Closed);
        }
        self.outbound.send(stanza).map_err(|_| SessionError::Closed)
    }

    fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
