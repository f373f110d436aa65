//! Minimal stanza envelope exchanged with the dispatch layer.
//!
//! XML (de)serialization belongs to the transport. This module only models
//! the attributes and nested payloads the roster flows inspect.

use std::fmt;

use thiserror::Error;

use crate::{
    roster::RosterQuery,
    types::{Jid, StanzaId},
};

/// Top-level stanza element name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StanzaKind {
    /// `<iq/>`
    Iq,
    /// `<message/>`
    Message,
    /// `<presence/>`
    Presence,
}

/// Value of the `type` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StanzaType {
    /// Request for information.
    Get,
    /// Request to change state, or a server push.
    Set,
    /// Successful reply.
    Result,
    /// Error reply.
    Error,
    /// Any other value (message and presence types).
    Other(String),
}

impl StanzaType {
    /// Wire attribute value.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Result => "result",
            Self::Error => "error",
            Self::Other(v) => v,
        }
    }
}

/// `<error/>` child of an error reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{condition} ({error_type}){}", text_suffix(.text))]
pub struct StanzaError {
    /// `type` attribute, e.g. `cancel` or `auth`.
    pub error_type: String,
    /// Defined condition element name, e.g. `service-unavailable`.
    pub condition: String,
    /// Optional human-readable text.
    pub text: Option<String>,
}

impl StanzaError {
    /// Error without descriptive text.
    pub fn new(error_type: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            condition: condition.into(),
            text: None,
        }
    }
}

fn text_suffix(text: &Option<String>) -> String {
    text.as_deref().map(|t| format!(": {t}")).unwrap_or_default()
}

/// Nested child payload of a stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// `jabber:iq:roster` query.
    Roster(RosterQuery),
    /// Payload from any other extension; kept opaque.
    Other {
        /// Element namespace.
        namespace: String,
        /// Element local name.
        name: String,
    },
}

/// One inbound or outbound stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stanza {
    /// Element name.
    pub kind: StanzaKind,
    /// `id` attribute.
    pub id: Option<StanzaId>,
    /// `from` attribute.
    pub from: Option<Jid>,
    /// `to` attribute.
    pub to: Option<Jid>,
    /// `type` attribute.
    pub stanza_type: Option<StanzaType>,
    /// Error child, present on error replies.
    pub error: Option<StanzaError>,
    /// Nested payloads in document order.
    pub nested: Vec<Payload>,
}

impl Stanza {
    /// Empty stanza of the given kind.
    pub fn new(kind: StanzaKind) -> Self {
        Self {
            kind,
            id: None,
            from: None,
            to: None,
            stanza_type: None,
            error: None,
            nested: Vec::new(),
        }
    }

    /// `<iq/>` with a type and id.
    pub fn iq(stanza_type: StanzaType, id: impl Into<StanzaId>) -> Self {
        Self {
            id: Some(id.into()),
            stanza_type: Some(stanza_type),
            ..Self::new(StanzaKind::Iq)
        }
    }

    /// Sets `from`.
    pub fn with_from(mut self, from: impl Into<Jid>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets `to`.
    pub fn with_to(mut self, to: impl Into<Jid>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Appends a nested payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.nested.push(payload);
        self
    }

    /// Marks the stanza as an error reply carrying `error`.
    pub fn with_error(mut self, error: StanzaError) -> Self {
        self.stanza_type = Some(StanzaType::Error);
        self.error = Some(error);
        self
    }

    /// True when this is an `<iq/>` of the given type.
    pub fn is_iq_of(&self, stanza_type: &StanzaType) -> bool {
        self.kind == StanzaKind::Iq && self.stanza_type.as_ref() == Some(stanza_type)
    }

    /// First nested roster query, if any.
    pub fn roster_query(&self) -> Option<&RosterQuery> {
        self.nested.iter().find_map(|p| match p {
            Payload::Roster(q) => Some(q),
            Payload::Other { .. } => None,
        })
    }

    /// Removes and returns the first roster query.
    pub fn take_roster_query(&mut self) -> Option<RosterQuery> {
        let at = self.nested.iter().position(|p| matches!(p, Payload::Roster(_)))?;
        match self.nested.remove(at) {
            Payload::Roster(query) => Some(query),
            Payload::Other { .. } => None,
        }
    }

    /// Empty `iq type=result` acknowledging this stanza, addressed to its sender.
    pub fn result_reply(&self) -> Stanza {
        Stanza {
            id: self.id.clone(),
            to: self.from.clone(),
            stanza_type: Some(StanzaType::Result),
            ..Stanza::new(StanzaKind::Iq)
        }
    }
}

impl fmt::Display for Stanza {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            StanzaKind::Iq => "iq",
            StanzaKind::Message => "message",
            StanzaKind::Presence => "presence",
        };
        write!(f, "<{name}")?;
        if let Some(id) = &self.id {
            write!(f, " id='{id}'")?;
        }
        if let Some(ty) = &self.stanza_type {
            write!(f, " type='{}'", ty.as_str())?;
        }
        if let Some(from) = &self.from {
            write!(f, " from='{from}'")?;
        }
        if let Some(to) = &self.to {
            write!(f, " to='{to}'")?;
        }
        write!(f, "> with {} payload(s)", self.nested.len())
    }
}
