//! Roster item and query payloads (RFC 3921 §7, RFC 6121 §2).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Jid;

/// Namespace of the roster query payload.
pub const ROSTER_NS: &str = "jabber:iq:roster";

/// Subscription state between the account and a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subscription {
    /// No presence subscription in either direction.
    #[default]
    None,
    /// The account is subscribed to the contact.
    To,
    /// The contact is subscribed to the account.
    From,
    /// Mutual subscription.
    Both,
    /// Tombstone instruction; never stored in a roster.
    Remove,
}

impl Subscription {
    /// Wire attribute value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::To => "to",
            Self::From => "from",
            Self::Both => "both",
            Self::Remove => "remove",
        }
    }

    /// True for the `remove` tombstone.
    pub fn is_remove(self) -> bool {
        self == Self::Remove
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contact entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterItem {
    /// Contact address; the roster key.
    #[serde(rename = "jid")]
    pub address: Jid,
    /// Subscription state, or the `remove` tombstone.
    #[serde(default)]
    pub subscription: Subscription,
    /// Optional display name, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Group membership tags in wire order.
    #[serde(default, rename = "group")]
    pub groups: Vec<String>,
}

impl RosterItem {
    /// Item with no name and no groups.
    pub fn new(address: impl Into<Jid>, subscription: Subscription) -> Self {
        Self {
            address: address.into(),
            subscription,
            name: None,
            groups: Vec::new(),
        }
    }

    /// Tombstone for `address`.
    pub fn removal(address: impl Into<Jid>) -> Self {
        Self::new(address, Subscription::Remove)
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Appends a group tag.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }
}

/// `<query xmlns='jabber:iq:roster'/>` envelope carrying zero or more items.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RosterQuery {
    /// Items in wire order.
    #[serde(default, rename = "item")]
    pub items: Vec<RosterItem>,
}

impl RosterQuery {
    /// Query carrying `items`.
    pub fn with_items(items: Vec<RosterItem>) -> Self {
        Self { items }
    }
}
