//! Roster change notifications.

use crate::types::Jid;

/// Events emitted from the roster actor loop after a change is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEvent {
    /// A contact was added.
    Added {
        /// Contact address.
        address: Jid,
    },
    /// A stored contact changed.
    Updated {
        /// Contact address.
        address: Jid,
    },
    /// A contact was removed by a tombstone.
    Removed {
        /// Contact address.
        address: Jid,
    },
}
