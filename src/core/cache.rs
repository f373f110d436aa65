use hashbrown::HashMap;

use crate::{roster::RosterItem, types::Jid};

/// Effect of applying one item to a [`RosterCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A new address was stored.
    Added,
    /// An existing entry was overwritten with different content.
    Updated {
        /// Entry before the overwrite.
        previous: RosterItem,
    },
    /// The item matched the stored entry exactly.
    Unchanged,
    /// A tombstone deleted an existing entry.
    Removed {
        /// Entry that was deleted.
        previous: RosterItem,
    },
    /// A tombstone named an address that was not stored.
    RemovedAbsent,
}

impl Applied {
    /// True when the roster content differs from before the apply.
    pub fn changed(&self) -> bool {
        matches!(self, Self::Added | Self::Updated { .. } | Self::Removed { .. })
    }
}

/// Address-keyed roster map plus its materialized snapshot.
///
/// Single-owner and not synchronized. [`crate::runtime::handle`] wraps one
/// of these in a task to make it shareable.
#[derive(Debug, Default)]
pub struct RosterCache {
    entries: HashMap<Jid, RosterItem>,
    snapshot: Vec<RosterItem>,
}

impl RosterCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding `items`, applied in order.
    pub fn from_items(items: impl IntoIterator<Item = RosterItem>) -> Self {
        let mut cache = Self::new();
        for item in items {
            cache.apply_inner(item);
        }
        cache.rebuild_snapshot();
        cache
    }

    /// Upserts `item`, or deletes its address when it is a `remove` tombstone.
    /// The snapshot is rebuilt before returning whenever the map changed.
    pub fn apply(&mut self, item: RosterItem) -> Applied {
        let applied = self.apply_inner(item);
        if applied.changed() {
            self.rebuild_snapshot();
        }
        applied
    }

    /// Entry stored under `address`.
    pub fn get(&self, address: &Jid) -> Option<&RosterItem> {
        self.entries.get(address)
    }

    /// Number of contacts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the roster holds no contacts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current snapshot, ordered by address.
    pub fn snapshot(&self) -> &[RosterItem] {
        &self.snapshot
    }

    /// Owned copy of [`RosterCache::snapshot`].
    pub fn snapshot_cloned(&self) -> Vec<RosterItem> {
        self.snapshot.clone()
    }

    fn apply_inner(&mut self, item: RosterItem) -> Applied {
        if item.subscription.is_remove() {
            return match self.entries.remove(&item.address) {
                Some(previous) => Applied::Removed { previous },
                None => Applied::RemovedAbsent,
            };
        }

        match self.entries.get_mut(&item.address) {
            Some(existing) if *existing == item => Applied::Unchanged,
            Some(existing) => {
                let previous = std::mem::replace(existing, item);
                Applied::Updated { previous }
            }
            None => {
                self.entries.insert(item.address.clone(), item);
                Applied::Added
            }
        }
    }

    fn rebuild_snapshot(&mut self) {
        let mut snapshot: Vec<RosterItem> = self.entries.values().cloned().collect();
        snapshot.sort_unstable_by(|a, b| a.address.cmp(&b.address));
        self.snapshot = snapshot;
    }
}
