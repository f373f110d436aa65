//! Client-side roster synchronization for XMPP-style sessions.
//!
//! Each session owns one roster actor: a task that holds the contact map and
//! serializes every update and read through a single command queue. The
//! initial fetch and server pushes both feed that actor; readers get a
//! point-in-time copy.
//!
//! # Examples
//!
//! In-memory usage with [`core::cache::RosterCache`]:
//! ```
//! use xmpp_roster::{
//!     core::cache::RosterCache,
//!     roster::{RosterItem, Subscription},
//! };
//!
//! let mut cache = RosterCache::new();
//! cache.apply(RosterItem::new("juliet@example.com", Subscription::Both));
//! cache.apply(RosterItem::removal("juliet@example.com"));
//! assert!(cache.snapshot().is_empty());
//! ```
//!
//! Session usage with the registry:
//! ```no_run
//! use std::sync::Arc;
//!
//! use tokio::sync::mpsc;
//! use xmpp_roster::{
//!     registry::RosterRegistry,
//!     runtime::handle::RosterConfig,
//!     session::{ClientSession, IdSupply},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = RosterRegistry::new(RosterConfig::default());
//! let (session, _outbound) = ClientSession::new("c1", "romeo@example.net/orchard", IdSupply::new());
//! let session = Arc::new(session);
//! let (_inbound_tx, inbound_rx) = mpsc::channel(64);
//!
//! let (roster, _downstream) = registry.start(Arc::clone(&session), inbound_rx).expect("start");
//! // The transport delivers the reply through `session.deliver(..)`.
//! registry.fetch(session.as_ref()).await.expect("fetch");
//! let contacts = roster.snapshot().await.expect("snapshot");
//! println!("{} contacts", contacts.len());
//! session.close();
//! # }
//! ```
#![warn(missing_docs)]

/// In-memory roster cache.
pub mod core;
/// Per-client actor registry.
pub mod registry;
/// Roster item and query payloads.
pub mod roster;
/// Single-owner roster actor and events.
pub mod runtime;
/// Session seam and in-process rendition.
pub mod session;
/// Stanza envelope model.
pub mod stanza;
/// Initial fetch and push handling.
pub mod sync;
/// Shared identifier types.
pub mod types;
