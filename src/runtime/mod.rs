//! Single-owner roster actor and its change events.

/// Change events emitted by the actor.
pub mod events;
/// Actor handle and command loop.
pub mod handle;
