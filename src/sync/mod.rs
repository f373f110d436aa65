//! Wire procedures that feed the roster actor.

/// One-shot initial roster fetch.
pub mod fetch;
/// Inbound roster push tap.
pub mod push;
