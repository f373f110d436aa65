//! In-memory roster cache.

/// Address-keyed roster map and materialized snapshot.
pub mod cache;
