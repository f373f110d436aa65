use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Shared source of fresh correlation ids.
///
/// Clones draw from the same counter, so one supply can serve every session
/// in a process.
#[derive(Debug, Clone, Default)]
pub struct IdSupply {
    prefix: Arc<str>,
    next: Arc<AtomicU64>,
}

impl IdSupply {
    /// Supply with unprefixed ids.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply whose ids start with `prefix`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: Arc::from(prefix),
            next: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Next unused id.
    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{n:x}", self.prefix)
    }
}
