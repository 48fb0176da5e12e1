//! Links locally submitted messages to the server task handling them.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Shared message id → task id table.
///
/// Clones share one table. Entries are written once and kept for the
/// lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct Correlator {
    links: Arc<RwLock<HashMap<String, String>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message_id → task_id` unless the message is already linked.
    /// Returns whether a new link was stored.
    pub fn record(&self, message_id: &str, task_id: &str) -> bool {
        if message_id.is_empty() || task_id.is_empty() {
            return false;
        }
        let mut links = self.links.write().unwrap_or_else(PoisonError::into_inner);
        if links.contains_key(message_id) {
            return false;
        }
        links.insert(message_id.to_string(), task_id.to_string());
        true
    }

    pub fn lookup(&self, message_id: &str) -> Option<String> {
        self.links
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(message_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.links.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
