//! Change detection for log suppression
//!
//! Resolution runs on every reconcile; logging the discovered subnets each
//! time would flood the logs. [`ChangeMonitor`] remembers a fingerprint per
//! key and reports whether a new value differs from the last one seen.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use dashmap::DashMap;

/// Upper bound on remembered keys before the monitor starts over
pub const MAX_TRACKED_KEYS: usize = 1024;

/// Tracks the last observed fingerprint per key
#[derive(Debug)]
pub struct ChangeMonitor {
    last_seen: DashMap<String, u64>,
    limit: usize,
}

impl Default for ChangeMonitor {
    fn default() -> Self {
        Self {
            last_seen: DashMap::new(),
            limit: MAX_TRACKED_KEYS,
        }
    }
}

impl ChangeMonitor {
    /// Create an empty monitor
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` under `key`, returning true if it differs from the previous value
    pub fn has_changed<T: Hash + ?Sized>(&self, key: &str, value: &T) -> bool {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        let fingerprint = hasher.finish();

        // Start over once full
        if self.last_seen.len() >= self.limit && !self.last_seen.contains_key(key) {
            self.last_seen.clear();
        }
        match self.last_seen.insert(key.to_string(), fingerprint) {
            Some(previous) => previous != fingerprint,
            None => true,
        }
    }
}
