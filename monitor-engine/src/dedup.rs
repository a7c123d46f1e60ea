//! TTL-bounded string set used independently by C5 (event dedup,
//! finalized-context guard) and C6 (its own event-identity dedup) —
//! Section 4.5, Section 4.6. Eviction is lazy: swept on the next
//! `contains`/`insert` rather than by a background task, since the engine
//! has no spare worker to run one.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct TtlSet {
    ttl: Duration,
    entries: HashMap<String, Instant>,
}

impl TtlSet {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn contains(&mut self, key: &str) -> bool {
        self.evict_expired();
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: String) {
        self.evict_expired();
        self.entries.insert(key, Instant::now());
    }

    fn evict_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, inserted_at| inserted_at.elapsed() < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_inserted_key_within_ttl() {
        let mut set = TtlSet::new(Duration::from_secs(60));
        assert!(!set.contains("a"));
        set.insert("a".to_string());
        assert!(set.contains("a"));
    }

    #[test]
    fn forgets_after_ttl_elapses() {
        let mut set = TtlSet::new(Duration::from_millis(10));
        set.insert("a".to_string());
        std::thread::sleep(Duration::from_millis(30));
        assert!(!set.contains("a"));
    }
}
