use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

use crate::backend::Freshness;

struct StoredEntry {
    value: Value,
    fresh_until: Instant,
    stale_until: Instant,
}

/// Reference in-memory store. Entries carry their own fresh/stale
/// window pair, which the tier table needs per key; a cache with one
/// global TTL cannot express that.
pub struct MemoryStore {
    entries: DashMap<String, StoredEntry>,
    stale_multiplier: u32,
}

impl MemoryStore {
    /// `stale_multiplier >= 1`: the stale window is the fresh TTL
    /// multiplied by it. Pass 1 for plain TTL semantics.
    pub fn new(stale_multiplier: u32) -> Self {
        Self {
            entries: DashMap::new(),
            stale_multiplier: stale_multiplier.max(1),
        }
    }

    pub fn set(&self, key: &str, value: &Value, ttl: Duration) {
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.clone(),
                fresh_until: now + ttl,
                stale_until: now + ttl * self.stale_multiplier,
            },
        );
    }

    pub fn probe(&self, key: &str) -> Option<(Value, Freshness)> {
        let now = Instant::now();
        let hit = self.entries.get(key).map(|entry| {
            if now <= entry.fresh_until {
                Some((entry.value.clone(), Freshness::Fresh))
            }
            else if now <= entry.stale_until {
                Some((entry.value.clone(), Freshness::Stale))
            }
            else {
                None
            }
        })?;
        if hit.is_none() {
            // Evicted: drop the dead entry on the way out.
            self.entries.remove(key);
        }
        hit
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.probe(key).map(|(value, _)| value)
    }

    pub fn del(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.probe(key).is_some()
    }

    pub fn keys_matching(&self, pattern: &str) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| now <= entry.stale_until)
            .filter(|entry| glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// `*` matches any run of characters, `?` matches exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < text.len() {
        if pi < pattern.len()
            && (pattern[pi] == '?' || pattern[pi] == text[ti])
        {
            pi += 1;
            ti += 1;
        }
        else if pi < pattern.len() && pattern[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        }
        else if let Some((star_pi, star_ti)) = backtrack {
            // Let the last `*` swallow one more character and retry.
            backtrack = Some((star_pi, star_ti + 1));
            pi = star_pi + 1;
            ti = star_ti + 1;
        }
        else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }
    pi == pattern.len()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::time::sleep;

    use super::*;

    #[test]
    fn glob_wildcards() {
        assert!(glob_match("hot:odds:*", "hot:odds:1001"));
        assert!(glob_match("hot:odds:*", "hot:odds:"));
        assert!(!glob_match("hot:odds:*", "hot:banners:1001"));
        assert!(glob_match("odds:?", "odds:7"));
        assert!(!glob_match("odds:?", "odds:77"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("matches:*:live", "matches:4:live"));
        assert!(!glob_match("matches:*:live", "matches:4:closed"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exact2"));
    }

    #[test]
    fn set_then_get_within_ttl() {
        let store = MemoryStore::new(2);
        store.set("odds:1", &json!({"back": 1.98}), Duration::from_secs(60));

        assert_eq!(store.get("odds:1"), Some(json!({"back": 1.98})));
        assert!(store.exists("odds:1"));
        assert_eq!(
            store.probe("odds:1").unwrap().1,
            Freshness::Fresh
        );
    }

    #[tokio::test]
    async fn entry_turns_stale_then_evicts() {
        let store = MemoryStore::new(2);
        store.set("odds:1", &json!(1), Duration::from_millis(40));

        sleep(Duration::from_millis(55)).await;
        let (value, freshness) = store.probe("odds:1").unwrap();
        assert_eq!(value, json!(1));
        assert_eq!(freshness, Freshness::Stale);

        sleep(Duration::from_millis(40)).await;
        assert_eq!(store.probe("odds:1"), None);
        assert!(!store.exists("odds:1"));
    }

    #[test]
    fn stale_multiplier_one_means_plain_ttl() {
        let store = MemoryStore::new(1);
        store.set("k", &json!(1), Duration::from_secs(1));
        // fresh_until == stale_until, so there is no stale window.
        let entry = store.entries.get("k").unwrap();
        assert_eq!(entry.fresh_until, entry.stale_until);
    }

    #[test]
    fn del_removes_the_entry() {
        let store = MemoryStore::new(2);
        store.set("k", &json!(1), Duration::from_secs(60));
        assert!(store.del("k"));
        assert!(!store.del("k"));
        assert_eq!(store.get("k"), None);
    }

    #[tokio::test]
    async fn keys_matching_skips_evicted_entries() {
        let store = MemoryStore::new(1);
        store.set("hot:odds:1", &json!(1), Duration::from_secs(60));
        store.set("hot:odds:2", &json!(2), Duration::from_millis(20));
        store.set("matches:4", &json!(3), Duration::from_secs(60));

        sleep(Duration::from_millis(40)).await;
        let mut keys = store.keys_matching("hot:odds:*");
        keys.sort();
        assert_eq!(keys, vec!["hot:odds:1"]);
    }
}
