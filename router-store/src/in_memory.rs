use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::CoordinationStore;

/// `dashmap`-backed implementation of [`CoordinationStore`] used by every
/// strategy/health/keep-alive unit test so none of them need a running
/// Redis. Preserves the same compare-and-set semantics as the Redis-backed
/// implementation.
#[derive(Default)]
pub struct InMemoryStore {
    hashes: DashMap<String, DashMap<String, String>>,
    keys: DashMap<String, String>,
    sets: DashMap<String, HashSet<String>>,
    // sorted sets: key -> (member -> score), scanned in order at read time.
    sorted_sets: DashMap<String, Mutex<BTreeMap<String, f64>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationStore for InMemoryStore {
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self
            .hashes
            .get(key)
            .and_then(|h| h.get(field).map(|v| v.clone())))
    }

    async fn hash_set_if_absent_or_false(&self, key: &str, field: &str) -> Result<bool> {
        let hash = self.hashes.entry(key.to_string()).or_default();
        let free = hash.get(field).map_or(true, |v| v.as_str() == "false");
        if free {
            hash.insert(field.to_string(), "true".to_string());
        }
        Ok(free)
    }

    async fn hash_del(&self, key: &str, field: &str) -> Result<()> {
        if let Some(hash) = self.hashes.get(key) {
            hash.remove(field);
        }
        Ok(())
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let hash = self.hashes.entry(key.to_string()).or_default();
        hash.insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .hashes
            .get(key)
            .map(|h| {
                h.iter()
                    .map(|e| (e.key().clone(), e.value().clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn key_set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        match self.keys.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(value.to_string());
                Ok(true)
            }
        }
    }

    async fn key_set(&self, key: &str, value: &str) -> Result<()> {
        self.keys.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn key_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.keys.get(key).map(|v| v.clone()))
    }

    async fn key_del(&self, key: &str) -> Result<()> {
        self.keys.remove(key);
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let set = self.sorted_sets.entry(key.to_string()).or_default();
        set.lock().await.insert(member.to_string(), score);
        Ok(())
    }

    async fn sorted_set_range_by_score(&self, key: &str, max_score: f64) -> Result<Vec<String>> {
        let Some(set) = self.sorted_sets.get(key) else {
            return Ok(Vec::new());
        };
        let guard = set.lock().await;
        let mut out: Vec<(String, f64)> = guard
            .iter()
            .filter(|(_, score)| **score <= max_score)
            .map(|(m, s)| (m.clone(), *s))
            .collect();
        out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        Ok(out.into_iter().map(|(m, _)| m).collect())
    }

    async fn sorted_set_rem(&self, key: &str, member: &str) -> Result<()> {
        if let Some(set) = self.sorted_sets.get(key) {
            set.lock().await.remove(member);
        }
        Ok(())
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let suffix = pattern.trim_start_matches('*');
        let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
        let matches = |k: &str| -> bool {
            if pattern.starts_with('*') && pattern.ends_with('*') {
                k.contains(pattern.trim_matches('*'))
            } else if pattern.starts_with('*') {
                k.ends_with(suffix)
            } else if pattern.ends_with('*') {
                k.starts_with(prefix)
            } else {
                k == pattern
            }
        };

        let mut out = Vec::new();
        out.extend(self.hashes.iter().map(|e| e.key().clone()).filter(|k| matches(k)));
        out.extend(self.keys.iter().map(|e| e.key().clone()).filter(|k| matches(k)));
        out.extend(self.sets.iter().map(|e| e.key().clone()).filter(|k| matches(k)));
        out.extend(
            self.sorted_sets
                .iter()
                .map(|e| e.key().clone())
                .filter(|k| matches(k)),
        );
        Ok(out)
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.hashes.remove(key);
            self.keys.remove(key);
            self.sets.remove(key);
            self.sorted_sets.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_set_if_absent_or_false_is_exclusive() {
        let store = InMemoryStore::new();
        assert!(store.hash_set_if_absent_or_false("model:m1", "p1:is_chosen").await.unwrap());
        assert!(!store.hash_set_if_absent_or_false("model:m1", "p1:is_chosen").await.unwrap());
        store.hash_del("model:m1", "p1:is_chosen").await.unwrap();
        assert!(store.hash_set_if_absent_or_false("model:m1", "p1:is_chosen").await.unwrap());
    }

    #[tokio::test]
    async fn sorted_set_range_filters_and_orders_by_score() {
        let store = InMemoryStore::new();
        store.sorted_set_add("wakeups", "a", 30.0).await.unwrap();
        store.sorted_set_add("wakeups", "b", 10.0).await.unwrap();
        store.sorted_set_add("wakeups", "c", 50.0).await.unwrap();
        let due = store.sorted_set_range_by_score("wakeups", 30.0).await.unwrap();
        assert_eq!(due, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn scan_keys_matches_suffix_glob() {
        let store = InMemoryStore::new();
        store.key_set_if_absent("model:m1:last_host", "h1").await.unwrap();
        store.key_set_if_absent("model:m2:last_host", "h2").await.unwrap();
        store.key_set_if_absent("host:h1", "1").await.unwrap();
        let mut matches = store.scan_keys("*:last_host").await.unwrap();
        matches.sort();
        assert_eq!(matches, vec!["model:m1:last_host", "model:m2:last_host"]);
    }
}
