//! Outdatable cache: `host -> {data, last_refresh}`, persisted as a JSON
//! blob through the config store (§4.B).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cache slot: the cached value plus when it was last refreshed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Cached value
    pub data: T,
    /// When this entry was last refreshed; `None` means never
    pub last_refresh: Option<DateTime<Utc>>,
}

impl<T> CacheEntry<T> {
    /// Wrap a value with no refresh timestamp
    pub fn unrefreshed(data: T) -> Self {
        Self {
            data,
            last_refresh: None,
        }
    }

    /// Wrap a value stamped with the current time
    pub fn fresh(data: T) -> Self {
        Self {
            data,
            last_refresh: Some(Utc::now()),
        }
    }

    /// Whether this entry is stale: never refreshed, or older than `timeout`
    #[must_use]
    pub fn is_outdated(&self, timeout: Duration) -> bool {
        match self.last_refresh {
            None => true,
            Some(ts) => {
                let age = Utc::now().signed_duration_since(ts);
                match chrono::Duration::from_std(timeout) {
                    Ok(limit) => age > limit,
                    Err(_) => true,
                }
            }
        }
    }
}

/// A mapping `host -> CacheEntry<T>`, never evicting entries on its own —
/// removal happens only in sync with the inventory (§4.D).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutdatableCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T: Clone> OutdatableCache<T> {
    /// An empty cache
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Fetch the cached value for a host, if any
    #[must_use]
    pub fn get(&self, host: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(host)
    }

    /// Set the cached value for a host, stamping the current time
    pub fn set(&mut self, host: impl Into<String>, data: T) {
        self.entries.insert(host.into(), CacheEntry::fresh(data));
    }

    /// Set the cached value without stamping a refresh time
    pub fn set_unrefreshed(&mut self, host: impl Into<String>, data: T) {
        self.entries.insert(host.into(), CacheEntry::unrefreshed(data));
    }

    /// Clear `last_refresh` for a host without dropping its data
    pub fn invalidate(&mut self, host: &str) {
        if let Some(entry) = self.entries.get_mut(host) {
            entry.last_refresh = None;
        }
    }

    /// Remove a host's entry entirely (called only when the host leaves
    /// the inventory)
    pub fn remove(&mut self, host: &str) -> Option<CacheEntry<T>> {
        self.entries.remove(host)
    }

    /// Hosts whose entries are stale per `timeout`
    #[must_use]
    pub fn outdated(&self, timeout: Duration) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_outdated(timeout))
            .map(|(host, _)| host.clone())
            .collect()
    }

    /// Entries restricted to the given host set, or all entries if `wanted`
    /// is `None`
    #[must_use]
    pub fn items_filtered(&self, wanted: Option<&[String]>) -> HashMap<String, CacheEntry<T>> {
        match wanted {
            None => self.entries.clone(),
            Some(hosts) => self
                .entries
                .iter()
                .filter(|(host, _)| hosts.iter().any(|h| h == *host))
                .map(|(host, entry)| (host.clone(), entry.clone()))
                .collect(),
        }
    }

    /// All hosts currently tracked
    #[must_use]
    pub fn hosts(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrefreshed_entry_is_always_outdated() {
        let entry: CacheEntry<u32> = CacheEntry::unrefreshed(1);
        assert!(entry.is_outdated(Duration::from_secs(600)));
    }

    #[test]
    fn fresh_entry_is_not_outdated_immediately() {
        let entry = CacheEntry::fresh(1u32);
        assert!(!entry.is_outdated(Duration::from_secs(600)));
    }

    #[test]
    fn invalidate_clears_refresh_without_dropping_data() {
        let mut cache = OutdatableCache::new();
        cache.set("host1", 42u32);
        cache.invalidate("host1");

        let entry = cache.get("host1").unwrap();
        assert_eq!(entry.data, 42);
        assert!(entry.last_refresh.is_none());
    }

    #[test]
    fn outdated_lists_only_stale_hosts() {
        let mut cache = OutdatableCache::new();
        cache.set("fresh", 1u32);
        cache.set_unrefreshed("stale", 2u32);

        let outdated = cache.outdated(Duration::from_secs(600));
        assert_eq!(outdated, vec!["stale".to_string()]);
    }

    #[test]
    fn items_filtered_restricts_to_wanted_hosts() {
        let mut cache = OutdatableCache::new();
        cache.set("a", 1u32);
        cache.set("b", 2u32);

        let wanted = vec!["a".to_string()];
        let filtered = cache.items_filtered(Some(&wanted));
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("a"));
    }
}
