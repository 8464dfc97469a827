//! Per-term subnet cache
//!
//! Caches the subnets fetched for each selector term, keyed by
//! [`SelectorTermKey`], so that differently combined selectors reuse the same
//! remote results. Alongside the term entries, the cache indexes each
//! subnet's public-IP-on-launch flag by subnet ID.
//!
//! Entries expire lazily on read once older than the TTL; [`TermCache::spawn_sweeper`]
//! additionally purges them on an interval. Every accessor hands out owned
//! copies so callers can never observe or cause mutation of cached data.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::selector::SelectorTermKey;
use crate::subnet::Subnet;

/// Default freshness window shared by the provider caches (1 minute)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// A cached term result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Term the subnets were fetched for
    pub key: SelectorTermKey,
    /// Subnets matching that term alone
    pub subnets: Vec<Subnet>,
    /// When the entry was stored
    pub inserted_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct PublicIpRecord {
    map_public_ip_on_launch: bool,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    terms: HashMap<SelectorTermKey, CacheEntry>,
    public_ip: HashMap<String, PublicIpRecord>,
}

/// Concurrency-safe, TTL-bounded cache of per-term subnet lists
#[derive(Debug)]
pub struct TermCache {
    state: RwLock<CacheState>,
    ttl: Duration,
}

impl Default for TermCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl TermCache {
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            ttl,
        }
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, inserted_at: Instant) -> bool {
        inserted_at.elapsed() < self.ttl
    }

    /// Copy of the subnets cached for `key`, if present and unexpired
    pub fn get(&self, key: &SelectorTermKey) -> Option<Vec<Subnet>> {
        let state = self.state.read();
        state
            .terms
            .get(key)
            .filter(|entry| self.is_fresh(entry.inserted_at))
            .map(|entry| entry.subnets.clone())
    }

    /// Store a copy of `subnets` for `key`, replacing any previous entry
    ///
    /// Also records each subnet's public-IP-on-launch flag.
    pub fn put(&self, key: SelectorTermKey, subnets: &[Subnet]) {
        let now = Instant::now();
        let mut state = self.state.write();
        for subnet in subnets {
            state.public_ip.insert(
                subnet.id.clone(),
                PublicIpRecord {
                    map_public_ip_on_launch: subnet.map_public_ip_on_launch,
                    inserted_at: now,
                },
            );
        }
        state.terms.insert(
            key.clone(),
            CacheEntry {
                key,
                subnets: subnets.to_vec(),
                inserted_at: now,
            },
        );
    }

    /// Cached public-IP-on-launch flag for a subnet, if present and unexpired
    pub fn map_public_ip_on_launch(&self, subnet_id: &str) -> Option<bool> {
        let state = self.state.read();
        state
            .public_ip
            .get(subnet_id)
            .filter(|record| self.is_fresh(record.inserted_at))
            .map(|record| record.map_public_ip_on_launch)
    }

    /// Remove every entry
    pub fn flush(&self) {
        let mut state = self.state.write();
        state.terms.clear();
        state.public_ip.clear();
        debug!("Subnet cache flushed");
    }

    /// Snapshot of all unexpired term entries
    pub fn items(&self) -> Vec<CacheEntry> {
        let state = self.state.read();
        state
            .terms
            .values()
            .filter(|entry| self.is_fresh(entry.inserted_at))
            .cloned()
            .collect()
    }

    /// Number of unexpired term entries
    pub fn len(&self) -> usize {
        let state = self.state.read();
        state
            .terms
            .values()
            .filter(|entry| self.is_fresh(entry.inserted_at))
            .count()
    }

    /// Whether there are no unexpired term entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries, returning how many term entries were removed
    pub fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut state = self.state.write();
        let before = state.terms.len();
        state.terms.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        state
            .public_ip
            .retain(|_, record| record.inserted_at.elapsed() < ttl);
        before - state.terms.len()
    }

    /// Purge expired entries every `interval` until `cancel` fires
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = self.purge_expired();
                        if purged > 0 {
                            debug!(purged, "Purged expired subnet cache entries");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SubnetSelectorTerm;

    fn subnet(id: &str, public: bool) -> Subnet {
        Subnet {
            id: id.to_string(),
            availability_zone: "test-zone-1a".to_string(),
            available_ip_count: 100,
            map_public_ip_on_launch: public,
            tags: vec![],
        }
    }

    fn key(id: &str) -> SelectorTermKey {
        SubnetSelectorTerm::with_id(id).key()
    }

    #[tokio::test]
    async fn get_returns_stored_subnets() {
        let cache = TermCache::default();
        cache.put(key("subnet-a"), &[subnet("subnet-a", false)]);

        let cached = cache.get(&key("subnet-a")).expect("entry should be cached");
        assert_eq!(cached, vec![subnet("subnet-a", false)]);
        assert!(cache.get(&key("subnet-b")).is_none());
    }

    #[tokio::test]
    async fn returned_copies_are_independent() {
        let cache = TermCache::default();
        cache.put(
            key("k"),
            &[subnet("subnet-a", false), subnet("subnet-b", false)],
        );

        let mut first = cache.get(&key("k")).unwrap();
        first.reverse();
        first[0].available_ip_count = 0;

        let second = cache.get(&key("k")).unwrap();
        assert_eq!(second[0].id, "subnet-a");
        assert_eq!(second[1].available_ip_count, 100);

        let mut items = cache.items();
        items[0].subnets.clear();
        assert_eq!(cache.get(&key("k")).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn put_replaces_previous_entry() {
        let cache = TermCache::default();
        cache.put(key("k"), &[subnet("subnet-a", false)]);
        cache.put(key("k"), &[subnet("subnet-b", true)]);

        let cached = cache.get(&key("k")).unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "subnet-b");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = TermCache::new(Duration::from_secs(60));
        cache.put(key("k"), &[subnet("subnet-a", false)]);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get(&key("k")).is_some());
        assert_eq!(cache.map_public_ip_on_launch("subnet-a"), Some(false));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key("k")).is_none());
        assert!(cache.items().is_empty());
        assert!(cache.is_empty());
        assert_eq!(cache.map_public_ip_on_launch("subnet-a"), None);
    }

    #[tokio::test]
    async fn flush_removes_everything() {
        let cache = TermCache::default();
        cache.put(key("a"), &[subnet("subnet-a", true)]);
        cache.put(key("b"), &[subnet("subnet-b", false)]);
        assert_eq!(cache.len(), 2);

        cache.flush();
        assert!(cache.is_empty());
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(cache.map_public_ip_on_launch("subnet-a"), None);
    }

    #[tokio::test]
    async fn public_ip_index_is_keyed_by_subnet() {
        let cache = TermCache::default();
        let term = SubnetSelectorTerm::with_tags([("foo", "bar")]);
        cache.put(
            term.key(),
            &[subnet("subnet-a", true), subnet("subnet-b", false)],
        );

        assert_eq!(cache.map_public_ip_on_launch("subnet-a"), Some(true));
        assert_eq!(cache.map_public_ip_on_launch("subnet-b"), Some(false));
        assert_eq!(cache.map_public_ip_on_launch("subnet-c"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_entries() {
        let cache = TermCache::new(Duration::from_secs(10));
        cache.put(key("old"), &[subnet("subnet-a", false)]);
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.put(key("new"), &[subnet("subnet-b", false)]);
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.get(&key("new")).is_some());
        assert_eq!(cache.map_public_ip_on_launch("subnet-a"), None);
        assert_eq!(cache.map_public_ip_on_launch("subnet-b"), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_until_cancelled() {
        let cache = Arc::new(TermCache::new(Duration::from_secs(5)));
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&cache).spawn_sweeper(Duration::from_secs(10), cancel.clone());

        cache.put(key("k"), &[subnet("subnet-a", false)]);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(cache.state.read().terms.len(), 0);

        cancel.cancel();
        handle.await.expect("sweeper should exit cleanly");
    }

    #[tokio::test]
    async fn concurrent_put_and_get_do_not_corrupt() {
        let cache = Arc::new(TermCache::default());
        let mut handles = Vec::new();
        for i in 0..64 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                let id = format!("subnet-{}", i % 4);
                cache.put(key(&id), &[subnet(&id, i % 2 == 0)]);
                let cached = cache.get(&key(&id)).expect("just inserted");
                assert_eq!(cached.len(), 1);
                assert_eq!(cached[0].id, id);
                if i % 16 == 0 {
                    let _ = cache.items();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.len(), 4);
    }
}
