//! [`ChainRegistry`]: chain lookups over bundled and fetched snapshots.
//!
//! The registry owns two snapshots:
//!
//! - **bundled**: built once from the records compiled into the binary (or
//!   any list handed to [`ChainRegistry::new`]);
//! - **fetched**: the cached result of the last [`ChainSource`] fetch, stored
//!   under [`ALL_CHAINS_CACHE_KEY`]. It starts empty, is filled lazily by
//!   [`ChainRegistry::ensure_fetched`] and replaced wholesale on refresh.
//!
//! Once a fetched snapshot is loaded it is authoritative: chains missing
//! from it no longer resolve from the bundle. [`BundleFallback::PerKey`]
//! restores per-key fallback for deployments that fetch partial lists.
//! Readers clone an `Arc<Snapshot>` and never observe a partially built set.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::bundle;
use super::fetch::{ChainSource, FetchError};
use super::record::ChainRecord;
use super::snapshot::{DuplicatePolicy, Snapshot, SnapshotOrigin};

/// Cache key of the fetched chain list.
pub const ALL_CHAINS_CACHE_KEY: &str = "all-chains";

/// A chain lookup key: numeric chain ID or slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChainKey {
    /// Numeric chain ID.
    Id(u64),
    /// Chain slug.
    Slug(String),
}

impl FromStr for ChainKey {
    type Err = std::convert::Infallible;

    /// All-digit input is a chain ID, anything else a slug.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(s.parse::<u64>()
            .map_or_else(|_| Self::Slug(s.to_owned()), Self::Id))
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Slug(slug) => f.write_str(slug),
        }
    }
}

impl From<u64> for ChainKey {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

/// When bundled records answer lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleFallback {
    /// The bundle serves lookups only until a fetched snapshot is loaded.
    #[default]
    UntilFetched,
    /// Any key missing from the fetched snapshot is looked up in the bundle.
    PerKey,
}

/// Sizes and age of the registry's snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    /// Records in the bundled snapshot.
    pub bundled: usize,
    /// Records in the fetched snapshot, if one is loaded.
    pub fetched: Option<usize>,
    /// Age of the fetched snapshot in whole seconds, if one is loaded.
    pub snapshot_age_secs: Option<u64>,
}

/// Chain registry and resolver.
#[derive(Debug)]
pub struct ChainRegistry {
    policy: DuplicatePolicy,
    fallback: BundleFallback,
    bundled: Arc<Snapshot>,
    fetched: RwLock<Option<Arc<Snapshot>>>,
    fetch_lock: Mutex<()>,
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::bundled()
    }
}

impl ChainRegistry {
    /// Registry whose fallback snapshot is built from `bundled`.
    #[must_use]
    pub fn new(bundled: impl IntoIterator<Item = ChainRecord>, policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            fallback: BundleFallback::default(),
            bundled: Arc::new(Snapshot::new(SnapshotOrigin::Bundled, bundled)),
            fetched: RwLock::new(None),
            fetch_lock: Mutex::new(()),
        }
    }

    /// Registry over the records compiled into the binary.
    #[must_use]
    pub fn bundled() -> Self {
        Self::new(bundle::all_static().iter().cloned(), DuplicatePolicy::default())
    }

    /// Registry without bundled records; lookups only succeed once a
    /// snapshot has been fetched or loaded.
    #[must_use]
    pub fn empty() -> Self {
        Self::new([], DuplicatePolicy::default())
    }

    /// Replaces the duplicate-ID policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active duplicate-ID policy.
    #[must_use]
    pub const fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Replaces the bundle fallback mode.
    #[must_use]
    pub const fn with_fallback(mut self, fallback: BundleFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Active bundle fallback mode.
    #[must_use]
    pub const fn fallback(&self) -> BundleFallback {
        self.fallback
    }

    /// The bundled snapshot.
    #[must_use]
    pub fn bundled_snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.bundled)
    }

    /// The fetched snapshot, if one is loaded.
    #[must_use]
    pub fn fetched_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.fetched
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the fetched snapshot with `records`.
    ///
    /// The previous snapshot stays valid for readers already holding it.
    pub fn load_snapshot(&self, records: impl IntoIterator<Item = ChainRecord>) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot::new(SnapshotOrigin::Fetched, records));
        self.swap(Arc::clone(&snapshot));
        snapshot
    }

    /// Drops the fetched snapshot; lookups fall back to bundled data.
    pub fn clear_fetched(&self) {
        *self.fetched.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn swap(&self, snapshot: Arc<Snapshot>) {
        tracing::info!(
            cache_key = ALL_CHAINS_CACHE_KEY,
            records = snapshot.len(),
            "chain snapshot loaded"
        );
        *self.fetched.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    /// Returns the fetched snapshot, fetching it from `source` first if none
    /// is loaded.
    ///
    /// Concurrent callers share a single fetch.
    ///
    /// # Errors
    ///
    /// Returns the source's [`FetchError`]; the registry keeps serving
    /// bundled data.
    pub async fn ensure_fetched<S>(&self, source: &S) -> Result<Arc<Snapshot>, FetchError>
    where
        S: ChainSource + ?Sized,
    {
        if let Some(snapshot) = self.fetched_snapshot() {
            tracing::debug!(cache_key = ALL_CHAINS_CACHE_KEY, "chain snapshot cache hit");
            return Ok(snapshot);
        }
        let _guard = self.fetch_lock.lock().await;
        if let Some(snapshot) = self.fetched_snapshot() {
            return Ok(snapshot);
        }
        self.fetch_and_swap(source).await
    }

    /// Fetches from `source` and replaces the fetched snapshot.
    ///
    /// # Errors
    ///
    /// Returns the source's [`FetchError`]; the previous snapshot is kept.
    pub async fn refresh<S>(&self, source: &S) -> Result<Arc<Snapshot>, FetchError>
    where
        S: ChainSource + ?Sized,
    {
        let _guard = self.fetch_lock.lock().await;
        self.fetch_and_swap(source).await
    }

    /// Like [`refresh`](Self::refresh), but only when the fetched snapshot is
    /// missing or older than `max_age`.
    ///
    /// # Errors
    ///
    /// Returns the source's [`FetchError`]; the previous snapshot is kept.
    pub async fn ensure_fresh<S>(
        &self,
        source: &S,
        max_age: Duration,
    ) -> Result<Arc<Snapshot>, FetchError>
    where
        S: ChainSource + ?Sized,
    {
        let _guard = self.fetch_lock.lock().await;
        match self.fetched_snapshot() {
            Some(snapshot) if snapshot.age() < max_age => Ok(snapshot),
            _ => self.fetch_and_swap(source).await,
        }
    }

    async fn fetch_and_swap<S>(&self, source: &S) -> Result<Arc<Snapshot>, FetchError>
    where
        S: ChainSource + ?Sized,
    {
        let records = source.fetch_all().await.inspect_err(|error| {
            tracing::warn!(cache_key = ALL_CHAINS_CACHE_KEY, %error, "chain list fetch failed");
        })?;
        let snapshot = Arc::new(Snapshot::new(SnapshotOrigin::Fetched, records));
        self.swap(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// The record for `chain_id`, or `None` if the serving snapshot does
    /// not know it.
    #[must_use]
    pub fn resolve_by_id(&self, chain_id: u64) -> Option<Arc<ChainRecord>> {
        if let Some(fetched) = self.fetched_snapshot() {
            if let Some(record) = fetched.by_id(chain_id, self.policy) {
                return Some(Arc::clone(record));
            }
            if self.fallback == BundleFallback::UntilFetched {
                return None;
            }
        }
        self.bundled.by_id(chain_id, self.policy).cloned()
    }

    /// The record owning `slug`, or `None` if the serving snapshot does not
    /// know it.
    #[must_use]
    pub fn resolve_by_slug(&self, slug: &str) -> Option<Arc<ChainRecord>> {
        if let Some(fetched) = self.fetched_snapshot() {
            if let Some(record) = fetched.by_slug(slug) {
                return Some(Arc::clone(record));
            }
            if self.fallback == BundleFallback::UntilFetched {
                return None;
            }
        }
        self.bundled.by_slug(slug).cloned()
    }

    /// Resolves a parsed [`ChainKey`].
    #[must_use]
    pub fn resolve(&self, key: &ChainKey) -> Option<Arc<ChainRecord>> {
        match key {
            ChainKey::Id(id) => self.resolve_by_id(*id),
            ChainKey::Slug(slug) => self.resolve_by_slug(slug),
        }
    }

    /// The record for `chain_id`, or a generic [`ChainRecord::fallback`].
    #[must_use]
    pub fn resolve_or_fallback(&self, chain_id: u64) -> Arc<ChainRecord> {
        self.resolve_by_id(chain_id)
            .unwrap_or_else(|| Arc::new(ChainRecord::fallback(chain_id)))
    }

    /// Every record sharing `chain_id` in the snapshot that serves it.
    #[must_use]
    pub fn candidates_by_id(&self, chain_id: u64) -> Vec<Arc<ChainRecord>> {
        let fetched = self.fetched_snapshot();
        let snapshot = fetched
            .as_ref()
            .filter(|s| {
                self.fallback == BundleFallback::UntilFetched || s.contains_id(chain_id)
            })
            .unwrap_or(&self.bundled);
        snapshot
            .candidates_by_id(chain_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Every resolvable record, one per ID, sorted by chain ID.
    ///
    /// Under [`BundleFallback::PerKey`] bundled records fill in IDs the
    /// fetched snapshot lacks.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<ChainRecord>> {
        let fetched = self.fetched_snapshot();
        let use_bundle = fetched.is_none() || self.fallback == BundleFallback::PerKey;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for snapshot in fetched.iter().chain(use_bundle.then_some(&self.bundled)) {
            for record in snapshot.records() {
                if seen.insert(record.chain_id)
                    && let Some(chosen) = snapshot.by_id(record.chain_id, self.policy)
                {
                    out.push(Arc::clone(chosen));
                }
            }
        }
        out.sort_by_key(|r| r.chain_id);
        out
    }

    /// Snapshot sizes and age.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let fetched = self.fetched_snapshot();
        RegistryStats {
            bundled: self.bundled.len(),
            fetched: fetched.as_ref().map(|s| s.len()),
            snapshot_age_secs: fetched.as_ref().map(|s| s.age().as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;
    use crate::chain::fetch::FetchFuture;
    use crate::chain::record::ChainStatus;

    fn record(chain_id: u64, slug: &str, name: &str) -> ChainRecord {
        let mut r = ChainRecord::fallback(chain_id);
        r.slug = slug.to_owned();
        r.name = name.to_owned();
        r
    }

    /// Source returning a fixed list and counting calls.
    struct FixedSource {
        records: Vec<ChainRecord>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(records: Vec<ChainRecord>) -> Self {
            Self {
                records,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ChainSource for FixedSource {
        fn fetch_all(&self) -> FetchFuture<'_> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Ok(self.records.clone())
            })
        }
    }

    struct FailingSource;

    impl ChainSource for FailingSource {
        fn fetch_all(&self) -> FetchFuture<'_> {
            Box::pin(async {
                Err(FetchError::Status {
                    status: 500,
                    message: "Internal Server Error".to_owned(),
                })
            })
        }
    }

    #[test]
    fn bundled_lookup() {
        let registry = ChainRegistry::bundled();
        let ethereum = registry.resolve_by_id(1).unwrap();
        assert_eq!(ethereum.name, "Ethereum");
        assert_eq!(ethereum.native_currency.symbol, "ETH");
        assert!(registry.resolve_by_id(999_999_999).is_none());
        assert!(registry.resolve_by_slug("no-such-chain").is_none());
    }

    #[test]
    fn every_bundled_record_resolves_by_id_and_slug() {
        let registry = ChainRegistry::bundled();
        for record in bundle::all_static() {
            let by_id = registry.resolve_by_id(record.chain_id).unwrap();
            let by_slug = registry.resolve_by_slug(&record.slug).unwrap();
            assert_eq!(by_id.chain_id, record.chain_id);
            assert_eq!(by_slug.chain_id, by_id.chain_id);
        }
    }

    #[test]
    fn fetched_snapshot_shadows_bundled_records() {
        let registry = ChainRegistry::bundled();
        registry.load_snapshot([record(1, "ethereum", "Ethereum (fresh)"), record(424_242, "new-net", "New")]);

        assert_eq!(registry.resolve_by_id(1).unwrap().name, "Ethereum (fresh)");
        assert_eq!(registry.resolve_by_id(424_242).unwrap().slug, "new-net");
        assert_eq!(registry.resolve_by_slug("new-net").unwrap().chain_id, 424_242);
        assert!(registry.resolve_by_id(8453).is_none());
        assert!(registry.resolve_by_slug("base").is_none());
        assert_eq!(registry.candidates_by_id(8453).len(), 0);
    }

    #[test]
    fn per_key_fallback_fills_gaps_from_the_bundle() {
        let registry = ChainRegistry::bundled().with_fallback(BundleFallback::PerKey);
        assert_eq!(registry.fallback(), BundleFallback::PerKey);
        registry.load_snapshot([record(1, "ethereum", "Ethereum (fresh)")]);

        assert_eq!(registry.resolve_by_id(1).unwrap().name, "Ethereum (fresh)");
        assert_eq!(registry.resolve_by_id(8453).unwrap().slug, "base");
        assert_eq!(registry.resolve_by_slug("base").unwrap().chain_id, 8453);
        assert_eq!(registry.candidates_by_id(8453).len(), 1);

        registry.clear_fetched();
        assert_eq!(registry.resolve_by_id(1).unwrap().name, "Ethereum");
    }

    #[test]
    fn policy_applies_to_duplicate_ids() {
        let mut old = record(5, "goerli-old", "Goerli (old)");
        old.status = Some(ChainStatus::Deprecated);
        let records = vec![record(5, "goerli", "Goerli"), old];

        let last = ChainRegistry::new(records.clone(), DuplicatePolicy::LastWins);
        assert_eq!(last.resolve_by_id(5).unwrap().name, "Goerli (old)");

        let active = ChainRegistry::new(records, DuplicatePolicy::LastWins)
            .with_policy(DuplicatePolicy::PreferActive);
        assert_eq!(active.resolve_by_id(5).unwrap().name, "Goerli");
        assert_eq!(active.candidates_by_id(5).len(), 2);
        assert_eq!(active.all().len(), 1);
    }

    #[test]
    fn chain_keys_parse() {
        assert_eq!("137".parse::<ChainKey>().unwrap(), ChainKey::Id(137));
        assert_eq!(
            " polygon ".parse::<ChainKey>().unwrap(),
            ChainKey::Slug("polygon".to_owned())
        );
        assert_eq!(
            "1a".parse::<ChainKey>().unwrap(),
            ChainKey::Slug("1a".to_owned())
        );
        assert_eq!(ChainKey::Id(10).to_string(), "10");

        let registry = ChainRegistry::bundled();
        assert_eq!(
            registry.resolve(&"polygon".parse().unwrap()).unwrap().chain_id,
            137
        );
        assert_eq!(registry.resolve(&ChainKey::from(137)).unwrap().slug, "polygon");
    }

    #[test]
    fn fallback_for_unknown_ids() {
        let registry = ChainRegistry::bundled();
        assert_eq!(registry.resolve_or_fallback(999_999_999).name, "Chain 999999999");
        assert_eq!(registry.resolve_or_fallback(1).name, "Ethereum");
    }

    #[test]
    fn listing_follows_the_serving_snapshot() {
        let fetched = [record(3, "three", "Three"), record(1, "ethereum", "Ethereum")];

        let registry = ChainRegistry::bundled();
        let bundled_len = registry.all().len();
        registry.load_snapshot(fetched.clone());
        let ids: Vec<_> = registry.all().iter().map(|r| r.chain_id).collect();
        assert_eq!(ids, [1, 3]);

        let merged = ChainRegistry::bundled().with_fallback(BundleFallback::PerKey);
        merged.load_snapshot(fetched);
        let all = merged.all();
        assert_eq!(all.len(), bundled_len + 1);
        assert!(all.windows(2).all(|w| w[0].chain_id < w[1].chain_id));
    }

    #[test]
    fn stats_track_snapshots() {
        let registry = ChainRegistry::new([record(1, "one", "One")], DuplicatePolicy::LastWins);
        assert_eq!(
            registry.stats(),
            RegistryStats {
                bundled: 1,
                fetched: None,
                snapshot_age_secs: None,
            }
        );
        registry.load_snapshot([record(2, "two", "Two"), record(3, "three", "Three")]);
        assert_eq!(registry.stats().fetched, Some(2));
        registry.clear_fetched();
        assert_eq!(registry.stats().fetched, None);
    }

    #[tokio::test]
    async fn ensure_fetched_is_lazy_and_cached() {
        let registry = ChainRegistry::empty();
        let source = FixedSource::new(vec![record(77, "seventy-seven", "77")]);
        assert!(registry.resolve_by_id(77).is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        registry.ensure_fetched(&source).await.unwrap();
        registry.ensure_fetched(&source).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.resolve_by_id(77).unwrap().name, "77");

        registry.refresh(&source).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_ensure_fetched_shares_one_fetch() {
        let registry = Arc::new(ChainRegistry::empty());
        let source = Arc::new(FixedSource::new(vec![record(9, "nine", "Nine")]));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let source = Arc::clone(&source);
                tokio::spawn(async move { registry.ensure_fetched(source.as_ref()).await.map(|s| s.len()) })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 1);
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ensure_fresh_refetches_stale_snapshots() {
        let registry = ChainRegistry::empty();
        let source = FixedSource::new(vec![record(9, "nine", "Nine")]);
        registry.ensure_fresh(&source, Duration::from_secs(60)).await.unwrap();
        registry.ensure_fresh(&source, Duration::from_secs(60)).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        registry.ensure_fresh(&source, Duration::ZERO).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_serving_previous_data() {
        let registry = ChainRegistry::bundled();
        let err = registry.ensure_fetched(&FailingSource).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(registry.fetched_snapshot().is_none());
        assert_eq!(registry.resolve_by_id(1).unwrap().name, "Ethereum");

        registry.load_snapshot([record(123, "one-two-three", "123")]);
        assert!(registry.refresh(&FailingSource).await.is_err());
        assert_eq!(registry.resolve_by_id(123).unwrap().name, "123");
    }

    #[test]
    fn readers_see_whole_snapshots_during_swaps() {
        let registry = Arc::new(ChainRegistry::empty());
        let generation = |n: u64| -> Vec<ChainRecord> {
            (1..=50)
                .map(|id| record(id, &format!("chain-{id}"), &format!("gen-{n}")))
                .collect()
        };
        registry.load_snapshot(generation(0));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = registry.fetched_snapshot().unwrap();
                        let names: HashSet<_> =
                            snapshot.records().iter().map(|r| r.name.clone()).collect();
                        assert_eq!(snapshot.len(), 50);
                        assert_eq!(names.len(), 1, "mixed generations in one snapshot");
                    }
                })
            })
            .collect();
        for n in 1..100 {
            registry.load_snapshot(generation(n));
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
