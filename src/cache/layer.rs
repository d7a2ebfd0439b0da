//! Cache layers that put freshness and coverage policy in front of a fetcher.

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use super::clock::{system_clock, Clock};
use super::range::DateRange;
use super::storage::{CacheEntry, EntryStorage, MemoryStorage};
use super::traits::{CacheResult, CacheStats, StatsSnapshot, Timestamped};

/// Default freshness window for every cache, in seconds.
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Time-windowed read-through cache for one data source.
///
/// Holds a single window of rows. A lookup is served from the window only
/// when the entry is fresh, non-empty, and its observed timestamps span the
/// requested range; anything else goes to the fetcher and the result
/// replaces the entry wholesale.
pub struct RangeCache<T> {
  name: &'static str,
  storage: Arc<dyn EntryStorage<T>>,
  clock: Arc<dyn Clock>,
  ttl: Duration,
  stats: Arc<CacheStats>,
}

impl<T: Timestamped> RangeCache<T> {
  /// Create an in-memory cache with the default TTL.
  pub fn new(name: &'static str) -> Self {
    Self::with_storage(name, Arc::new(MemoryStorage::new()))
  }

  pub fn with_storage(name: &'static str, storage: Arc<dyn EntryStorage<T>>) -> Self {
    Self {
      name,
      storage,
      clock: system_clock(),
      ttl: Duration::seconds(DEFAULT_TTL_SECS),
      stats: Arc::new(CacheStats::default()),
    }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn stats(&self) -> StatsSnapshot {
    self.stats.snapshot()
  }

  fn is_expired(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - fetched_at >= self.ttl
  }

  /// Return the cached entry if it can answer `range` right now.
  fn covering_entry(&self, range: &DateRange) -> Option<Arc<CacheEntry<T>>> {
    let Some(entry) = self.storage.load() else {
      debug!(cache = self.name, "cache empty");
      return None;
    };

    if self.is_expired(entry.fetched_at, self.clock.now()) {
      debug!(cache = self.name, fetched_at = %entry.fetched_at, "cache expired");
      return None;
    }

    if entry.data.is_empty() {
      debug!(cache = self.name, "cache entry has no rows");
      return None;
    }

    if !entry.covers(range) {
      debug!(
        cache = self.name,
        %range,
        window_start = %entry.window_start,
        window_end = %entry.window_end,
        "range not covered by cached window"
      );
      return None;
    }

    Some(entry)
  }

  /// Get the rows for `range`, fetching on miss.
  ///
  /// On a miss `fetcher` is called exactly once with the full requested
  /// range. A failed fetch leaves the previous entry untouched and the error
  /// is returned as-is.
  pub async fn get<F, Fut, E>(&self, range: &DateRange, fetcher: F) -> Result<CacheResult<Vec<T>>, E>
  where
    F: FnOnce(DateRange) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
  {
    if let Some(entry) = self.covering_entry(range) {
      self.stats.record_hit();
      let rows = entry.rows_in(range);
      debug!(cache = self.name, %range, rows = rows.len(), "cache hit");
      return Ok(CacheResult::from_cache(rows, entry.fetched_at));
    }

    self.stats.record_miss();
    let data = match fetcher(*range).await {
      Ok(data) => data,
      Err(e) => {
        self.stats.record_failure();
        return Err(e);
      }
    };

    let fetched_at = self.clock.now();
    info!(cache = self.name, %range, rows = data.len(), "cache refreshed from backend");

    match CacheEntry::from_rows(data.clone(), *range, fetched_at) {
      Some(entry) => self.storage.store(entry),
      None => self.storage.clear(),
    }

    Ok(CacheResult::from_network(data, fetched_at))
  }

  /// Forget the current entry.
  pub fn invalidate(&self) {
    self.storage.clear();
  }
}

impl<T> Clone for RangeCache<T> {
  fn clone(&self) -> Self {
    Self {
      name: self.name,
      storage: Arc::clone(&self.storage),
      clock: Arc::clone(&self.clock),
      ttl: self.ttl,
      stats: Arc::clone(&self.stats),
    }
  }
}

struct ListEntry<T> {
  data: Vec<T>,
  fetched_at: DateTime<Utc>,
}

/// TTL cache for a single un-ranged list (e.g. the latest N notifications).
///
/// Same freshness policy as [`RangeCache`] minus the coverage check: a fresh,
/// non-empty list is returned as-is.
pub struct ListCache<T> {
  name: &'static str,
  entry: Arc<Mutex<Option<ListEntry<T>>>>,
  clock: Arc<dyn Clock>,
  ttl: Duration,
  enabled: bool,
}

impl<T: Clone> ListCache<T> {
  pub fn new(name: &'static str) -> Self {
    Self {
      name,
      entry: Arc::new(Mutex::new(None)),
      clock: system_clock(),
      ttl: Duration::seconds(DEFAULT_TTL_SECS),
      enabled: true,
    }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn disabled(mut self) -> Self {
    self.enabled = false;
    self
  }

  fn fresh(&self) -> Option<Vec<T>> {
    let guard = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
    let entry = guard.as_ref()?;
    let fresh = self.clock.now() - entry.fetched_at < self.ttl && !entry.data.is_empty();
    fresh.then(|| entry.data.clone())
  }

  /// Fetch the list with a cache-first strategy.
  pub async fn fetch<F, Fut, E>(&self, fetcher: F) -> Result<Vec<T>, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
  {
    if let Some(data) = self.fresh() {
      debug!(cache = self.name, rows = data.len(), "list cache hit");
      return Ok(data);
    }

    let data = fetcher().await?;
    if self.enabled {
      *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = Some(ListEntry {
        data: data.clone(),
        fetched_at: self.clock.now(),
      });
    }
    Ok(data)
  }

  pub fn invalidate(&self) {
    *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = None;
  }
}

impl<T> Clone for ListCache<T> {
  fn clone(&self) -> Self {
    Self {
      name: self.name,
      entry: Arc::clone(&self.entry),
      clock: Arc::clone(&self.clock),
      ttl: self.ttl,
      enabled: self.enabled,
    }
  }
}
