//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for rows that can live in a time-windowed cache.
///
/// Every cached row has a natural timestamp (its `created_at` column), which
/// is what cache windows and range filters are computed from.
pub trait Timestamped: Clone + Send + Sync + DeserializeOwned + 'static {
  /// The row's natural timestamp.
  fn timestamp(&self) -> DateTime<Utc>;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the backing entry was fetched
  pub fetched_at: DateTime<Utc>,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      fetched_at,
    }
  }

  pub fn from_cache(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      fetched_at,
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the backend
  Network,
  /// Served from a covering, unexpired entry
  Cache,
}

/// Hit/miss counters for one cache instance.
#[derive(Debug, Default)]
pub struct CacheStats {
  hits: AtomicU64,
  misses: AtomicU64,
  failures: AtomicU64,
}

impl CacheStats {
  pub fn record_hit(&self) {
    self.hits.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_failure(&self) {
    self.failures.fetch_add(1, Ordering::Relaxed);
  }

  pub fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      failures: self.failures.load(Ordering::Relaxed),
    }
  }
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
  pub hits: u64,
  pub misses: u64,
  pub failures: u64,
}

impl StatsSnapshot {
  /// Fraction of lookups served from cache, 0.0 when nothing was looked up.
  pub fn hit_rate(&self) -> f64 {
    let total = self.hits + self.misses;
    if total == 0 {
      0.0
    } else {
      self.hits as f64 / total as f64
    }
  }
}
