//! Cache entry type and the storage backends that hold it.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};

use super::range::DateRange;
use super::traits::Timestamped;

/// One contiguous window of rows for a single data source.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  /// Rows in fetch order
  pub data: Vec<T>,
  /// Earliest row timestamp observed in `data`
  pub window_start: DateTime<Utc>,
  /// Latest row timestamp observed in `data`
  pub window_end: DateTime<Utc>,
  /// The range that was requested when the entry was populated
  pub requested: DateRange,
  /// When the entry was populated
  pub fetched_at: DateTime<Utc>,
}

impl<T: Timestamped> CacheEntry<T> {
  /// Build an entry from freshly fetched rows.
  ///
  /// Returns `None` for an empty fetch: an entry without rows has no window
  /// and can never answer a lookup.
  pub fn from_rows(data: Vec<T>, requested: DateRange, fetched_at: DateTime<Utc>) -> Option<Self> {
    let mut stamps = data.iter().map(Timestamped::timestamp);
    let first = stamps.next()?;
    let (window_start, window_end) = stamps.fold((first, first), |(lo, hi), ts| {
      (lo.min(ts), hi.max(ts))
    });

    Some(Self {
      data,
      window_start,
      window_end,
      requested,
      fetched_at,
    })
  }

  /// Whether the observed window spans the whole of `range`.
  pub fn covers(&self, range: &DateRange) -> bool {
    self.window_start <= range.start_instant() && self.window_end >= range.end_instant()
  }

  /// Rows whose timestamp falls inside `range`, in entry order.
  pub fn rows_in(&self, range: &DateRange) -> Vec<T> {
    self
      .data
      .iter()
      .filter(|row| range.contains(row.timestamp()))
      .cloned()
      .collect()
  }
}

/// Trait for cache storage backends.
///
/// A store holds at most one entry; storing replaces whatever was there.
pub trait EntryStorage<T>: Send + Sync {
  /// Current entry, if any.
  fn load(&self) -> Option<Arc<CacheEntry<T>>>;

  /// Replace the current entry wholesale.
  fn store(&self, entry: CacheEntry<T>);

  /// Drop the current entry.
  fn clear(&self);
}

/// In-process store for a single entry.
pub struct MemoryStorage<T> {
  entry: Mutex<Option<Arc<CacheEntry<T>>>>,
}

impl<T> MemoryStorage<T> {
  pub fn new() -> Self {
    Self {
      entry: Mutex::new(None),
    }
  }
}

impl<T> Default for MemoryStorage<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Send + Sync> EntryStorage<T> for MemoryStorage<T> {
  fn load(&self) -> Option<Arc<CacheEntry<T>>> {
    self
      .entry
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  fn store(&self, entry: CacheEntry<T>) {
    *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(entry));
  }

  fn clear(&self) {
    *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = None;
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - every lookup misses.
pub struct NoopStorage;

impl<T> EntryStorage<T> for NoopStorage {
  fn load(&self) -> Option<Arc<CacheEntry<T>>> {
    None
  }

  fn store(&self, _entry: CacheEntry<T>) {}

  fn clear(&self) {}
}
