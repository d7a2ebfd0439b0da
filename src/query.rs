//! Keyed async query with stale-result discard.
//!
//! A `Query<K, T>` runs one fetch at a time on behalf of the event loop. Each
//! `load` is tagged with the key it was started for and a generation number;
//! when a result arrives through `poll`, it is only applied if it belongs to
//! the latest `load`. Results of superseded loads (the user moved to another
//! claim, changed the date range, ...) are dropped without touching state.
//!
//! # Example
//!
//! ```ignore
//! let mut history: Query<i64, Vec<Message>> = Query::new();
//! let client = dashboard.clone();
//! history.load(channel_id, async move {
//!     client.messages_for_channel(channel_id).await.map_err(|e| e.to_string())
//! });
//!
//! // In event loop tick
//! if history.poll() == Polled::Updated {
//!     // State changed, trigger re-render
//! }
//! ```

use std::fmt::Debug;
use std::future::Future;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

struct Tagged<K, T> {
  generation: u64,
  key: K,
  result: Result<T, String>,
}

/// Outcome of draining a query's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polled {
  /// Nothing new arrived
  Pending,
  /// The current load finished (successfully or not)
  Updated,
  /// Only results of superseded loads arrived; they were dropped
  Discarded,
}

pub struct Query<K, T> {
  state: QueryState<T>,
  key: Option<K>,
  generation: u64,
  sender: mpsc::UnboundedSender<Tagged<K, T>>,
  receiver: mpsc::UnboundedReceiver<Tagged<K, T>>,
  fetched_at: Option<Instant>,
}

impl<K, T> Query<K, T>
where
  K: Clone + PartialEq + Debug + Send + 'static,
  T: Send + 'static,
{
  pub fn new() -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self {
      state: QueryState::Idle,
      key: None,
      generation: 0,
      sender,
      receiver,
      fetched_at: None,
    }
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Key of the most recent load.
  pub fn key(&self) -> Option<&K> {
    self.key.as_ref()
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  /// Mutable access to loaded data, for applying live updates in place.
  pub fn data_mut(&mut self) -> Option<&mut T> {
    match &mut self.state {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  pub fn fetched_at(&self) -> Option<Instant> {
    self.fetched_at
  }

  /// Start loading `key`, superseding any load still in flight.
  pub fn load<Fut>(&mut self, key: K, future: Fut)
  where
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    self.generation += 1;
    self.key = Some(key.clone());
    self.state = QueryState::Loading;

    let generation = self.generation;
    let sender = self.sender.clone();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - the query may have been dropped
      let _ = sender.send(Tagged {
        generation,
        key,
        result,
      });
    });
  }

  /// Forget the current key; anything in flight becomes stale.
  pub fn reset(&mut self) {
    self.generation += 1;
    self.key = None;
    self.state = QueryState::Idle;
    self.fetched_at = None;
  }

  /// Drain arrived results, applying only the one for the latest load.
  pub fn poll(&mut self) -> Polled {
    let mut outcome = Polled::Pending;

    while let Ok(tagged) = self.receiver.try_recv() {
      if tagged.generation != self.generation || self.key.as_ref() != Some(&tagged.key) {
        debug!(key = ?tagged.key, current = ?self.key, "discarding stale result");
        if outcome == Polled::Pending {
          outcome = Polled::Discarded;
        }
        continue;
      }

      self.state = match tagged.result {
        Ok(data) => {
          self.fetched_at = Some(Instant::now());
          QueryState::Success(data)
        }
        Err(error) => QueryState::Error(error),
      };
      outcome = Polled::Updated;
    }

    outcome
  }
}

impl<K, T> Default for Query<K, T>
where
  K: Clone + PartialEq + Debug + Send + 'static,
  T: Send + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<K: Debug, T: Debug> Debug for Query<K, T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("key", &self.key)
      .field("generation", &self.generation)
      .field("fetched_at", &self.fetched_at)
      .finish_non_exhaustive()
  }
}
