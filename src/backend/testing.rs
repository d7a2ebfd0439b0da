//! In-memory stand-ins for the row API and the realtime transport.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::client::RowApi;
use super::error::{FetchError, SubscriptionError};
use super::filter::RowQuery;
use super::realtime::{ChangeFilter, ChannelSignal, RealtimeTransport, SignalCallback};

type Responder = Box<dyn Fn(&RowQuery) -> Vec<Value> + Send + Sync>;

/// Row API that replays queued pages (or answers from a closure) and
/// records every call.
#[derive(Default)]
pub struct FakeRowApi {
  pages: Mutex<VecDeque<Result<Vec<Value>, FetchError>>>,
  responder: Option<Responder>,
  selects: Mutex<Vec<RowQuery>>,
  inserts: Mutex<Vec<(String, Value)>>,
  updates: Mutex<Vec<(RowQuery, Value)>>,
}

impl FakeRowApi {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Answer successive selects with these results, then with empty pages.
  pub fn with_pages(pages: Vec<Result<Vec<Value>, FetchError>>) -> Arc<Self> {
    Arc::new(Self {
      pages: Mutex::new(pages.into()),
      ..Self::default()
    })
  }

  /// Answer every select by calling `f`.
  pub fn with_responder(f: impl Fn(&RowQuery) -> Vec<Value> + Send + Sync + 'static) -> Arc<Self> {
    Arc::new(Self {
      responder: Some(Box::new(f)),
      ..Self::default()
    })
  }

  pub fn selects(&self) -> Vec<RowQuery> {
    self.selects.lock().unwrap().clone()
  }

  pub fn inserts(&self) -> Vec<(String, Value)> {
    self.inserts.lock().unwrap().clone()
  }

  pub fn updates(&self) -> Vec<(RowQuery, Value)> {
    self.updates.lock().unwrap().clone()
  }
}

#[async_trait]
impl RowApi for FakeRowApi {
  async fn select(&self, query: &RowQuery) -> Result<Vec<Value>, FetchError> {
    self.selects.lock().unwrap().push(query.clone());
    if let Some(page) = self.pages.lock().unwrap().pop_front() {
      return page;
    }
    Ok(self.responder.as_ref().map(|f| f(query)).unwrap_or_default())
  }

  /// Echoes the row back with an id and `created_at`, as the backend would.
  async fn insert(&self, table: &str, row: Value) -> Result<Vec<Value>, FetchError> {
    let mut inserts = self.inserts.lock().unwrap();
    inserts.push((table.to_string(), row.clone()));

    let mut stored = row;
    if let Value::Object(fields) = &mut stored {
      fields
        .entry("id")
        .or_insert_with(|| Value::from(1000 + inserts.len() as i64));
      fields
        .entry("created_at")
        .or_insert_with(|| Value::from("2024-01-05T10:00:00+00:00"));
    }
    Ok(vec![stored])
  }

  async fn update(&self, query: &RowQuery, patch: Value) -> Result<(), FetchError> {
    self.updates.lock().unwrap().push((query.clone(), patch));
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
  Subscribe(String),
  Unsubscribe(String),
}

/// Transport that records subscribe/unsubscribe order and lets tests push
/// signals into any callback it was handed.
#[derive(Default)]
pub struct FakeTransport {
  calls: Mutex<Vec<TransportCall>>,
  callbacks: Mutex<HashMap<String, SignalCallback>>,
  filters: Mutex<HashMap<String, ChangeFilter>>,
  refuse: AtomicBool,
}

impl FakeTransport {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn calls(&self) -> Vec<TransportCall> {
    self.calls.lock().unwrap().clone()
  }

  pub fn filter_for(&self, topic: &str) -> Option<ChangeFilter> {
    self.filters.lock().unwrap().get(topic).cloned()
  }

  /// Last callback registered for `topic`, even after it was unsubscribed.
  pub fn callback_for(&self, topic: &str) -> Option<SignalCallback> {
    self.callbacks.lock().unwrap().get(topic).cloned()
  }

  pub fn emit(&self, topic: &str, signal: ChannelSignal) {
    if let Some(callback) = self.callback_for(topic) {
      callback(signal);
    }
  }

  /// Make further subscribes fail as if the transport had shut down.
  pub fn refuse_subscriptions(&self) {
    self.refuse.store(true, Ordering::SeqCst);
  }
}

impl RealtimeTransport for FakeTransport {
  fn subscribe(
    &self,
    topic: &str,
    filter: &ChangeFilter,
    callback: SignalCallback,
  ) -> Result<(), SubscriptionError> {
    if self.refuse.load(Ordering::SeqCst) {
      return Err(SubscriptionError::TransportClosed);
    }
    self
      .calls
      .lock()
      .unwrap()
      .push(TransportCall::Subscribe(topic.to_string()));
    self
      .filters
      .lock()
      .unwrap()
      .insert(topic.to_string(), filter.clone());
    self
      .callbacks
      .lock()
      .unwrap()
      .insert(topic.to_string(), callback);
    Ok(())
  }

  fn unsubscribe(&self, topic: &str) {
    self
      .calls
      .lock()
      .unwrap()
      .push(TransportCall::Unsubscribe(topic.to_string()));
  }
}
