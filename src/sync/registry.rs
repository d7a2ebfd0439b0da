//! Process-wide owner of live realtime subscriptions.
//!
//! Every UI context (the chat pane, the notification bell) opens its channel
//! through the registry under a [`ChannelKey`]. The registry keeps at most one
//! live subscription per key scope and per wire topic: opening a key always
//! tears down whatever that scope or topic had before, in one step with no
//! suspension point, so two subscriptions for the same context are never
//! live at the same time.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::{debug, info, trace, warn};

use crate::backend::{
  ChangeEvent, ChangeFilter, ChannelSignal, ChannelStatus, RealtimeTransport, SignalCallback,
  SubscriptionError,
};

/// Logical identity of a subscription.
///
/// `scope` names the owning context and is the unit of exclusivity; `id` is
/// what that context is currently looking at (a chat channel id, a fixed
/// bus name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
  pub scope: &'static str,
  pub id: String,
}

impl ChannelKey {
  pub fn new(scope: &'static str, id: impl ToString) -> Self {
    Self {
      scope,
      id: id.to_string(),
    }
  }
}

impl fmt::Display for ChannelKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.scope, self.id)
  }
}

/// What a subscriber receives. Row contents are passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
  Change {
    key: ChannelKey,
    change: ChangeEvent,
  },
  Status {
    key: ChannelKey,
    status: ChannelStatus,
  },
}

impl ChannelEvent {
  pub fn key(&self) -> &ChannelKey {
    match self {
      ChannelEvent::Change { key, .. } | ChannelEvent::Status { key, .. } => key,
    }
  }
}

/// Identifies one `open` call; stays valid until the channel is replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
  pub key: ChannelKey,
  pub topic: String,
  id: u64,
}

struct LiveChannel {
  id: u64,
  key: ChannelKey,
  topic: String,
  status: ChannelStatus,
}

#[derive(Default)]
struct RegistryState {
  next_id: u64,
  /// Keyed by scope.
  channels: HashMap<&'static str, LiveChannel>,
}

pub struct ChannelRegistry {
  transport: Arc<dyn RealtimeTransport>,
  state: Arc<Mutex<RegistryState>>,
}

impl ChannelRegistry {
  pub fn new(transport: Arc<dyn RealtimeTransport>) -> Self {
    Self {
      transport,
      state: Arc::new(Mutex::new(RegistryState::default())),
    }
  }

  /// Subscribe `key` to changes matching `filter`, replacing any live
  /// channel in the same scope or on the same topic.
  ///
  /// `topic_name` derives the transport topic from the key id; it should be
  /// deterministic so a stale subscription can be found again by name.
  pub fn open<N, H>(
    &self,
    key: ChannelKey,
    topic_name: N,
    filter: ChangeFilter,
    on_event: H,
  ) -> Result<SubscriptionHandle, SubscriptionError>
  where
    N: FnOnce(&str) -> String,
    H: Fn(ChannelEvent) + Send + Sync + 'static,
  {
    let topic = topic_name(&key.id);

    let id = {
      let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

      if let Some(previous) = state.channels.remove(key.scope) {
        info!(key = %previous.key, topic = %previous.topic, "closing channel before reopen");
        self.transport.unsubscribe(&previous.topic);
      }

      let colliding = state
        .channels
        .iter()
        .find(|(_, live)| live.topic == topic)
        .map(|(scope, _)| *scope);
      if let Some(scope) = colliding {
        if let Some(previous) = state.channels.remove(scope) {
          warn!(key = %previous.key, %topic, "topic already in use, closing previous owner");
          self.transport.unsubscribe(&previous.topic);
        }
      }

      state.next_id += 1;
      let id = state.next_id;
      state.channels.insert(
        key.scope,
        LiveChannel {
          id,
          key: key.clone(),
          topic: topic.clone(),
          status: ChannelStatus::Connecting,
        },
      );
      id
    };

    let callback = dispatcher(Arc::downgrade(&self.state), key.clone(), id, on_event);
    if let Err(e) = self.transport.subscribe(&topic, &filter, callback) {
      warn!(%key, %topic, error = %e, "subscribe failed");
      let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
      if state.channels.get(key.scope).is_some_and(|live| live.id == id) {
        state.channels.remove(key.scope);
      }
      return Err(e);
    }

    debug!(%key, %topic, "channel opened");
    Ok(SubscriptionHandle { key, topic, id })
  }

  /// Close the live channel of `scope`, if any.
  pub fn close(&self, scope: &str) -> bool {
    let removed = self
      .state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .channels
      .remove(scope);
    match removed {
      Some(live) => {
        info!(key = %live.key, topic = %live.topic, "channel closed");
        self.transport.unsubscribe(&live.topic);
        true
      }
      None => false,
    }
  }

  /// Close the channel only if it is still the one `handle` opened.
  pub fn close_handle(&self, handle: &SubscriptionHandle) -> bool {
    let is_current = self
      .state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .channels
      .get(handle.key.scope)
      .is_some_and(|live| live.id == handle.id);
    is_current && self.close(handle.key.scope)
  }

  pub fn close_all(&self) {
    let drained: Vec<LiveChannel> = self
      .state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .channels
      .drain()
      .map(|(_, live)| live)
      .collect();
    for live in drained {
      debug!(key = %live.key, topic = %live.topic, "channel closed on shutdown");
      self.transport.unsubscribe(&live.topic);
    }
  }

  pub fn status(&self, scope: &str) -> Option<ChannelStatus> {
    self
      .state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .channels
      .get(scope)
      .map(|live| live.status.clone())
  }

  /// Key currently open in `scope`.
  pub fn current(&self, scope: &str) -> Option<ChannelKey> {
    self
      .state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .channels
      .get(scope)
      .map(|live| live.key.clone())
  }

  pub fn live_count(&self) -> usize {
    self
      .state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .channels
      .len()
  }
}

impl Drop for ChannelRegistry {
  fn drop(&mut self) {
    self.close_all();
  }
}

/// Transport callback for one `open` call. Signals are dropped once the
/// channel has been replaced or closed, so a late frame from a retired
/// topic never reaches the new subscriber.
fn dispatcher<H>(state: Weak<Mutex<RegistryState>>, key: ChannelKey, id: u64, on_event: H) -> SignalCallback
where
  H: Fn(ChannelEvent) + Send + Sync + 'static,
{
  Arc::new(move |signal: ChannelSignal| {
    let Some(state) = state.upgrade() else {
      return;
    };

    let live = {
      let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
      match state.channels.get_mut(key.scope) {
        Some(channel) if channel.id == id => {
          if let ChannelSignal::Status(status) = &signal {
            channel.status = status.clone();
          }
          true
        }
        _ => false,
      }
    };
    if !live {
      trace!(%key, "signal for retired channel dropped");
      return;
    }

    match signal {
      ChannelSignal::Status(status) => {
        match &status {
          ChannelStatus::Subscribed => info!(%key, "channel ready"),
          ChannelStatus::Error(reason) => warn!(%key, %reason, "channel error"),
          other => debug!(%key, status = %other, "channel status"),
        }
        on_event(ChannelEvent::Status {
          key: key.clone(),
          status,
        });
      }
      ChannelSignal::Change(change) => on_event(ChannelEvent::Change {
        key: key.clone(),
        change,
      }),
    }
  })
}
