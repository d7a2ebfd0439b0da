//! The chat pane: one selected channel, its subscription and its messages.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::backend::types::Message;
use crate::backend::{ChangeFilter, ChannelStatus, SubscriptionError};
use crate::query::{Polled, Query};

use super::last_message::MESSAGE_TABLE;
use super::reconcile::{apply, merge_history, MessageEvent};
use super::registry::{ChannelEvent, ChannelKey, ChannelRegistry};

/// Registry scope of the chat pane.
pub const CHAT_SCOPE: &str = "chat";

/// Deterministic transport topic of a chat channel.
pub fn chat_topic(channel_id: &str) -> String {
  format!("message_chat_{}", channel_id)
}

type EventSink = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

/// Selected chat channel and its reconciled message list.
///
/// Selecting a channel swaps the realtime subscription through the
/// registry and starts a history load. Realtime messages that arrive before
/// the history are kept and folded into it when it lands; history or events
/// for a channel that is no longer selected are dropped.
pub struct ChatSession {
  registry: Arc<ChannelRegistry>,
  schema: String,
  sink: EventSink,
  selected: Option<i64>,
  messages: Vec<Message>,
  history: Query<i64, Vec<Message>>,
  history_applied: bool,
  status: Option<ChannelStatus>,
}

impl ChatSession {
  pub fn new(registry: Arc<ChannelRegistry>, schema: &str, sink: EventSink) -> Self {
    Self {
      registry,
      schema: schema.to_string(),
      sink,
      selected: None,
      messages: Vec::new(),
      history: Query::new(),
      history_applied: false,
      status: None,
    }
  }

  pub fn selected(&self) -> Option<i64> {
    self.selected
  }

  pub fn messages(&self) -> &[Message] {
    &self.messages
  }

  pub fn status(&self) -> Option<&ChannelStatus> {
    self.status.as_ref()
  }

  pub fn is_loading(&self) -> bool {
    self.history.is_loading()
  }

  pub fn error(&self) -> Option<&str> {
    self.history.error()
  }

  /// Whether `channel_id` is selected and its subscription is still
  /// connecting or subscribed in the registry.
  fn is_live(&self, channel_id: i64) -> bool {
    self.selected == Some(channel_id)
      && matches!(
        self.status,
        Some(ChannelStatus::Connecting) | Some(ChannelStatus::Subscribed)
      )
      && self.registry.current(CHAT_SCOPE) == Some(ChannelKey::new(CHAT_SCOPE, channel_id))
  }

  /// Switch the pane to `channel_id`. The previous subscription is closed
  /// before the new one is opened; `history` is the initial message load.
  ///
  /// Selecting the current channel again is a no-op while it is live, and
  /// reopens it after an error or close.
  pub fn select_channel<Fut>(&mut self, channel_id: i64, history: Fut) -> Result<(), SubscriptionError>
  where
    Fut: Future<Output = Result<Vec<Message>, String>> + Send + 'static,
  {
    if self.is_live(channel_id) {
      return Ok(());
    }

    debug!(channel_id, "selecting chat channel");
    self.selected = Some(channel_id);
    self.messages.clear();
    self.history_applied = false;
    self.status = Some(ChannelStatus::Connecting);
    self.history.load(channel_id, history);

    let filter = ChangeFilter::table(&self.schema, MESSAGE_TABLE).eq("channel_id", channel_id);
    let sink = Arc::clone(&self.sink);
    let opened = self.registry.open(
      ChannelKey::new(CHAT_SCOPE, channel_id),
      chat_topic,
      filter,
      move |event| sink(event),
    );
    if let Err(e) = &opened {
      self.status = Some(ChannelStatus::Error(e.to_string()));
    }
    opened.map(|_| ())
  }

  pub fn deselect_channel(&mut self) {
    if self.selected.take().is_some() {
      self.registry.close(CHAT_SCOPE);
    }
    self.history.reset();
    self.messages.clear();
    self.history_applied = false;
    self.status = None;
  }

  /// Apply a registry event. Returns true if the pane changed.
  pub fn handle_event(&mut self, event: &ChannelEvent) -> bool {
    let key = event.key();
    if key.scope != CHAT_SCOPE {
      return false;
    }
    if self.selected.map(|id| id.to_string()).as_deref() != Some(key.id.as_str()) {
      trace!(%key, "event for deselected channel discarded");
      return false;
    }

    match event {
      ChannelEvent::Status { status, .. } => {
        self.status = Some(status.clone());
        true
      }
      ChannelEvent::Change { change, .. } => match MessageEvent::from_change(change) {
        Some(message_event) => {
          let messages = std::mem::take(&mut self.messages);
          self.messages = apply(messages, message_event);
          true
        }
        None => false,
      },
    }
  }

  /// Pick up a finished history load. Returns true if the pane changed.
  pub fn poll(&mut self) -> bool {
    if self.history.poll() != Polled::Updated {
      return false;
    }
    if let Some(history) = self.history.data() {
      if !self.history_applied {
        let live = std::mem::take(&mut self.messages);
        self.messages = merge_history(history.clone(), live);
        self.history_applied = true;
        debug!(
          channel_id = ?self.selected,
          messages = self.messages.len(),
          "chat history applied"
        );
      }
    }
    true
  }
}
