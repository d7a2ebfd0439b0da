//! Inbound-message feed behind the header bell.

use tracing::{debug, info};

use crate::backend::types::Message;
use crate::backend::{ChangeFilter, SubscriptionError};
use crate::sync::{ChannelEvent, ChannelKey, ChannelRegistry, MessageEvent, SubscriptionHandle, MESSAGE_TABLE};

/// Registry scope of the notification bus.
pub const NOTIFICATION_SCOPE: &str = "notifications";
const BUS_ID: &str = "bus";

/// Subscribe the notification bus to every message posted in `channel_ids`.
///
/// Reopening replaces the previous bus subscription. With no channels there
/// is nothing to listen to and the bus is closed instead.
pub fn open_bus<H>(
  registry: &ChannelRegistry,
  schema: &str,
  channel_ids: &[i64],
  on_event: H,
) -> Result<Option<SubscriptionHandle>, SubscriptionError>
where
  H: Fn(ChannelEvent) + Send + Sync + 'static,
{
  if channel_ids.is_empty() {
    registry.close(NOTIFICATION_SCOPE);
    return Ok(None);
  }

  info!(channels = channel_ids.len(), "opening notification bus");
  let filter = ChangeFilter::table(schema, MESSAGE_TABLE).in_list("channel_id", channel_ids);
  registry
    .open(
      ChannelKey::new(NOTIFICATION_SCOPE, BUS_ID),
      |_| NOTIFICATION_SCOPE.to_string(),
      filter,
      on_event,
    )
    .map(Some)
}

/// Newest-first list of messages not sent by the operator, with an unread
/// counter.
#[derive(Debug, Clone)]
pub struct NotificationFeed {
  admin_id: String,
  limit: usize,
  entries: Vec<Message>,
  unread: usize,
}

impl NotificationFeed {
  pub fn new(admin_id: impl Into<String>, limit: usize) -> Self {
    Self {
      admin_id: admin_id.into(),
      limit,
      entries: Vec::new(),
      unread: 0,
    }
  }

  pub fn entries(&self) -> &[Message] {
    &self.entries
  }

  pub fn unread(&self) -> usize {
    self.unread
  }

  /// Fold freshly loaded history into the list. Entries pushed while the
  /// load was in flight are kept; history itself counts as read.
  pub fn load_history(&mut self, history: Vec<Message>) {
    let mut merged = std::mem::take(&mut self.entries);
    merged.extend(history.into_iter().filter(|m| m.sender_id != self.admin_id));
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    merged.dedup_by_key(|m| m.id);
    merged.truncate(self.limit);
    self.entries = merged;
  }

  /// Record a newly posted message. Returns false when it was ignored.
  pub fn push(&mut self, message: Message) -> bool {
    if message.sender_id == self.admin_id {
      return false;
    }
    if self.entries.iter().any(|m| m.id == message.id) {
      debug!(message_id = message.id, "duplicate notification ignored");
      return false;
    }

    self.entries.insert(0, message);
    self.entries.truncate(self.limit);
    self.unread += 1;
    true
  }

  /// Apply a bus event. Only inserts raise notifications.
  pub fn handle_event(&mut self, event: &ChannelEvent) -> bool {
    let ChannelEvent::Change { key, change } = event else {
      return false;
    };
    if key.scope != NOTIFICATION_SCOPE {
      return false;
    }
    match MessageEvent::from_change(change) {
      Some(MessageEvent::Insert(message)) => self.push(message),
      _ => false,
    }
  }

  pub fn mark_read(&mut self) {
    self.unread = 0;
  }
}
