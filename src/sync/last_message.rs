use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::backend::types::Message;
use crate::backend::{Direction, FetchError, RowApi, RowQuery};

pub const MESSAGE_TABLE: &str = "message_chat";

/// Shown for channels without any message yet.
pub const NO_MESSAGES: &str = "No messages";

/// Most recent message of one channel, with a display label for its age.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessageInfo {
  pub message: String,
  pub relative_time: String,
  /// `None` for the empty-channel sentinel
  pub timestamp: Option<DateTime<Utc>>,
}

impl LastMessageInfo {
  pub fn none() -> Self {
    Self {
      message: NO_MESSAGES.to_string(),
      relative_time: String::new(),
      timestamp: None,
    }
  }

  fn from_message(message: &Message, now: DateTime<Utc>) -> Self {
    Self {
      message: message.content.clone(),
      relative_time: relative_time(now, message.created_at),
      timestamp: Some(message.created_at),
    }
  }
}

/// Human-readable age of `ts` as seen at `now`, in whole buckets.
pub fn relative_time(now: DateTime<Utc>, ts: DateTime<Utc>) -> String {
  let minutes = (now - ts).num_minutes();
  if minutes < 1 {
    "just now".to_string()
  } else if minutes < 60 {
    format!("{} min ago", minutes)
  } else if minutes < 1440 {
    format!("{}h ago", minutes / 60)
  } else {
    format!("{}d ago", minutes / 1440)
  }
}

/// Index ascending-ordered messages by channel: the last message seen for
/// each requested channel wins. Channels with no message get the sentinel.
pub fn index_last_messages(
  channel_ids: &[i64],
  messages: &[Message],
  now: DateTime<Utc>,
) -> HashMap<i64, LastMessageInfo> {
  let mut last: HashMap<i64, &Message> = HashMap::with_capacity(channel_ids.len());
  for message in messages {
    last.insert(message.channel_id, message);
  }

  channel_ids
    .iter()
    .map(|id| {
      let info = match last.get(id) {
        Some(message) => LastMessageInfo::from_message(message, now),
        None => LastMessageInfo::none(),
      };
      (*id, info)
    })
    .collect()
}

/// Last message for every channel in `channel_ids`, with one batch query.
pub async fn compute_last_messages(
  api: &dyn RowApi,
  channel_ids: &[i64],
  now: DateTime<Utc>,
) -> Result<HashMap<i64, LastMessageInfo>, FetchError> {
  if channel_ids.is_empty() {
    return Ok(HashMap::new());
  }

  let query = RowQuery::on(MESSAGE_TABLE)
    .is_in("channel_id", channel_ids)
    .order("created_at", Direction::Asc);
  let rows = api.select(&query).await?;
  let messages = rows
    .into_iter()
    .map(|row| serde_json::from_value(row).map_err(|e| FetchError::decode(MESSAGE_TABLE, e)))
    .collect::<Result<Vec<Message>, _>>()?;

  debug!(
    channels = channel_ids.len(),
    messages = messages.len(),
    "last messages computed"
  );
  Ok(index_last_messages(channel_ids, &messages, now))
}
