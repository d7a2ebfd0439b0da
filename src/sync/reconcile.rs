//! Folding realtime row changes into an ordered message list.

use serde_json::Value;
use tracing::warn;

use crate::backend::types::Message;
use crate::backend::{ChangeEvent, ChangeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEvent {
  Insert(Message),
  Update(Message),
  Delete { id: i64 },
}

impl MessageEvent {
  /// Interpret a raw row change on the message table. Rows that do not
  /// decode are logged and skipped.
  pub fn from_change(change: &ChangeEvent) -> Option<Self> {
    match change.kind {
      ChangeKind::Insert => decode(&change.new).map(MessageEvent::Insert),
      ChangeKind::Update => decode(&change.new).map(MessageEvent::Update),
      ChangeKind::Delete => match change.old.get("id").and_then(Value::as_i64) {
        Some(id) => Some(MessageEvent::Delete { id }),
        None => {
          warn!(old = %change.old, "delete without message id");
          None
        }
      },
    }
  }
}

fn decode(row: &Value) -> Option<Message> {
  match serde_json::from_value(row.clone()) {
    Ok(message) => Some(message),
    Err(e) => {
      warn!(error = %e, "undecodable message row");
      None
    }
  }
}

/// Sort key of the list: `created_at`, then `id`.
fn position_key(message: &Message) -> (chrono::DateTime<chrono::Utc>, i64) {
  (message.created_at, message.id)
}

/// Apply one event to a list kept ascending by `(created_at, id)` with
/// unique ids.
///
/// Inserts of a known id are ignored, and inserts older than the tail land
/// at their sorted position. Updates replace in place. Updates and deletes
/// of unknown ids are no-ops.
pub fn apply(mut messages: Vec<Message>, event: MessageEvent) -> Vec<Message> {
  match event {
    MessageEvent::Insert(message) => {
      if messages.iter().any(|m| m.id == message.id) {
        return messages;
      }
      let key = position_key(&message);
      match messages.last() {
        Some(tail) if position_key(tail) > key => {
          let at = messages.partition_point(|m| position_key(m) <= key);
          messages.insert(at, message);
        }
        _ => messages.push(message),
      }
    }
    MessageEvent::Update(message) => {
      if let Some(slot) = messages.iter_mut().find(|m| m.id == message.id) {
        *slot = message;
      }
    }
    MessageEvent::Delete { id } => messages.retain(|m| m.id != id),
  }
  messages
}

/// Fold messages that arrived live into a freshly fetched history.
pub fn merge_history(history: Vec<Message>, live: Vec<Message>) -> Vec<Message> {
  live
    .into_iter()
    .fold(history, |list, message| apply(list, MessageEvent::Insert(message)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{TimeZone, Utc};
  use serde_json::json;

  fn msg(id: i64, minute: u32, content: &str) -> Message {
    Message {
      id,
      channel_id: 1,
      sender_id: "u-1".to_string(),
      content: content.to_string(),
      created_at: Utc.with_ymd_and_hms(2024, 1, 5, 10, minute, 0).unwrap(),
    }
  }

  fn ids(list: &[Message]) -> Vec<i64> {
    list.iter().map(|m| m.id).collect()
  }

  #[test]
  fn test_insert_appends_newer_message() {
    let list = vec![msg(1, 0, "a"), msg(2, 1, "b")];
    let list = apply(list, MessageEvent::Insert(msg(3, 2, "c")));
    assert_eq!(ids(&list), vec![1, 2, 3]);
  }

  #[test]
  fn test_duplicate_insert_is_ignored() {
    let list = vec![msg(1, 0, "a"), msg(2, 1, "b")];
    let before = list.clone();
    let list = apply(list, MessageEvent::Insert(msg(2, 1, "b again")));
    assert_eq!(list, before);
  }

  #[test]
  fn test_out_of_order_insert_lands_in_sorted_position() {
    let list = vec![msg(1, 0, "a"), msg(2, 5, "b"), msg(3, 9, "c")];
    let list = apply(list, MessageEvent::Insert(msg(4, 3, "late")));
    assert_eq!(ids(&list), vec![1, 4, 2, 3]);

    // Same timestamp as an existing row: ordered by id
    let list = apply(list, MessageEvent::Insert(msg(0, 5, "tie")));
    assert_eq!(ids(&list), vec![1, 4, 0, 2, 3]);
  }

  #[test]
  fn test_update_replaces_in_place() {
    let list = vec![msg(1, 0, "a"), msg(2, 1, "b"), msg(3, 2, "c")];
    let list = apply(list, MessageEvent::Update(msg(2, 1, "edited")));
    assert_eq!(ids(&list), vec![1, 2, 3]);
    assert_eq!(list[1].content, "edited");

    let unchanged = apply(list.clone(), MessageEvent::Update(msg(99, 1, "ghost")));
    assert_eq!(unchanged, list);
  }

  #[test]
  fn test_delete_removes_or_noops() {
    let list = vec![msg(1, 0, "a"), msg(2, 1, "b")];
    let list = apply(list, MessageEvent::Delete { id: 1 });
    assert_eq!(ids(&list), vec![2]);
    let list = apply(list, MessageEvent::Delete { id: 1 });
    assert_eq!(ids(&list), vec![2]);
  }

  #[test]
  fn test_from_change_decodes_rows() {
    let insert = ChangeEvent {
      kind: ChangeKind::Insert,
      new: json!({
        "id": 10,
        "channel_id": 1,
        "sender_id": "u-2",
        "message": "hi",
        "created_at": "2024-01-05T10:00:00+00:00"
      }),
      old: json!({}),
    };
    assert!(matches!(
      MessageEvent::from_change(&insert),
      Some(MessageEvent::Insert(m)) if m.id == 10 && m.content == "hi"
    ));

    let delete = ChangeEvent {
      kind: ChangeKind::Delete,
      new: Value::Null,
      old: json!({"id": 10}),
    };
    assert_eq!(
      MessageEvent::from_change(&delete),
      Some(MessageEvent::Delete { id: 10 })
    );

    let broken = ChangeEvent {
      kind: ChangeKind::Update,
      new: json!({"id": "ten"}),
      old: json!({}),
    };
    assert_eq!(MessageEvent::from_change(&broken), None);
  }

  #[test]
  fn test_merge_history_keeps_live_messages_once() {
    let history = vec![msg(1, 0, "a"), msg(2, 1, "b")];
    let live = vec![msg(2, 1, "b"), msg(3, 2, "c")];
    assert_eq!(ids(&merge_history(history, live)), vec![1, 2, 3]);
  }
}
