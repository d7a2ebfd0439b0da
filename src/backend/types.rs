use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::cache::Timestamped;

/// Order row (only the columns the dashboard reads)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Order {
  pub id: i64,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(deserialize_with = "timestamp")]
  pub created_at: DateTime<Utc>,
}

/// Claim row as used by claim analytics
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claim {
  pub claim_id: i64,
  #[serde(default)]
  pub status: ClaimStatus,
  #[serde(default)]
  pub channel_id: Option<i64>,
  #[serde(deserialize_with = "timestamp")]
  pub created_at: DateTime<Utc>,
}

/// Archived search made by a customer
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResult {
  pub id: i64,
  #[serde(default)]
  pub search_query: Option<String>,
  #[serde(deserialize_with = "timestamp")]
  pub created_at: DateTime<Utc>,
}

/// Chat message in a claim channel
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
  pub id: i64,
  pub channel_id: i64,
  pub sender_id: String,
  #[serde(rename = "message")]
  pub content: String,
  #[serde(deserialize_with = "timestamp")]
  pub created_at: DateTime<Utc>,
}

/// Body for inserting a message; the backend assigns id and created_at.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage<'a> {
  pub channel_id: i64,
  pub sender_id: &'a str,
  pub message: &'a str,
}

/// Customer profile embedded in claim threads
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PublicProfile {
  #[serde(default)]
  pub first_name: Option<String>,
  #[serde(default)]
  pub last_name: Option<String>,
  #[serde(default)]
  pub avatar: Option<String>,
}

impl PublicProfile {
  pub fn display_name(&self) -> String {
    let first = self.first_name.as_deref().unwrap_or("");
    let last = self.last_name.as_deref().unwrap_or("");
    format!("{} {}", first, last).trim().to_string()
  }
}

/// Claim with its customer, as listed on the claims screen
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClaimThread {
  pub claim_id: i64,
  #[serde(default)]
  pub claim_slug: Option<String>,
  #[serde(default)]
  pub order_id: Option<i64>,
  #[serde(default)]
  pub user_id: Option<String>,
  #[serde(default)]
  pub channel_id: Option<i64>,
  #[serde(default)]
  pub status: ClaimStatus,
  /// Customer's description of the problem
  #[serde(default)]
  pub content: Option<String>,
  #[serde(deserialize_with = "timestamp")]
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub public_profile: Option<PublicProfile>,
}

impl ClaimThread {
  pub fn customer_name(&self) -> String {
    self
      .public_profile
      .as_ref()
      .map(PublicProfile::display_name)
      .unwrap_or_default()
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
  OpenUnprocessed,
  OpenInProgress,
  PendingResponse,
  Resolved,
  #[default]
  #[serde(other)]
  Unknown,
}

impl ClaimStatus {
  /// Statuses an operator can move a claim through, in workflow order.
  pub const WORKFLOW: [ClaimStatus; 4] = [
    ClaimStatus::OpenUnprocessed,
    ClaimStatus::OpenInProgress,
    ClaimStatus::PendingResponse,
    ClaimStatus::Resolved,
  ];

  pub fn label(self) -> &'static str {
    match self {
      ClaimStatus::OpenUnprocessed => "Unprocessed",
      ClaimStatus::OpenInProgress => "In progress",
      ClaimStatus::PendingResponse => "Pending",
      ClaimStatus::Resolved => "Resolved",
      ClaimStatus::Unknown => "Unknown",
    }
  }

  /// Wire value as stored in the claim table.
  pub fn as_str(self) -> &'static str {
    match self {
      ClaimStatus::OpenUnprocessed => "OPEN_UNPROCESSED",
      ClaimStatus::OpenInProgress => "OPEN_IN_PROGRESS",
      ClaimStatus::PendingResponse => "PENDING_RESPONSE",
      ClaimStatus::Resolved => "RESOLVED",
      ClaimStatus::Unknown => "UNKNOWN",
    }
  }

  /// Next status in the workflow, wrapping around.
  pub fn next(self) -> ClaimStatus {
    let idx = Self::WORKFLOW.iter().position(|s| *s == self);
    match idx {
      Some(i) => Self::WORKFLOW[(i + 1) % Self::WORKFLOW.len()],
      None => ClaimStatus::OpenUnprocessed,
    }
  }
}

impl Timestamped for Order {
  fn timestamp(&self) -> DateTime<Utc> {
    self.created_at
  }
}

impl Timestamped for Claim {
  fn timestamp(&self) -> DateTime<Utc> {
    self.created_at
  }
}

impl Timestamped for SearchResult {
  fn timestamp(&self) -> DateTime<Utc> {
    self.created_at
  }
}

/// Accept `timestamptz` values (with offset) as well as bare `timestamp`
/// values, which are taken as UTC.
fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = String::deserialize(deserializer)?;
  parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Ok(dt.with_timezone(&Utc));
  }
  // Postgres text form uses a space separator and may drop the minutes of the offset
  if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
    .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
    .map(|naive| naive.and_utc())
    .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_parse_timestamp_variants() {
    let expected = Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap();
    assert_eq!(parse_timestamp("2024-01-05T10:00:00Z").unwrap(), expected);
    assert_eq!(parse_timestamp("2024-01-05T11:00:00+01:00").unwrap(), expected);
    assert_eq!(parse_timestamp("2024-01-05T10:00:00").unwrap(), expected);
    assert_eq!(
      parse_timestamp("2024-01-05T10:00:00.250").unwrap(),
      expected + chrono::Duration::milliseconds(250)
    );
    assert!(parse_timestamp("yesterday").is_err());
  }

  #[test]
  fn test_message_uses_message_column_for_content() {
    let json = r#"{
      "id": 7,
      "channel_id": 3,
      "sender_id": "u-1",
      "message": "hello",
      "created_at": "2024-01-05T10:00:00.123456+00:00",
      "is_read": false
    }"#;
    let msg: Message = serde_json::from_str(json).unwrap();
    assert_eq!(msg.content, "hello");
    assert_eq!(msg.channel_id, 3);
  }

  #[test]
  fn test_claim_thread_with_profile_and_unknown_status() {
    let json = r#"{
      "claim_id": 12,
      "order_id": 900,
      "channel_id": 44,
      "status": "ESCALATED",
      "created_at": "2024-01-05T10:00:00+00:00",
      "public_profile": {"first_name": "Ada", "last_name": "Lovelace", "avatar": null}
    }"#;
    let thread: ClaimThread = serde_json::from_str(json).unwrap();
    assert_eq!(thread.status, ClaimStatus::Unknown);
    assert_eq!(thread.customer_name(), "Ada Lovelace");
  }

  #[test]
  fn test_claim_status_wire_names_and_cycle() {
    let status: ClaimStatus = serde_json::from_str("\"OPEN_IN_PROGRESS\"").unwrap();
    assert_eq!(status, ClaimStatus::OpenInProgress);
    assert_eq!(status.as_str(), "OPEN_IN_PROGRESS");
    assert_eq!(ClaimStatus::Resolved.next(), ClaimStatus::OpenUnprocessed);
    assert_eq!(ClaimStatus::Unknown.next(), ClaimStatus::OpenUnprocessed);
  }
}
