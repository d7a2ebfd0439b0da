//! Error types for the backend adapters.

use thiserror::Error;

/// A row request (or one page of it) failed.
#[derive(Debug, Error)]
pub enum FetchError {
  /// Transport-level failure talking to the row API.
  #[error("request to '{table}' failed: {source}")]
  Http {
    table: String,
    #[source]
    source: reqwest::Error,
  },

  /// The row API answered with a non-success status.
  #[error("'{table}' returned {status}: {message}")]
  Api {
    table: String,
    status: u16,
    message: String,
  },

  /// A returned row did not match the expected shape.
  #[error("failed to decode '{table}' row: {source}")]
  Decode {
    table: String,
    #[source]
    source: serde_json::Error,
  },

  /// A write asked for its stored row back and got nothing.
  #[error("'{table}' returned no row")]
  Empty { table: String },

  /// The configured backend URL could not be used.
  #[error("invalid backend url: {0}")]
  Url(#[from] url::ParseError),
}

impl FetchError {
  pub fn decode(table: &str, source: serde_json::Error) -> Self {
    Self::Decode {
      table: table.to_string(),
      source,
    }
  }
}

/// A realtime channel could not be (or stopped being) subscribed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubscriptionError {
  /// The realtime worker has shut down.
  #[error("realtime transport is closed")]
  TransportClosed,

  /// The server refused to join the topic.
  #[error("channel '{topic}' rejected: {reason}")]
  Rejected { topic: String, reason: String },

  /// The socket dropped or could not be opened.
  #[error("realtime connection error: {0}")]
  Connection(String),
}
