use ratatui::prelude::Color;

use crate::backend::types::ClaimStatus;
use crate::backend::ChannelStatus;

/// Truncate a string to at most `max_len` characters, adding "..." if
/// truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Tag colour for a claim status
pub fn claim_status_color(status: ClaimStatus) -> Color {
  match status {
    ClaimStatus::OpenUnprocessed => Color::Red,
    ClaimStatus::OpenInProgress => Color::Blue,
    ClaimStatus::PendingResponse => Color::Yellow,
    ClaimStatus::Resolved => Color::Green,
    ClaimStatus::Unknown => Color::Gray,
  }
}

/// Indicator colour for a realtime channel
pub fn channel_status_color(status: Option<&ChannelStatus>) -> Color {
  match status {
    Some(ChannelStatus::Subscribed) => Color::Green,
    Some(ChannelStatus::Connecting) => Color::Yellow,
    Some(ChannelStatus::Error(_)) => Color::Red,
    Some(ChannelStatus::Closed) | None => Color::DarkGray,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("réclamation ouverte", 8), "récla...");
  }

  #[test]
  fn test_claim_status_colors() {
    assert_eq!(claim_status_color(ClaimStatus::OpenUnprocessed), Color::Red);
    assert_eq!(claim_status_color(ClaimStatus::PendingResponse), Color::Yellow);
    assert_eq!(claim_status_color(ClaimStatus::Resolved), Color::Green);
  }

  #[test]
  fn test_channel_status_colors() {
    assert_eq!(channel_status_color(None), Color::DarkGray);
    assert_eq!(
      channel_status_color(Some(&ChannelStatus::Error("x".to_string()))),
      Color::Red
    );
  }
}
