use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use crate::sync::ChannelEvent;

/// A keyboard shortcut hint for display in the footer
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
  /// No action needed
  None,
  /// Show the claims screen with the claim owning this chat channel selected
  OpenChannel(i64),
  Quit,
}

/// Trait for screen behavior
///
/// Screens handle their own input modes (search, compose) and return
/// actions for the App to execute. Async loads go through `Query` and are
/// picked up in `tick()`.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to allow views to poll async queries
  fn tick(&mut self) {}

  /// Realtime event routed from the channel registry
  fn on_channel_event(&mut self, _event: &ChannelEvent) {}

  /// Whether keys are being captured by a text input
  fn is_capturing_input(&self) -> bool {
    false
  }

  /// Get keyboard shortcuts to display in the footer
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Blank;

  impl View for Blank {
    fn handle_key(&mut self, _key: KeyEvent) -> ViewAction {
      ViewAction::None
    }

    fn render(&mut self, _frame: &mut Frame, _area: Rect) {}

    fn breadcrumb_label(&self) -> String {
      "Blank".to_string()
    }
  }

  #[test]
  fn test_default_shortcuts_include_command() {
    let shortcuts = Blank.shortcuts();
    assert!(shortcuts.iter().any(|s| s.key == ":"));
    assert!(!Blank.is_capturing_input());
  }
}
