use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::backend::types::Message;
use crate::dashboard::{DashboardClient, NotificationFeed};
use crate::event::{Event, EventSender};
use crate::query::{Polled, Query, QueryState};
use crate::sync::{relative_time, ChannelEvent};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};

/// Inbound customer messages, newest first
pub struct NotificationsView {
  client: DashboardClient,
  tx: EventSender,
  feed: NotificationFeed,
  history: Query<u64, Vec<Message>>,
  loads: u64,
  list_state: ListState,
}

impl NotificationsView {
  pub fn new(client: DashboardClient, tx: EventSender, history_limit: usize) -> Self {
    let feed = NotificationFeed::new(client.admin_id(), history_limit);
    Self {
      client,
      tx,
      feed,
      history: Query::new(),
      loads: 0,
      list_state: ListState::default(),
    }
  }

  pub fn reload(&mut self) {
    self.loads += 1;
    let client = self.client.clone();
    self.history.load(self.loads, async move {
      client.notification_history().await.map_err(|e| e.to_string())
    });
  }

  pub fn unread(&self) -> usize {
    self.feed.unread()
  }

  pub fn mark_read(&mut self) {
    self.feed.mark_read();
  }
}

impl View for NotificationsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.reload(),
      KeyCode::Enter => {
        let selected = self
          .list_state
          .selected()
          .and_then(|idx| self.feed.entries().get(idx));
        if let Some(message) = selected {
          return ViewAction::OpenChannel(message.channel_id);
        }
      }
      KeyCode::Char('q') => return ViewAction::Quit,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let entries = self.feed.entries();
    let title = match self.history.state() {
      QueryState::Loading => " Notifications (loading...) ".to_string(),
      _ => format!(" Notifications ({}) ", entries.len()),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if entries.is_empty() {
      let text = match self.history.error() {
        Some(e) => format!("Failed to load notifications: {}", e),
        None => "No notifications.".to_string(),
      };
      frame.render_widget(
        Paragraph::new(text)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    }

    let now = Utc::now();
    let width = area.width.saturating_sub(40) as usize;
    let items: Vec<ListItem> = entries
      .iter()
      .map(|m| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<12}", relative_time(now, m.created_at)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::styled(format!("chat #{:<8}", m.channel_id), Style::default().fg(Color::Cyan)),
          Span::raw(truncate(&m.content, width.max(10))),
        ]))
      })
      .collect();
    let len = items.len();

    ensure_valid_selection(&mut self.list_state, len);
    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn breadcrumb_label(&self) -> String {
    "Notifications".to_string()
  }

  fn tick(&mut self) {
    if self.history.poll() != Polled::Updated {
      return;
    }
    match self.history.state() {
      QueryState::Success(history) => {
        let history = history.clone();
        self.feed.load_history(history);
      }
      QueryState::Error(e) => {
        let _ = self.tx.send(Event::Error(format!("Notifications: {}", e)));
      }
      _ => {}
    }
  }

  fn on_channel_event(&mut self, event: &ChannelEvent) {
    self.feed.handle_event(event);
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("Enter", "open chat").with_priority(20),
      ShortcutInfo::new("r", "reload").with_priority(30),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::testing::FakeRowApi;
  use crate::backend::{ChangeEvent, ChangeKind};
  use crate::dashboard::{DashboardSettings, NOTIFICATION_SCOPE};
  use crate::sync::ChannelKey;
  use crossterm::event::KeyModifiers;
  use serde_json::json;
  use std::time::Duration;
  use tokio::sync::mpsc;

  #[tokio::test(start_paused = true)]
  async fn test_history_then_live_insert_opens_channel() {
    let api = FakeRowApi::with_pages(vec![Ok(vec![json!({
      "id": 1, "channel_id": 7, "sender_id": "cust", "message": "hello",
      "created_at": "2024-01-05T09:00:00+00:00"
    })])]);
    let settings = DashboardSettings {
      admin_id: "admin".to_string(),
      ..DashboardSettings::default()
    };
    let client = DashboardClient::new(api, settings);
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut view = NotificationsView::new(client, tx, 50);

    view.reload();
    tokio::time::sleep(Duration::from_millis(10)).await;
    view.tick();
    assert_eq!(view.feed.entries().len(), 1);
    assert_eq!(view.unread(), 0);

    view.on_channel_event(&ChannelEvent::Change {
      key: ChannelKey::new(NOTIFICATION_SCOPE, "bus"),
      change: ChangeEvent {
        kind: ChangeKind::Insert,
        new: json!({
          "id": 2, "channel_id": 9, "sender_id": "cust", "message": "any news?",
          "created_at": "2024-01-05T10:00:00+00:00"
        }),
        old: json!({}),
      },
    });
    assert_eq!(view.unread(), 1);

    view.list_state.select(Some(0));
    assert_eq!(
      view.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)),
      ViewAction::OpenChannel(9)
    );
    view.mark_read();
    assert_eq!(view.unread(), 0);
  }
}
