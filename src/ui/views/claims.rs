use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use tracing::warn;

use crate::backend::types::{ClaimStatus, ClaimThread, Message};
use crate::dashboard::claims::channel_ids;
use crate::dashboard::{sorted_claims, ClaimFilter, DashboardClient};
use crate::event::{Event, EventSender};
use crate::query::{Polled, Query, QueryState};
use crate::sync::{ChannelEvent, ChannelRegistry, ChatSession, Debouncer, LastMessageInfo};
use crate::ui::components::{InputResult, KeyResult, SearchEvent, SearchInput, TextInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{channel_status_color, claim_status_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
  List,
  Composer,
}

/// Claim threads on the left, the selected claim's chat on the right
pub struct ClaimsView {
  client: DashboardClient,
  tx: EventSender,

  threads: Query<u64, Vec<ClaimThread>>,
  loads: u64,
  last_messages: HashMap<i64, LastMessageInfo>,
  recency: Debouncer,
  status_update: Query<i64, ClaimStatus>,

  filter: ClaimFilter,
  search: SearchInput,
  list_state: ListState,

  chat: ChatSession,
  composer: TextInput,
  focus: Focus,
  /// Channel to open once the thread list has loaded
  pending_channel: Option<i64>,
}

impl ClaimsView {
  pub fn new(
    client: DashboardClient,
    registry: Arc<ChannelRegistry>,
    schema: &str,
    tx: EventSender,
    recency_delay: Duration,
  ) -> Self {
    let sink_tx = tx.clone();
    let chat = ChatSession::new(
      registry,
      schema,
      Arc::new(move |event: ChannelEvent| {
        let _ = sink_tx.send(Event::Channel(event));
      }),
    );

    Self {
      client,
      tx,
      threads: Query::new(),
      loads: 0,
      last_messages: HashMap::new(),
      recency: Debouncer::new(recency_delay),
      status_update: Query::new(),
      filter: ClaimFilter::default(),
      search: SearchInput::new("Filter claims"),
      list_state: ListState::default(),
      chat,
      composer: TextInput::new(),
      focus: Focus::List,
      pending_channel: None,
    }
  }

  pub fn reload(&mut self) {
    self.loads += 1;
    let client = self.client.clone();
    self.threads.load(self.loads, async move {
      client.claim_threads().await.map_err(|e| e.to_string())
    });
  }

  /// Install a recomputed last-message index.
  pub fn set_last_messages(&mut self, index: HashMap<i64, LastMessageInfo>) {
    self.last_messages = index;
  }

  /// Select the claim that owns `channel_id` and open its chat.
  pub fn focus_channel(&mut self, channel_id: i64) {
    self.filter = ClaimFilter::default();
    self.search = SearchInput::new("Filter claims");
    let position = self
      .visible()
      .iter()
      .position(|c| c.channel_id == Some(channel_id));
    match position {
      Some(idx) => {
        self.list_state.select(Some(idx));
        self.open_chat(channel_id);
      }
      None => self.pending_channel = Some(channel_id),
    }
  }

  fn all_threads(&self) -> &[ClaimThread] {
    self.threads.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn visible(&self) -> Vec<&ClaimThread> {
    sorted_claims(self.all_threads(), &self.filter, &self.last_messages)
  }

  fn selected_claim(&self) -> Option<&ClaimThread> {
    let idx = self.list_state.selected()?;
    self.visible().get(idx).copied()
  }

  fn notify(&self, message: String) {
    let _ = self.tx.send(Event::Error(message));
  }

  /// Recompute last messages for every claim channel, debounced so a burst
  /// of realtime inserts costs one query.
  fn schedule_recency(&mut self) {
    let ids = channel_ids(self.all_threads());
    if ids.is_empty() {
      return;
    }
    let client = self.client.clone();
    let tx = self.tx.clone();
    self.recency.call(async move {
      let event = match client.last_messages(&ids).await {
        Ok(index) => Event::LastMessages(index),
        Err(e) => {
          warn!(error = %e, "last message refresh failed");
          Event::Error(format!("Last messages: {}", e))
        }
      };
      let _ = tx.send(event);
    });
  }

  fn open_chat(&mut self, channel_id: i64) {
    let client = self.client.clone();
    let opened = self.chat.select_channel(channel_id, async move {
      client
        .messages_for_channel(channel_id)
        .await
        .map_err(|e| e.to_string())
    });
    if let Err(e) = opened {
      self.notify(format!("Chat subscription failed: {}", e));
    }
  }

  fn open_selected(&mut self) {
    let Some(claim) = self.selected_claim() else {
      return;
    };
    match claim.channel_id {
      Some(channel_id) => self.open_chat(channel_id),
      None => {
        let claim_id = claim.claim_id;
        self.chat.deselect_channel();
        self.notify(format!("Claim {} has no chat channel", claim_id));
      }
    }
  }

  fn cycle_status(&mut self) {
    let Some(claim) = self.selected_claim() else {
      return;
    };
    let claim_id = claim.claim_id;
    let next = claim.status.next();
    let client = self.client.clone();
    self.status_update.load(claim_id, async move {
      client
        .update_claim_status(claim_id, next)
        .await
        .map(|_| next)
        .map_err(|e| e.to_string())
    });
  }

  fn cycle_status_filter(&mut self) {
    self.filter.status = match self.filter.status {
      None => Some(ClaimStatus::WORKFLOW[0]),
      Some(current) => {
        let idx = ClaimStatus::WORKFLOW.iter().position(|s| *s == current);
        idx.and_then(|i| ClaimStatus::WORKFLOW.get(i + 1)).copied()
      }
    };
    self.list_state.select(Some(0));
  }

  fn send_composed(&mut self) {
    let content = self.composer.value().trim().to_string();
    let Some(channel_id) = self.chat.selected() else {
      return;
    };
    if content.is_empty() {
      return;
    }
    self.composer.clear();

    // No local echo: the message appears when the realtime insert arrives
    let client = self.client.clone();
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let sender = client.admin_id().to_string();
      if let Err(e) = client.send_message(channel_id, &sender, &content).await {
        let _ = tx.send(Event::Error(format!("Message not sent: {}", e)));
      }
    });
  }

  fn handle_composer_key(&mut self, key: KeyEvent) {
    match self.composer.handle_key(key) {
      InputResult::Submitted(_) => self.send_composed(),
      InputResult::Cancelled => self.focus = Focus::List,
      InputResult::Consumed | InputResult::NotHandled => {}
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let visible = self.visible();
    let len = visible.len();

    let mut title = match self.threads.state() {
      QueryState::Loading => " Claims (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Claims (error: {}) ", truncate(e, 40)),
      _ => format!(" Claims ({}/{}) ", len, self.all_threads().len()),
    };
    if let Some(status) = self.filter.status {
      title.push_str(&format!("[{}] ", status.label()));
    }
    if !self.filter.text.is_empty() {
      title.push_str(&format!("/{} ", self.filter.text));
    }

    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(if self.focus == Focus::List {
        Color::Blue
      } else {
        Color::DarkGray
      }));

    if visible.is_empty() {
      let content = if self.threads.is_loading() {
        "Loading claims..."
      } else if self.filter.is_empty() {
        "No claims."
      } else {
        "No claims match the filter."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let width = area.width.saturating_sub(6) as usize;
    let open_channel = self.chat.selected();
    let items: Vec<ListItem> = visible
      .iter()
      .map(|claim| {
        let last = claim
          .channel_id
          .and_then(|id| self.last_messages.get(&id))
          .cloned()
          .unwrap_or_else(LastMessageInfo::none);
        let name = claim.customer_name();
        let marker = if claim.channel_id.is_some() && claim.channel_id == open_channel {
          "● "
        } else {
          "  "
        };

        let head = Line::from(vec![
          Span::styled(marker, Style::default().fg(Color::Green)),
          Span::styled(
            format!("{:<12}", claim.status.label()),
            Style::default().fg(claim_status_color(claim.status)),
          ),
          Span::styled(
            format!("#{:<8}", claim.order_id.map(|id| id.to_string()).unwrap_or_default()),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(truncate(if name.is_empty() { "(unknown)" } else { &name }, 24)),
          Span::styled(format!("  {}", last.relative_time), Style::default().fg(Color::DarkGray)),
        ]);
        let preview = Line::from(Span::styled(
          format!("    {}", truncate(&last.message, width.saturating_sub(4))),
          Style::default().fg(Color::Gray),
        ));
        ListItem::new(vec![head, preview])
      })
      .collect();
    drop(visible);

    ensure_valid_selection(&mut self.list_state, len);
    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn render_chat(&self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(3), Constraint::Length(3)])
      .split(area);

    let status = self.chat.status();
    let title = match (self.chat.selected(), status) {
      (None, _) => " Chat ".to_string(),
      (Some(id), Some(status)) => format!(" Chat #{} [{}] ", id, status.label()),
      (Some(id), None) => format!(" Chat #{} ", id),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(channel_status_color(status)));

    let admin = self.client.admin_id();
    let customer = self
      .selected_claim()
      .map(|c| c.customer_name())
      .filter(|n| !n.is_empty())
      .unwrap_or_else(|| "Customer".to_string());

    let lines: Vec<Line> = if self.chat.selected().is_none() {
      vec![Line::styled(
        "Select a claim and press Enter to open its chat.",
        Style::default().fg(Color::DarkGray),
      )]
    } else if let Some(error) = self.chat.error() {
      vec![Line::styled(
        format!("Failed to load messages: {}", error),
        Style::default().fg(Color::Red),
      )]
    } else if self.chat.messages().is_empty() {
      let text = if self.chat.is_loading() {
        "Loading messages..."
      } else {
        "No messages"
      };
      vec![Line::styled(text, Style::default().fg(Color::DarkGray))]
    } else {
      self
        .chat
        .messages()
        .iter()
        .map(|m| message_line(m, admin, &customer))
        .collect()
    };

    // Keep the newest messages in view
    let inner_height = chunks[0].height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(inner_height) as u16;
    let messages = Paragraph::new(lines)
      .block(block)
      .wrap(Wrap { trim: false })
      .scroll((scroll, 0));
    frame.render_widget(messages, chunks[0]);

    let composing = self.focus == Focus::Composer;
    let (before, after) = self.composer.split_at_cursor();
    let input = if composing {
      Line::from(vec![
        Span::raw(before),
        Span::styled("_", Style::default().fg(Color::Yellow)),
        Span::raw(after),
      ])
    } else if self.chat.selected().is_some() {
      Line::styled("press i to write a message", Style::default().fg(Color::DarkGray))
    } else {
      Line::default()
    };
    let composer = Paragraph::new(input).block(
      Block::default()
        .title(" Message ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if composing { Color::Yellow } else { Color::DarkGray })),
    );
    frame.render_widget(composer, chunks[1]);
  }
}

fn message_line<'a>(message: &'a Message, admin_id: &str, customer: &str) -> Line<'a> {
  let (who, color) = if message.sender_id == admin_id {
    ("You".to_string(), Color::Cyan)
  } else {
    (customer.to_string(), Color::Magenta)
  };
  Line::from(vec![
    Span::styled(
      format!("{} ", message.created_at.format("%d/%m %H:%M")),
      Style::default().fg(Color::DarkGray),
    ),
    Span::styled(format!("{}: ", who), Style::default().fg(color).bold()),
    Span::raw(message.content.as_str()),
  ])
}

impl View for ClaimsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.focus == Focus::Composer {
      self.handle_composer_key(key);
      return ViewAction::None;
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(text)) => {
        self.filter.text = text;
        self.list_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Submitted) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Enter => self.open_selected(),
      KeyCode::Char('i') if self.chat.selected().is_some() => self.focus = Focus::Composer,
      KeyCode::Char('s') => self.cycle_status(),
      KeyCode::Char('f') => self.cycle_status_filter(),
      KeyCode::Char('r') => self.reload(),
      KeyCode::Esc => self.chat.deselect_channel(),
      KeyCode::Char('q') => return ViewAction::Quit,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
      .split(area);

    self.render_list(frame, chunks[0]);
    self.render_chat(frame, chunks[1]);
    self.search.render_overlay(frame, chunks[0]);
  }

  fn breadcrumb_label(&self) -> String {
    match self.chat.selected() {
      Some(id) => format!("Claims > chat #{}", id),
      None => "Claims".to_string(),
    }
  }

  fn tick(&mut self) {
    if self.threads.poll() == Polled::Updated {
      match self.threads.state() {
        QueryState::Success(_) => {
          let len = self.visible().len();
          ensure_valid_selection(&mut self.list_state, len);
          self.schedule_recency();
          if let Some(channel_id) = self.pending_channel.take() {
            self.focus_channel(channel_id);
          }
        }
        QueryState::Error(e) => self.notify(format!("Claims: {}", e)),
        _ => {}
      }
    }

    if self.status_update.poll() == Polled::Updated {
      match self.status_update.state() {
        QueryState::Success(_) => self.reload(),
        QueryState::Error(e) => self.notify(format!("Status update failed: {}", e)),
        _ => {}
      }
    }

    self.chat.poll();
  }

  fn on_channel_event(&mut self, event: &ChannelEvent) {
    self.chat.handle_event(event);
    if matches!(event, ChannelEvent::Change { .. }) {
      self.schedule_recency();
    }
  }

  fn is_capturing_input(&self) -> bool {
    self.focus == Focus::Composer || self.search.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    if self.focus == Focus::Composer {
      return vec![
        ShortcutInfo::new("Enter", "send").with_priority(10),
        ShortcutInfo::new("Esc", "done").with_priority(20),
      ];
    }
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("Enter", "chat").with_priority(30),
      ShortcutInfo::new("i", "write").with_priority(40),
      ShortcutInfo::new("s", "status").with_priority(50),
      ShortcutInfo::new("f", "filter").with_priority(60),
      ShortcutInfo::new("r", "reload").with_priority(70),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::testing::{FakeRowApi, FakeTransport, TransportCall};
  use crate::dashboard::DashboardSettings;
  use crossterm::event::KeyModifiers;
  use serde_json::{json, Value};
  use tokio::sync::mpsc;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn claim_rows() -> Vec<Value> {
    vec![
      json!({"claim_id": 1, "order_id": 101, "channel_id": 10, "status": "OPEN_UNPROCESSED",
             "created_at": "2024-01-05T08:00:00+00:00",
             "public_profile": {"first_name": "Ada", "last_name": "Lovelace"}}),
      json!({"claim_id": 2, "order_id": 102, "channel_id": 20, "status": "RESOLVED",
             "created_at": "2024-01-05T09:00:00+00:00"}),
    ]
  }

  struct Harness {
    view: ClaimsView,
    api: Arc<FakeRowApi>,
    transport: Arc<FakeTransport>,
    rx: mpsc::UnboundedReceiver<Event>,
  }

  fn harness() -> Harness {
    let api = FakeRowApi::with_responder(|query| {
      if query.table == "claim" {
        claim_rows()
      } else {
        Vec::new()
      }
    });
    let transport = FakeTransport::new();
    let registry = Arc::new(ChannelRegistry::new(transport.clone()));
    let settings = DashboardSettings {
      admin_id: "admin".to_string(),
      ..DashboardSettings::default()
    };
    let client = DashboardClient::new(api.clone(), settings);
    let (tx, rx) = mpsc::unbounded_channel();
    let view = ClaimsView::new(client, registry, "public", tx, Duration::from_millis(500));
    Harness {
      view,
      api,
      transport,
      rx,
    }
  }

  async fn load(h: &mut Harness) {
    h.view.reload();
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.view.tick();
  }

  #[tokio::test(start_paused = true)]
  async fn test_list_follows_last_message_recency() {
    let mut h = harness();
    load(&mut h).await;

    // Newest claim first until last messages arrive
    let ids: Vec<i64> = h.view.visible().iter().map(|c| c.claim_id).collect();
    assert_eq!(ids, vec![2, 1]);

    let mut index = HashMap::new();
    index.insert(
      10,
      LastMessageInfo {
        message: "where is my refund".to_string(),
        relative_time: "just now".to_string(),
        timestamp: Some(chrono::Utc::now()),
      },
    );
    h.view.set_last_messages(index);
    let ids: Vec<i64> = h.view.visible().iter().map(|c| c.claim_id).collect();
    assert_eq!(ids, vec![1, 2]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_recency_refresh_is_debounced() {
    let mut h = harness();
    load(&mut h).await;
    tokio::time::sleep(Duration::from_millis(600)).await;
    while h.rx.try_recv().is_ok() {}
    let before = h.api.selects().len();

    let event = ChannelEvent::Change {
      key: crate::sync::ChannelKey::new("notifications", "bus"),
      change: crate::backend::ChangeEvent {
        kind: crate::backend::ChangeKind::Insert,
        new: json!({}),
        old: json!({}),
      },
    };
    for _ in 0..5 {
      h.view.on_channel_event(&event);
    }
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(h.api.selects().len(), before + 1);
    assert!(matches!(h.rx.try_recv(), Ok(Event::LastMessages(_))));
  }

  #[tokio::test(start_paused = true)]
  async fn test_enter_opens_chat_and_switching_closes_previous() {
    let mut h = harness();
    load(&mut h).await;

    h.view.handle_key(key(KeyCode::Enter));
    h.view.handle_key(key(KeyCode::Char('j')));
    h.view.handle_key(key(KeyCode::Enter));

    assert_eq!(
      h.transport.calls(),
      vec![
        TransportCall::Subscribe("message_chat_20".to_string()),
        TransportCall::Unsubscribe("message_chat_20".to_string()),
        TransportCall::Subscribe("message_chat_10".to_string()),
      ]
    );
    assert_eq!(h.view.breadcrumb_label(), "Claims > chat #10");
  }

  #[tokio::test(start_paused = true)]
  async fn test_compose_sends_without_local_echo() {
    let mut h = harness();
    load(&mut h).await;
    h.view.handle_key(key(KeyCode::Enter));
    h.view.handle_key(key(KeyCode::Char('i')));
    assert!(h.view.is_capturing_input());
    for c in "on it".chars() {
      h.view.handle_key(key(KeyCode::Char(c)));
    }
    h.view.handle_key(key(KeyCode::Enter));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let inserts = h.api.inserts();
    assert_eq!(inserts.len(), 1);
    assert_eq!(inserts[0].1["message"], "on it");
    assert_eq!(inserts[0].1["sender_id"], "admin");
    assert!(h.view.chat.messages().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_status_filter_cycles_through_workflow() {
    let mut h = harness();
    load(&mut h).await;

    h.view.handle_key(key(KeyCode::Char('f')));
    assert_eq!(h.view.filter.status, Some(ClaimStatus::OpenUnprocessed));
    assert_eq!(h.view.visible().len(), 1);
    for _ in 0..4 {
      h.view.handle_key(key(KeyCode::Char('f')));
    }
    assert_eq!(h.view.filter.status, None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_focus_channel_waits_for_threads() {
    let mut h = harness();
    h.view.focus_channel(10);
    assert!(h.transport.calls().is_empty());

    load(&mut h).await;
    assert_eq!(
      h.transport.calls(),
      vec![TransportCall::Subscribe("message_chat_10".to_string())]
    );
  }
}
