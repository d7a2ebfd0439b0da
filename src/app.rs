use crate::backend::ChannelStatus;
use crate::cache::DateRange;
use crate::commands::{self, AppCommand};
use crate::config::Config;
use crate::dashboard::{open_bus, DashboardClient, NOTIFICATION_SCOPE};
use crate::event::{Event, EventHandler, EventSender};
use crate::query::{Polled, Query, QueryState};
use crate::sync::{ChannelEvent, ChannelRegistry, CHAT_SCOPE};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::HeaderInfo;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{AnalyticsView, ClaimsView, NotificationsView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);
const NOTICE_TTL: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
  Claims,
  Analytics,
  Notifications,
}

/// Transient message for the status bar
struct Notice {
  text: String,
  shown_at: Instant,
}

/// Main application state
pub struct App {
  config: Config,
  client: DashboardClient,
  registry: Arc<ChannelRegistry>,
  tx: EventSender,

  screen: Screen,
  claims: ClaimsView,
  analytics: AnalyticsView,
  notifications: NotificationsView,

  command: CommandInput,
  notice: Option<Notice>,

  /// Claim channels the notification bus listens to
  bus_channels: Query<u64, Vec<i64>>,
  bus_loads: u64,

  should_quit: bool,
}

impl App {
  pub fn new(
    config: Config,
    client: DashboardClient,
    registry: Arc<ChannelRegistry>,
    tx: EventSender,
    range: DateRange,
  ) -> Self {
    let recency_delay = Duration::from_millis(config.realtime.recency_debounce_ms);
    let claims = ClaimsView::new(
      client.clone(),
      Arc::clone(&registry),
      &config.backend.schema,
      tx.clone(),
      recency_delay,
    );
    let analytics = AnalyticsView::new(client.clone(), tx.clone(), range);
    let notifications =
      NotificationsView::new(client.clone(), tx.clone(), config.notifications.history_limit);

    Self {
      config,
      client,
      registry,
      tx,
      screen: Screen::Claims,
      claims,
      analytics,
      notifications,
      command: CommandInput::new(),
      notice: None,
      bus_channels: Query::new(),
      bus_loads: 0,
      should_quit: false,
    }
  }

  pub async fn run(&mut self, mut events: EventHandler) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    events.start(TICK_RATE);
    self.load_initial_data();

    let result = self.event_loop(&mut terminal, &mut events).await;

    self.registry.close_all();

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>, events: &mut EventHandler) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn load_initial_data(&mut self) {
    info!(range = %self.analytics.range(), "loading initial data");
    self.claims.reload();
    self.analytics.reload();
    self.notifications.reload();
    self.reload_bus();
  }

  fn reload_bus(&mut self) {
    self.bus_loads += 1;
    let client = self.client.clone();
    self.bus_channels.load(self.bus_loads, async move {
      client.claim_channels().await.map_err(|e| e.to_string())
    });
  }

  fn open_bus(&mut self, channel_ids: &[i64]) {
    let tx = self.tx.clone();
    let opened = open_bus(
      &self.registry,
      &self.config.backend.schema,
      channel_ids,
      move |event: ChannelEvent| {
        let _ = tx.send(Event::Channel(event));
      },
    );
    if let Err(e) = opened {
      warn!(error = %e, "notification bus unavailable");
      self.show_notice(format!("Notifications offline: {}", e));
    }
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      Event::Channel(event) => {
        self.claims.on_channel_event(&event);
        self.notifications.on_channel_event(&event);
        if self.screen == Screen::Notifications {
          self.notifications.mark_read();
        }
      }
      Event::LastMessages(index) => self.claims.set_last_messages(index),
      Event::Error(msg) => self.show_notice(msg),
    }
  }

  fn tick(&mut self) {
    self.claims.tick();
    self.analytics.tick();
    self.notifications.tick();

    if self.bus_channels.poll() == Polled::Updated {
      match self.bus_channels.state() {
        QueryState::Success(ids) => {
          let ids = ids.clone();
          self.open_bus(&ids);
        }
        QueryState::Error(e) => {
          let msg = format!("Claim channels: {}", e);
          self.show_notice(msg);
        }
        _ => {}
      }
    }

    if self
      .notice
      .as_ref()
      .is_some_and(|n| n.shown_at.elapsed() > NOTICE_TTL)
    {
      self.notice = None;
    }
  }

  fn show_notice(&mut self, text: String) {
    warn!(%text, "notice");
    self.notice = Some(Notice {
      text,
      shown_at: Instant::now(),
    });
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let capturing = self.active_view().is_capturing_input();
    if !capturing || self.command.is_active() {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(line)) => {
          self.execute_command(&line);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    if !capturing {
      let screen = match key.code {
        KeyCode::Char('1') => Some(Screen::Claims),
        KeyCode::Char('2') => Some(Screen::Analytics),
        KeyCode::Char('3') => Some(Screen::Notifications),
        _ => None,
      };
      if let Some(screen) = screen {
        self.switch_to(screen);
        return;
      }
    }

    let action = self.active_view_mut().handle_key(key);
    self.apply_action(action);
  }

  fn apply_action(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::OpenChannel(channel_id) => {
        self.switch_to(Screen::Claims);
        self.claims.focus_channel(channel_id);
      }
      ViewAction::Quit => self.should_quit = true,
    }
  }

  fn switch_to(&mut self, screen: Screen) {
    self.screen = screen;
    if screen == Screen::Notifications {
      self.notifications.mark_read();
    }
  }

  fn execute_command(&mut self, line: &str) {
    match commands::parse(line) {
      Ok(AppCommand::Claims) => self.switch_to(Screen::Claims),
      Ok(AppCommand::Analytics) => self.switch_to(Screen::Analytics),
      Ok(AppCommand::Notifications) => self.switch_to(Screen::Notifications),
      Ok(AppCommand::Range(range)) => {
        self.analytics.set_range(range);
        self.switch_to(Screen::Analytics);
      }
      Ok(AppCommand::Refresh) => {
        info!("refresh requested, dropping caches");
        self.client.invalidate();
        self.load_initial_data();
      }
      Ok(AppCommand::Quit) => self.should_quit = true,
      Err(e) => self.show_notice(e),
    }
  }

  // Accessors for UI rendering
  pub fn active_view(&self) -> &dyn View {
    match self.screen {
      Screen::Claims => &self.claims,
      Screen::Analytics => &self.analytics,
      Screen::Notifications => &self.notifications,
    }
  }

  pub fn active_view_mut(&mut self) -> &mut dyn View {
    match self.screen {
      Screen::Claims => &mut self.claims,
      Screen::Analytics => &mut self.analytics,
      Screen::Notifications => &mut self.notifications,
    }
  }

  pub fn command(&self) -> &CommandInput {
    &self.command
  }

  pub fn notice(&self) -> Option<&str> {
    self.notice.as_ref().map(|n| n.text.as_str())
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    vec![
      self.config.display_title(),
      self.active_view().breadcrumb_label(),
    ]
  }

  pub fn header_info(&self) -> HeaderInfo<'_> {
    HeaderInfo {
      title: "claimdesk",
      backend_url: &self.config.backend.url,
      unread: self.notifications.unread(),
      chat: self.registry.status(CHAT_SCOPE),
      bus: self.registry.status(NOTIFICATION_SCOPE),
    }
  }

  /// Realtime state of the selected chat, for tests and the header
  pub fn chat_status(&self) -> Option<ChannelStatus> {
    self.registry.status(CHAT_SCOPE)
  }
}
