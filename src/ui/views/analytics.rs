use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Sparkline, Table};

use crate::cache::{CacheSource, DateRange};
use crate::dashboard::analytics::SourceSeries;
use crate::dashboard::{load_analytics, AnalyticsSnapshot, DashboardClient};
use crate::event::{Event, EventSender};
use crate::query::{Polled, Query, QueryState};
use crate::ui::view::{ShortcutInfo, View, ViewAction};

/// Daily counts per source plus cache statistics for one date range
pub struct AnalyticsView {
  client: DashboardClient,
  tx: EventSender,
  range: DateRange,
  snapshot: Query<DateRange, AnalyticsSnapshot>,
}

impl AnalyticsView {
  pub fn new(client: DashboardClient, tx: EventSender, range: DateRange) -> Self {
    Self {
      client,
      tx,
      range,
      snapshot: Query::new(),
    }
  }

  pub fn range(&self) -> DateRange {
    self.range
  }

  pub fn set_range(&mut self, range: DateRange) {
    self.range = range;
    self.reload();
  }

  pub fn reload(&mut self) {
    let client = self.client.clone();
    let range = self.range;
    self.snapshot.load(range, async move {
      load_analytics(&client, range).await.map_err(|e| e.to_string())
    });
  }

  /// Move the window by its own length, backwards or forwards.
  fn page(&mut self, forward: bool) {
    let span = self.range.days().count() as i64;
    self.set_range(self.range.shifted(if forward { span } else { -span }));
  }

  fn render_series(&self, frame: &mut Frame, area: Rect, series: &SourceSeries) {
    let data: Vec<u64> = series.days.iter().map(|d| d.count as u64).collect();
    let peak = data.iter().copied().max().unwrap_or(0);
    let origin = match series.served_from {
      CacheSource::Cache => "cache",
      CacheSource::Network => "network",
    };
    let title = format!(
      " {} · {} total · peak {}/day · {} ",
      series.source.label(),
      series.total,
      peak,
      origin
    );
    let sparkline = Sparkline::default()
      .block(Block::default().title(title).borders(Borders::ALL))
      .data(&data)
      .style(Style::default().fg(Color::Cyan));
    frame.render_widget(sparkline, area);
  }

  fn render_snapshot(&self, frame: &mut Frame, area: Rect, snapshot: &AnalyticsSnapshot) {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Percentage(20),
        Constraint::Percentage(20),
        Constraint::Percentage(20),
        Constraint::Min(6),
      ])
      .split(area);

    for (series, area) in snapshot.series.iter().zip(rows.iter()) {
      self.render_series(frame, *area, series);
    }

    let bottom = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
      .split(rows[3]);

    let status_rows: Vec<Row> = snapshot
      .order_statuses
      .iter()
      .map(|(status, count)| Row::new(vec![Cell::from(status.clone()), Cell::from(count.to_string())]))
      .collect();
    let statuses = Table::new(status_rows, [Constraint::Min(20), Constraint::Length(8)])
      .header(Row::new(vec!["Order status", "Count"]).style(Style::default().fg(Color::Yellow)))
      .block(Block::default().title(" Orders by status ").borders(Borders::ALL));
    frame.render_widget(statuses, bottom[0]);

    let stat_rows: Vec<Row> = snapshot
      .stats
      .iter()
      .map(|(source, stats)| {
        Row::new(vec![
          Cell::from(source.label()),
          Cell::from(stats.hits.to_string()),
          Cell::from(stats.misses.to_string()),
          Cell::from(stats.failures.to_string()),
          Cell::from(format!("{:.0}%", stats.hit_rate() * 100.0)),
        ])
      })
      .collect();
    let stats = Table::new(
      stat_rows,
      [
        Constraint::Min(10),
        Constraint::Length(6),
        Constraint::Length(7),
        Constraint::Length(9),
        Constraint::Length(6),
      ],
    )
    .header(
      Row::new(vec!["Cache", "Hits", "Misses", "Failures", "Rate"]).style(Style::default().fg(Color::Yellow)),
    )
    .block(Block::default().title(" Cache ").borders(Borders::ALL));
    frame.render_widget(stats, bottom[1]);
  }
}

impl View for AnalyticsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('[') | KeyCode::Left => self.page(false),
      KeyCode::Char(']') | KeyCode::Right => self.page(true),
      KeyCode::Char('r') => self.reload(),
      KeyCode::Char('R') => {
        self.client.invalidate();
        self.reload();
      }
      KeyCode::Char('q') => return ViewAction::Quit,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(format!(" Analytics {} ", self.range))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match self.snapshot.state() {
      QueryState::Success(snapshot) => self.render_snapshot(frame, inner, snapshot),
      QueryState::Error(e) => {
        let text = Paragraph::new(format!("Failed to load analytics: {}\nPress r to retry.", e))
          .style(Style::default().fg(Color::Red));
        frame.render_widget(text, inner);
      }
      QueryState::Loading | QueryState::Idle => {
        let text = Paragraph::new("Loading...").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(text, inner);
      }
    }
  }

  fn breadcrumb_label(&self) -> String {
    format!("Analytics [{}]", self.range)
  }

  fn tick(&mut self) {
    if self.snapshot.poll() == Polled::Updated {
      if let Some(e) = self.snapshot.error() {
        let _ = self.tx.send(Event::Error(format!("Analytics: {}", e)));
      }
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("[ ]", "prev/next range").with_priority(20),
      ShortcutInfo::new("r", "reload").with_priority(30),
      ShortcutInfo::new("R", "drop cache").with_priority(40),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::testing::FakeRowApi;
  use crate::dashboard::{DashboardSettings, DataSource};
  use crossterm::event::KeyModifiers;
  use serde_json::json;
  use std::time::Duration;
  use tokio::sync::mpsc;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[tokio::test(start_paused = true)]
  async fn test_paging_moves_by_window_length() {
    let api = FakeRowApi::with_responder(|query| {
      if query.table == "order" {
        vec![json!({"id": 1, "status": "PAID", "created_at": "2024-01-03T10:00:00+00:00"})]
      } else {
        Vec::new()
      }
    });
    let client = DashboardClient::new(api.clone(), DashboardSettings::default());
    let (tx, _rx) = mpsc::unbounded_channel();
    let range = DateRange::parse("2024-01-01", "2024-01-07").unwrap();
    let mut view = AnalyticsView::new(client, tx, range);

    view.reload();
    tokio::time::sleep(Duration::from_millis(10)).await;
    view.tick();
    let snapshot = view.snapshot.data().unwrap();
    assert_eq!(snapshot.series[0].source, DataSource::Orders);
    assert_eq!(snapshot.series[0].total, 1);
    assert_eq!(snapshot.series[0].days.len(), 7);

    view.handle_key(key(KeyCode::Char(']')));
    assert_eq!(view.range().to_string(), "2024-01-08..2024-01-14");
    view.handle_key(key(KeyCode::Char('[')));
    view.handle_key(key(KeyCode::Char('[')));
    assert_eq!(view.range().to_string(), "2023-12-25..2023-12-31");
  }
}
