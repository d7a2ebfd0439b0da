pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::{ListState, Paragraph};

/// Keep a list selection inside `0..len`, selecting the first row when
/// nothing is selected.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(idx) if idx >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Breadcrumb and shortcuts
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  renderfns::draw_header(frame, chunks[0], &app.header_info());

  let breadcrumb = app.breadcrumb();
  let shortcuts = app.active_view().shortcuts();
  app.active_view_mut().render(frame, chunks[1]);
  app.command().render_overlay(frame, chunks[1]);

  renderfns::draw_footer(frame, chunks[2], &breadcrumb, &shortcuts);
  draw_status_bar(frame, chunks[3], app);
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match app.notice() {
    Some(notice) => (format!(" {}", notice), Style::default().fg(Color::Red)),
    None => (
      " 1:claims  2:analytics  3:notifications  Ctrl-C:quit".to_string(),
      Style::default().fg(Color::DarkGray),
    ),
  };

  frame.render_widget(Paragraph::new(content).style(style), area);
}
