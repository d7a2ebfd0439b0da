use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::backend::ChannelStatus;

use super::utils::channel_status_color;

/// What the header shows besides the title
#[derive(Debug, Clone, Default)]
pub struct HeaderInfo<'a> {
  pub title: &'a str,
  pub backend_url: &'a str,
  pub unread: usize,
  /// Selected claim's chat channel
  pub chat: Option<ChannelStatus>,
  /// Notification bus
  pub bus: Option<ChannelStatus>,
}

/// Draw the header bar with title, backend host, bell and realtime state
pub fn draw_header(frame: &mut Frame, area: Rect, info: &HeaderInfo) {
  let domain = extract_domain(info.backend_url);

  let bell_style = if info.unread > 0 {
    Style::default().fg(Color::Black).bg(Color::Yellow).bold()
  } else {
    Style::default().fg(Color::DarkGray)
  };

  let mut spans = vec![
    Span::styled(format!(" {} ", info.title), Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", domain), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" bell {} ", info.unread), bell_style),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
  ];
  spans.extend(indicator("live", info.bus.as_ref()));
  spans.extend(indicator("chat", info.chat.as_ref()));

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Dot plus label; errors are spelled out but never block the screen
fn indicator<'a>(label: &'a str, status: Option<&ChannelStatus>) -> Vec<Span<'a>> {
  let color = channel_status_color(status);
  let text = match status {
    Some(ChannelStatus::Error(reason)) => format!(" {} ({}) ", label, reason),
    Some(status) => format!(" {} {} ", label, status.label()),
    None => format!(" {} off ", label),
  };
  vec![
    Span::styled(" ●", Style::default().fg(color)),
    Span::styled(text, Style::default().fg(color)),
  ]
}

/// Extract the host from the backend URL
fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_domain() {
    assert_eq!(
      extract_domain("https://abcd.supabase.co"),
      "abcd.supabase.co"
    );
    assert_eq!(
      extract_domain("https://api.example.com/rest/v1"),
      "api.example.com"
    );
    assert_eq!(extract_domain("http://localhost:54321"), "localhost:54321");
  }

  #[test]
  fn test_indicator_spells_out_errors() {
    let spans = indicator("chat", Some(&ChannelStatus::Error("timeout".to_string())));
    assert_eq!(spans[1].content, " chat (timeout) ");
    let spans = indicator("live", None);
    assert_eq!(spans[1].content, " live off ");
  }
}
