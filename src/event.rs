use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::sync::{ChannelEvent, LastMessageInfo};

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh and query polling
  Tick,
  /// Realtime change or status from the channel registry
  Channel(ChannelEvent),
  /// Fresh last-message index for the claim list
  LastMessages(HashMap<i64, LastMessageInfo>),
  /// Transient failure to show in the status bar
  Error(String),
}

pub type EventSender = mpsc::UnboundedSender<Event>;

/// Event handler that produces events from terminal input and a tick timer.
/// Background tasks push their own events through [`EventHandler::sender`].
pub struct EventHandler {
  tx: EventSender,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self { tx, rx }
  }

  /// Start reading the terminal, ticking every `tick_rate` when idle.
  pub fn start(&self, tick_rate: Duration) {
    let tx = self.tx.clone();

    // crossterm polling blocks, so it gets its own thread
    tokio::task::spawn_blocking(move || loop {
      if event::poll(tick_rate).unwrap_or(false) {
        if let Ok(CrosstermEvent::Key(key)) = event::read() {
          if key.kind == KeyEventKind::Press && tx.send(Event::Key(key)).is_err() {
            break;
          }
        }
      } else if tx.send(Event::Tick).is_err() {
        break;
      }
    });
  }

  pub fn sender(&self) -> EventSender {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

impl Default for EventHandler {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::ChannelStatus;
  use crate::sync::ChannelKey;

  #[tokio::test]
  async fn test_sender_feeds_next() {
    let mut events = EventHandler::new();
    let tx = events.sender();
    tx.send(Event::Channel(ChannelEvent::Status {
      key: ChannelKey::new("chat", 1),
      status: ChannelStatus::Subscribed,
    }))
    .unwrap();
    tx.send(Event::Error("boom".to_string())).unwrap();

    assert!(matches!(events.next().await, Some(Event::Channel(_))));
    assert!(matches!(events.next().await, Some(Event::Error(msg)) if msg == "boom"));
  }
}
