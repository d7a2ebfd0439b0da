//! Realtime change feed over the hosted channel protocol.
//!
//! [`RealtimeTransport`] is the narrow contract the sync layer consumes:
//! subscribe a topic to row changes and get status and change signals back
//! through a callback. [`RealtimeClient`] implements it with one websocket
//! worker task that multiplexes every joined topic, keeps the socket alive
//! with heartbeats, and re-joins live topics after a reconnect.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::config::{Config, RealtimeConfig};

use super::error::SubscriptionError;

/// Every channel topic is namespaced under this prefix on the wire.
const TOPIC_PREFIX: &str = "realtime:";
const PROTOCOL_VSN: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
  Insert,
  Update,
  Delete,
}

impl ChangeKind {
  fn parse(raw: &str) -> Option<Self> {
    match raw {
      "INSERT" => Some(ChangeKind::Insert),
      "UPDATE" => Some(ChangeKind::Update),
      "DELETE" => Some(ChangeKind::Delete),
      _ => None,
    }
  }
}

/// One row change. `new` is null for deletes; `old` carries at least the
/// primary key for updates and deletes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
  pub kind: ChangeKind,
  pub new: Value,
  pub old: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
  Connecting,
  Subscribed,
  Error(String),
  Closed,
}

impl ChannelStatus {
  pub fn label(&self) -> &'static str {
    match self {
      ChannelStatus::Connecting => "CONNECTING",
      ChannelStatus::Subscribed => "SUBSCRIBED",
      ChannelStatus::Error(_) => "ERROR",
      ChannelStatus::Closed => "CLOSED",
    }
  }
}

impl fmt::Display for ChannelStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ChannelStatus::Error(reason) => write!(f, "ERROR ({})", reason),
      other => f.write_str(other.label()),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
  Status(ChannelStatus),
  Change(ChangeEvent),
}

pub type SignalCallback = Arc<dyn Fn(ChannelSignal) + Send + Sync>;

/// Row predicate a subscription is scoped to. Event type is always `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
  pub schema: String,
  pub table: String,
  pub filter: Option<String>,
}

impl ChangeFilter {
  pub fn table(schema: &str, table: &str) -> Self {
    Self {
      schema: schema.to_string(),
      table: table.to_string(),
      filter: None,
    }
  }

  pub fn eq(mut self, column: &str, value: impl fmt::Display) -> Self {
    self.filter = Some(format!("{}=eq.{}", column, value));
    self
  }

  pub fn in_list<V: fmt::Display>(mut self, column: &str, values: &[V]) -> Self {
    let values: Vec<String> = values.iter().map(ToString::to_string).collect();
    self.filter = Some(format!("{}=in.({})", column, values.join(",")));
    self
  }

  fn join_config(&self) -> Value {
    let mut change = json!({
      "event": "*",
      "schema": self.schema,
      "table": self.table,
    });
    if let Some(filter) = &self.filter {
      change["filter"] = Value::String(filter.clone());
    }
    change
  }
}

/// Subscribe/unsubscribe are synchronous: they only enqueue work for the
/// transport, so callers can swap channels without yielding.
pub trait RealtimeTransport: Send + Sync {
  fn subscribe(
    &self,
    topic: &str,
    filter: &ChangeFilter,
    callback: SignalCallback,
  ) -> Result<(), SubscriptionError>;

  fn unsubscribe(&self, topic: &str);
}

enum Command {
  Join {
    topic: String,
    filter: ChangeFilter,
    callback: SignalCallback,
  },
  Leave {
    topic: String,
  },
}

/// Websocket-backed realtime transport
#[derive(Clone)]
pub struct RealtimeClient {
  commands: mpsc::UnboundedSender<Command>,
}

impl RealtimeClient {
  /// Start the socket worker. Must be called inside a tokio runtime.
  ///
  /// The socket is only opened once the first topic is joined.
  pub fn spawn(config: &Config) -> Result<Self> {
    let key = Config::get_service_key()?;
    let url = websocket_url(&config.backend.url, &key)?;
    let (tx, rx) = mpsc::unbounded_channel();

    let worker = Worker {
      url,
      access_token: key,
      settings: config.realtime.clone(),
      commands: rx,
      channels: HashMap::new(),
      next_ref: 0,
    };
    tokio::spawn(worker.run());

    Ok(Self { commands: tx })
  }
}

impl RealtimeTransport for RealtimeClient {
  fn subscribe(
    &self,
    topic: &str,
    filter: &ChangeFilter,
    callback: SignalCallback,
  ) -> Result<(), SubscriptionError> {
    self
      .commands
      .send(Command::Join {
        topic: topic.to_string(),
        filter: filter.clone(),
        callback,
      })
      .map_err(|_| SubscriptionError::TransportClosed)
  }

  fn unsubscribe(&self, topic: &str) {
    let _ = self.commands.send(Command::Leave {
      topic: topic.to_string(),
    });
  }
}

/// Realtime endpoint for a project URL: `wss://host/realtime/v1/websocket`.
pub fn websocket_url(project_url: &str, api_key: &str) -> Result<Url> {
  let mut url = Url::parse(project_url.trim())
    .map_err(|e| eyre!("Invalid backend url '{}': {}", project_url, e))?;
  let scheme = match url.scheme() {
    "https" | "wss" => "wss",
    "http" | "ws" => "ws",
    other => return Err(eyre!("Unsupported backend url scheme '{}'", other)),
  };
  url
    .set_scheme(scheme)
    .map_err(|_| eyre!("Cannot use scheme {} for {}", scheme, project_url))?;

  let path = format!("{}/realtime/v1/websocket", url.path().trim_end_matches('/'));
  url.set_path(&path);
  url
    .query_pairs_mut()
    .clear()
    .append_pair("apikey", api_key)
    .append_pair("vsn", PROTOCOL_VSN);
  Ok(url)
}

/// Delay before reconnect attempt `attempt` (1-based): doubles from the base
/// delay and is capped.
fn reconnect_delay(settings: &RealtimeConfig, attempt: u32) -> Duration {
  let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
  let ms = settings
    .reconnect_delay_ms
    .saturating_mul(factor)
    .min(settings.reconnect_max_delay_ms);
  Duration::from_millis(ms)
}

#[derive(Serialize)]
struct OutFrame<'a> {
  topic: &'a str,
  event: &'a str,
  payload: Value,
  #[serde(rename = "ref")]
  reference: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  join_ref: Option<String>,
}

#[derive(Deserialize)]
struct InFrame {
  topic: String,
  event: String,
  #[serde(default)]
  payload: Value,
  #[serde(rename = "ref", default)]
  reference: Option<String>,
  #[serde(default)]
  join_ref: Option<String>,
}

/// What an inbound frame means for the channel it is addressed to.
#[derive(Debug, PartialEq)]
enum Inbound {
  Reply {
    reference: Option<String>,
    ok: bool,
    reason: String,
  },
  System {
    ok: bool,
    message: String,
  },
  Change(ChangeEvent),
  /// `join_ref` names the join the frame belongs to, when the server says
  ChannelError { join_ref: Option<String> },
  ChannelClosed { join_ref: Option<String> },
  Ignored,
}

/// Split a text frame into its wire topic and meaning. `None` for frames
/// that are not valid protocol messages.
fn decode_frame(text: &str) -> Option<(String, Inbound)> {
  let frame: InFrame = serde_json::from_str(text).ok()?;
  let payload = &frame.payload;
  let join_ref = frame.join_ref.clone().or_else(|| frame.reference.clone());
  let inbound = match frame.event.as_str() {
    "phx_reply" => Inbound::Reply {
      reference: frame.reference.clone(),
      ok: payload["status"] == "ok",
      reason: payload["response"]["reason"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| payload["response"].to_string()),
    },
    "system" => Inbound::System {
      ok: payload["status"] == "ok",
      message: payload["message"].as_str().unwrap_or_default().to_string(),
    },
    "postgres_changes" => {
      let data = &payload["data"];
      match data["type"].as_str().and_then(ChangeKind::parse) {
        Some(kind) => Inbound::Change(ChangeEvent {
          kind,
          new: data.get("record").cloned().unwrap_or(Value::Null),
          old: data.get("old_record").cloned().unwrap_or(Value::Null),
        }),
        None => Inbound::Ignored,
      }
    }
    "phx_error" => Inbound::ChannelError { join_ref },
    "phx_close" => Inbound::ChannelClosed { join_ref },
    _ => Inbound::Ignored,
  };
  Some((frame.topic, inbound))
}

struct JoinedChannel {
  topic: String,
  filter: ChangeFilter,
  callback: SignalCallback,
  join_ref: String,
}

impl JoinedChannel {
  fn signal(&self, signal: ChannelSignal) {
    (self.callback)(signal);
  }

  /// False for control frames left over from an earlier join of the topic.
  fn owns(&self, join_ref: Option<&str>) -> bool {
    join_ref.map_or(true, |r| r == self.join_ref)
  }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum SessionEnd {
  /// Every transport handle was dropped.
  Shutdown,
  Dropped(String),
}

struct Worker {
  url: Url,
  access_token: String,
  settings: RealtimeConfig,
  commands: mpsc::UnboundedReceiver<Command>,
  /// Keyed by wire topic (`realtime:<topic>`).
  channels: HashMap<String, JoinedChannel>,
  next_ref: u64,
}

impl Worker {
  async fn run(mut self) {
    let mut attempt = 0u32;

    loop {
      if self.channels.is_empty() {
        // Nothing to listen to: stay offline until someone joins
        match self.commands.recv().await {
          Some(command) => self.apply_offline(command),
          None => break,
        }
        continue;
      }

      if attempt > 0 {
        let delay = reconnect_delay(&self.settings, attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "waiting before reconnect");
        tokio::time::sleep(delay).await;
        self.drain_offline();
        if self.channels.is_empty() {
          attempt = 0;
          continue;
        }
      }

      info!(host = self.url.host_str().unwrap_or_default(), "connecting to realtime");
      let failure = match connect_async(self.url.as_str()).await {
        Ok((socket, _)) => {
          attempt = 0;
          match self.session(socket).await {
            SessionEnd::Shutdown => break,
            SessionEnd::Dropped(reason) => reason,
          }
        }
        Err(e) => format!("connection failed: {}", e),
      };

      warn!(error = %failure, "realtime connection lost");
      self.broadcast(ChannelStatus::Error(failure));

      attempt += 1;
      if attempt > self.settings.reconnect_retries {
        error!(
          retries = self.settings.reconnect_retries,
          "realtime reconnect budget exhausted, dropping channels"
        );
        self.channels.clear();
        attempt = 0;
      }
    }

    info!("realtime worker stopped");
  }

  fn broadcast(&self, status: ChannelStatus) {
    for channel in self.channels.values() {
      channel.signal(ChannelSignal::Status(status.clone()));
    }
  }

  fn make_ref(&mut self) -> String {
    self.next_ref += 1;
    self.next_ref.to_string()
  }

  /// Register or forget a topic while no socket is open.
  fn apply_offline(&mut self, command: Command) {
    match command {
      Command::Join {
        topic,
        filter,
        callback,
      } => {
        let wire = format!("{}{}", TOPIC_PREFIX, topic);
        callback(ChannelSignal::Status(ChannelStatus::Connecting));
        self.channels.insert(
          wire,
          JoinedChannel {
            topic,
            filter,
            callback,
            join_ref: String::new(),
          },
        );
      }
      Command::Leave { topic } => {
        self.channels.remove(&format!("{}{}", TOPIC_PREFIX, topic));
      }
    }
  }

  fn drain_offline(&mut self) {
    while let Ok(command) = self.commands.try_recv() {
      self.apply_offline(command);
    }
  }

  fn frame(&mut self, topic: &str, event: &str, payload: Value, join_ref: Option<String>) -> String {
    let frame = OutFrame {
      topic,
      event,
      payload,
      reference: self.make_ref(),
      join_ref,
    };
    // A frame of plain strings and JSON values always serializes
    serde_json::to_string(&frame).unwrap_or_default()
  }

  fn join_frame(&mut self, wire: &str) -> Option<String> {
    let join_ref = self.make_ref();
    let channel = self.channels.get_mut(wire)?;
    channel.join_ref = join_ref.clone();
    let payload = json!({
      "config": {
        "broadcast": { "ack": false, "self": false },
        "presence": { "key": "" },
        "postgres_changes": [channel.filter.join_config()],
      },
      "access_token": self.access_token,
    });
    let frame = OutFrame {
      topic: wire,
      event: "phx_join",
      payload,
      reference: join_ref.clone(),
      join_ref: Some(join_ref),
    };
    serde_json::to_string(&frame).ok()
  }

  async fn session(&mut self, socket: Socket) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();
    info!(channels = self.channels.len(), "realtime connected");

    let wires: Vec<String> = self.channels.keys().cloned().collect();
    for wire in wires {
      if let Some(text) = self.join_frame(&wire) {
        if let Err(e) = sink.send(Message::Text(text)).await {
          return SessionEnd::Dropped(format!("join failed: {}", e));
        }
      }
    }

    let period = Duration::from_secs(self.settings.heartbeat_secs.max(1));
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
      tokio::select! {
        command = self.commands.recv() => {
          let outgoing = match command {
            None => {
              let _ = sink.close().await;
              return SessionEnd::Shutdown;
            }
            Some(Command::Join { topic, filter, callback }) => {
              let wire = format!("{}{}", TOPIC_PREFIX, topic);
              debug!(topic = %topic, "joining channel");
              callback(ChannelSignal::Status(ChannelStatus::Connecting));
              self.channels.insert(wire.clone(), JoinedChannel {
                topic,
                filter,
                callback,
                join_ref: String::new(),
              });
              self.join_frame(&wire)
            }
            Some(Command::Leave { topic }) => {
              let wire = format!("{}{}", TOPIC_PREFIX, topic);
              match self.channels.remove(&wire) {
                Some(channel) => {
                  debug!(topic = %topic, "leaving channel");
                  Some(self.frame(&wire, "phx_leave", json!({}), Some(channel.join_ref)))
                }
                None => None,
              }
            }
          };
          if let Some(text) = outgoing {
            if let Err(e) = sink.send(Message::Text(text)).await {
              return SessionEnd::Dropped(format!("send failed: {}", e));
            }
          }
        }

        _ = heartbeat.tick() => {
          trace!("heartbeat");
          let text = self.frame("phoenix", "heartbeat", json!({}), None);
          if let Err(e) = sink.send(Message::Text(text)).await {
            return SessionEnd::Dropped(format!("heartbeat failed: {}", e));
          }
        }

        message = stream.next() => {
          match message {
            Some(Ok(Message::Text(text))) => self.handle_frame(&text),
            Some(Ok(Message::Close(_))) | None => {
              return SessionEnd::Dropped("connection closed by server".to_string());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return SessionEnd::Dropped(format!("read error: {}", e)),
          }
        }
      }
    }
  }

  fn handle_frame(&mut self, text: &str) {
    let Some((wire, inbound)) = decode_frame(text) else {
      warn!("unparseable realtime frame");
      return;
    };
    let Some(channel) = self.channels.get(&wire) else {
      trace!(topic = %wire, "frame for unknown topic");
      return;
    };

    match inbound {
      Inbound::Reply { reference, ok, reason } => {
        if reference.as_deref() != Some(channel.join_ref.as_str()) {
          return;
        }
        if ok {
          info!(topic = %channel.topic, "channel subscribed");
          channel.signal(ChannelSignal::Status(ChannelStatus::Subscribed));
        } else {
          warn!(topic = %channel.topic, %reason, "channel join rejected");
          channel.signal(ChannelSignal::Status(ChannelStatus::Error(reason)));
        }
      }
      Inbound::System { ok, message } => {
        if ok {
          debug!(topic = %channel.topic, %message, "system ok");
          channel.signal(ChannelSignal::Status(ChannelStatus::Subscribed));
        } else {
          warn!(topic = %channel.topic, %message, "system error");
          channel.signal(ChannelSignal::Status(ChannelStatus::Error(message)));
        }
      }
      Inbound::Change(change) => {
        trace!(topic = %channel.topic, kind = ?change.kind, "row change");
        channel.signal(ChannelSignal::Change(change));
      }
      Inbound::ChannelError { join_ref } => {
        if !channel.owns(join_ref.as_deref()) {
          debug!(topic = %channel.topic, ?join_ref, "error for a previous join");
          return;
        }
        warn!(topic = %channel.topic, "channel error");
        channel.signal(ChannelSignal::Status(ChannelStatus::Error(
          "channel error".to_string(),
        )));
      }
      Inbound::ChannelClosed { join_ref } => {
        if !channel.owns(join_ref.as_deref()) {
          debug!(topic = %channel.topic, ?join_ref, "close for a previous join");
          return;
        }
        info!(topic = %channel.topic, "channel closed by server");
        channel.signal(ChannelSignal::Status(ChannelStatus::Closed));
        self.channels.remove(&wire);
      }
      Inbound::Ignored => {}
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_websocket_url_from_project_url() {
    let url = websocket_url("https://abc.example.co", "anon-key").unwrap();
    assert_eq!(
      url.as_str(),
      "wss://abc.example.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
    );

    let local = websocket_url("http://localhost:54321/", "k").unwrap();
    assert_eq!(
      local.as_str(),
      "ws://localhost:54321/realtime/v1/websocket?apikey=k&vsn=1.0.0"
    );

    assert!(websocket_url("ftp://example.com", "k").is_err());
  }

  #[test]
  fn test_change_filter_join_config() {
    let filter = ChangeFilter::table("public", "message_chat").eq("channel_id", 42);
    assert_eq!(
      filter.join_config(),
      json!({
        "event": "*",
        "schema": "public",
        "table": "message_chat",
        "filter": "channel_id=eq.42",
      })
    );

    let bus = ChangeFilter::table("public", "message_chat").in_list("channel_id", &[1, 2, 3]);
    assert_eq!(bus.filter.as_deref(), Some("channel_id=in.(1,2,3)"));
  }

  #[test]
  fn test_decode_postgres_change() {
    let text = r#"{
      "topic": "realtime:message_chat_42",
      "event": "postgres_changes",
      "ref": null,
      "payload": {
        "ids": [1],
        "data": {
          "type": "DELETE",
          "schema": "public",
          "table": "message_chat",
          "record": null,
          "old_record": {"id": 9}
        }
      }
    }"#;
    let (topic, inbound) = decode_frame(text).unwrap();
    assert_eq!(topic, "realtime:message_chat_42");
    assert_eq!(
      inbound,
      Inbound::Change(ChangeEvent {
        kind: ChangeKind::Delete,
        new: Value::Null,
        old: json!({"id": 9}),
      })
    );
  }

  #[test]
  fn test_decode_replies_and_control_frames() {
    let ok = r#"{"topic":"realtime:t","event":"phx_reply","ref":"3","payload":{"status":"ok","response":{}}}"#;
    assert_eq!(
      decode_frame(ok).unwrap().1,
      Inbound::Reply {
        reference: Some("3".to_string()),
        ok: true,
        reason: "{}".to_string(),
      }
    );

    let rejected = r#"{"topic":"realtime:t","event":"phx_reply","ref":"4","payload":{"status":"error","response":{"reason":"unmatched topic"}}}"#;
    match decode_frame(rejected).unwrap().1 {
      Inbound::Reply { ok, reason, .. } => {
        assert!(!ok);
        assert_eq!(reason, "unmatched topic");
      }
      other => panic!("unexpected {:?}", other),
    }

    let closed = r#"{"topic":"realtime:t","event":"phx_close","ref":null,"payload":{}}"#;
    assert_eq!(
      decode_frame(closed).unwrap().1,
      Inbound::ChannelClosed { join_ref: None }
    );

    let old_close = r#"{"topic":"realtime:t","event":"phx_close","ref":"1","join_ref":"1","payload":{}}"#;
    assert_eq!(
      decode_frame(old_close).unwrap().1,
      Inbound::ChannelClosed {
        join_ref: Some("1".to_string())
      }
    );

    let presence = r#"{"topic":"realtime:t","event":"presence_state","payload":{}}"#;
    assert_eq!(decode_frame(presence).unwrap().1, Inbound::Ignored);

    assert!(decode_frame("not json").is_none());
  }

  fn offline_worker() -> Worker {
    let (_tx, rx) = mpsc::unbounded_channel();
    Worker {
      url: websocket_url("https://abc.example.co", "k").unwrap(),
      access_token: "k".to_string(),
      settings: RealtimeConfig::default(),
      commands: rx,
      channels: HashMap::new(),
      next_ref: 0,
    }
  }

  fn recording_callback() -> (SignalCallback, Arc<std::sync::Mutex<Vec<ChannelSignal>>>) {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: SignalCallback = Arc::new(move |signal| sink.lock().unwrap().push(signal));
    (callback, seen)
  }

  fn join_notifications(worker: &mut Worker, callback: SignalCallback) -> String {
    worker.apply_offline(Command::Join {
      topic: "notifications".to_string(),
      filter: ChangeFilter::table("public", "message_chat"),
      callback,
    });
    worker.join_frame("realtime:notifications").unwrap();
    worker.channels["realtime:notifications"].join_ref.clone()
  }

  fn control_frame(event: &str, join_ref: &str) -> String {
    format!(
      r#"{{"topic":"realtime:notifications","event":"{}","ref":"{}","join_ref":"{}","payload":{{}}}}"#,
      event, join_ref, join_ref
    )
  }

  #[test]
  fn test_close_of_previous_join_keeps_rejoined_topic() {
    let mut worker = offline_worker();
    let (old_callback, _) = recording_callback();
    let old_ref = join_notifications(&mut worker, old_callback);

    worker.apply_offline(Command::Leave {
      topic: "notifications".to_string(),
    });
    let (callback, seen) = recording_callback();
    let new_ref = join_notifications(&mut worker, callback);
    assert_ne!(old_ref, new_ref);

    worker.handle_frame(&control_frame("phx_close", &old_ref));
    worker.handle_frame(&control_frame("phx_error", &old_ref));
    assert!(worker.channels.contains_key("realtime:notifications"));

    worker.handle_frame(
      r#"{"topic":"realtime:notifications","event":"postgres_changes","ref":null,
          "payload":{"data":{"type":"INSERT","record":{"id":1},"old_record":null}}}"#,
    );
    assert_eq!(
      seen.lock().unwrap().last(),
      Some(&ChannelSignal::Change(ChangeEvent {
        kind: ChangeKind::Insert,
        new: json!({"id": 1}),
        old: Value::Null,
      }))
    );

    worker.handle_frame(&control_frame("phx_close", &new_ref));
    assert!(!worker.channels.contains_key("realtime:notifications"));
    assert_eq!(
      seen.lock().unwrap().last(),
      Some(&ChannelSignal::Status(ChannelStatus::Closed))
    );
  }

  #[test]
  fn test_reconnect_delay_doubles_and_caps() {
    let settings = RealtimeConfig::default();
    assert_eq!(reconnect_delay(&settings, 1), Duration::from_millis(3000));
    assert_eq!(reconnect_delay(&settings, 2), Duration::from_millis(6000));
    assert_eq!(reconnect_delay(&settings, 3), Duration::from_millis(12000));
    assert_eq!(reconnect_delay(&settings, 4), Duration::from_millis(15000));
    assert_eq!(reconnect_delay(&settings, 40), Duration::from_millis(15000));
  }
}
