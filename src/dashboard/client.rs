//! Dashboard data access with transparent caching.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::backend::types::{Claim, ClaimStatus, ClaimThread, Message, NewMessage, Order, SearchResult};
use crate::backend::{Direction, FetchError, PagedFetcher, RowApi, RowQuery};
use crate::cache::clock::{system_clock, Clock};
use crate::cache::{
  CacheResult, DateRange, ListCache, NoopStorage, RangeCache, StatsSnapshot, Timestamped,
  DEFAULT_TTL_SECS,
};
use crate::config::Config;
use crate::sync::{compute_last_messages, LastMessageInfo, MESSAGE_TABLE};

const CLAIM_TABLE: &str = "claim";

const CLAIM_THREAD_COLUMNS: &str = "
  claim_id, claim_slug, order_id, user_id, channel_id, status, content, created_at,
  public_profile ( first_name, last_name, avatar )
";

/// Time-series tables the analytics screen reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
  Orders,
  Claims,
  SearchAnalytics,
}

impl DataSource {
  pub const ALL: [DataSource; 3] = [
    DataSource::Orders,
    DataSource::Claims,
    DataSource::SearchAnalytics,
  ];

  pub fn table(self) -> &'static str {
    match self {
      DataSource::Orders => "order",
      DataSource::Claims => CLAIM_TABLE,
      DataSource::SearchAnalytics => "archive_search_results",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      DataSource::Orders => "Orders",
      DataSource::Claims => "Claims",
      DataSource::SearchAnalytics => "Searches",
    }
  }

  /// Row order requested from the backend.
  fn direction(self) -> Direction {
    match self {
      DataSource::SearchAnalytics => Direction::Asc,
      DataSource::Orders | DataSource::Claims => Direction::Desc,
    }
  }
}

impl fmt::Display for DataSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Knobs of the data layer, usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct DashboardSettings {
  pub admin_id: String,
  pub cache_enabled: bool,
  pub ttl: Duration,
  pub page_size: usize,
  pub history_limit: usize,
}

impl DashboardSettings {
  pub fn from_config(config: &Config, no_cache: bool) -> Self {
    Self {
      admin_id: config.admin_id.clone(),
      cache_enabled: config.cache.enabled && !no_cache,
      ttl: Duration::seconds(config.cache.ttl_secs),
      page_size: config.cache.page_size,
      history_limit: config.notifications.history_limit,
    }
  }
}

impl Default for DashboardSettings {
  fn default() -> Self {
    Self {
      admin_id: String::new(),
      cache_enabled: true,
      ttl: Duration::seconds(DEFAULT_TTL_SECS),
      page_size: crate::backend::DEFAULT_PAGE_SIZE,
      history_limit: 50,
    }
  }
}

/// One cached, paged data source.
struct Source<T> {
  cache: RangeCache<T>,
  fetcher: PagedFetcher<T>,
}

impl<T: Timestamped> Source<T> {
  fn new(
    source: DataSource,
    api: &Arc<dyn RowApi>,
    settings: &DashboardSettings,
    clock: &Arc<dyn Clock>,
  ) -> Self {
    let cache = if settings.cache_enabled {
      RangeCache::new(source.table())
    } else {
      RangeCache::with_storage(source.table(), Arc::new(NoopStorage))
    };
    Self {
      cache: cache.with_ttl(settings.ttl).with_clock(Arc::clone(clock)),
      fetcher: PagedFetcher::new(Arc::clone(api), source.table(), source.direction())
        .with_page_size(settings.page_size),
    }
  }

  async fn get(&self, range: &DateRange) -> Result<CacheResult<Vec<T>>, FetchError> {
    let fetcher = &self.fetcher;
    self
      .cache
      .get(range, |requested| async move { fetcher.fetch_range(&requested).await })
      .await
  }
}

impl<T> Clone for Source<T> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      fetcher: self.fetcher.clone(),
    }
  }
}

/// Backend access for every screen.
///
/// Range reads go through one [`RangeCache`] per data source; the
/// notification history goes through a [`ListCache`]. Everything else is a
/// direct pass-through to the row API.
#[derive(Clone)]
pub struct DashboardClient {
  api: Arc<dyn RowApi>,
  clock: Arc<dyn Clock>,
  admin_id: String,
  history_limit: usize,
  orders: Source<Order>,
  claims: Source<Claim>,
  searches: Source<SearchResult>,
  notifications: ListCache<Message>,
}

impl DashboardClient {
  pub fn new(api: Arc<dyn RowApi>, settings: DashboardSettings) -> Self {
    Self::with_clock(api, settings, system_clock())
  }

  pub fn with_clock(api: Arc<dyn RowApi>, settings: DashboardSettings, clock: Arc<dyn Clock>) -> Self {
    let mut notifications = ListCache::new("notifications")
      .with_ttl(settings.ttl)
      .with_clock(Arc::clone(&clock));
    if !settings.cache_enabled {
      notifications = notifications.disabled();
    }

    info!(cache_enabled = settings.cache_enabled, ttl_secs = settings.ttl.num_seconds(), "dashboard client ready");
    Self {
      orders: Source::new(DataSource::Orders, &api, &settings, &clock),
      claims: Source::new(DataSource::Claims, &api, &settings, &clock),
      searches: Source::new(DataSource::SearchAnalytics, &api, &settings, &clock),
      notifications,
      admin_id: settings.admin_id,
      history_limit: settings.history_limit,
      api,
      clock,
    }
  }

  pub fn admin_id(&self) -> &str {
    &self.admin_id
  }

  /// Timestamps of every row of `source` in `range`.
  pub async fn fetch_range(&self, source: DataSource, range: &DateRange) -> Result<Vec<DateTime<Utc>>, FetchError> {
    let timestamps = match source {
      DataSource::Orders => timestamps(self.orders(range).await?.data),
      DataSource::Claims => timestamps(self.claims(range).await?.data),
      DataSource::SearchAnalytics => timestamps(self.search_results(range).await?.data),
    };
    Ok(timestamps)
  }

  pub async fn orders(&self, range: &DateRange) -> Result<CacheResult<Vec<Order>>, FetchError> {
    self.orders.get(range).await
  }

  pub async fn claims(&self, range: &DateRange) -> Result<CacheResult<Vec<Claim>>, FetchError> {
    self.claims.get(range).await
  }

  pub async fn search_results(&self, range: &DateRange) -> Result<CacheResult<Vec<SearchResult>>, FetchError> {
    self.searches.get(range).await
  }

  pub fn cache_stats(&self) -> Vec<(DataSource, StatsSnapshot)> {
    vec![
      (DataSource::Orders, self.orders.cache.stats()),
      (DataSource::Claims, self.claims.cache.stats()),
      (DataSource::SearchAnalytics, self.searches.cache.stats()),
    ]
  }

  /// Drop every cached window so the next read goes to the backend.
  pub fn invalidate(&self) {
    self.orders.cache.invalidate();
    self.claims.cache.invalidate();
    self.searches.cache.invalidate();
    self.notifications.invalidate();
  }

  /// All claims with their customer profile, newest first.
  pub async fn claim_threads(&self) -> Result<Vec<ClaimThread>, FetchError> {
    let query = RowQuery::on(CLAIM_TABLE)
      .select(CLAIM_THREAD_COLUMNS)
      .order("created_at", Direction::Desc);
    decode_rows(CLAIM_TABLE, self.api.select(&query).await?)
  }

  pub async fn update_claim_status(&self, claim_id: i64, status: ClaimStatus) -> Result<(), FetchError> {
    info!(claim_id, status = status.as_str(), "updating claim status");
    let query = RowQuery::on(CLAIM_TABLE).eq("claim_id", claim_id);
    self
      .api
      .update(&query, json!({ "status": status.as_str() }))
      .await
  }

  /// Chat channels of every claim that has one.
  pub async fn claim_channels(&self) -> Result<Vec<i64>, FetchError> {
    let query = RowQuery::on(CLAIM_TABLE)
      .select("channel_id")
      .not_null("channel_id");
    let rows = self.api.select(&query).await?;
    let mut ids: Vec<i64> = rows
      .iter()
      .filter_map(|row| row.get("channel_id").and_then(Value::as_i64))
      .collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
  }

  /// Full history of one chat channel, oldest first.
  pub async fn messages_for_channel(&self, channel_id: i64) -> Result<Vec<Message>, FetchError> {
    let query = RowQuery::on(MESSAGE_TABLE)
      .eq("channel_id", channel_id)
      .order("created_at", Direction::Asc);
    decode_rows(MESSAGE_TABLE, self.api.select(&query).await?)
  }

  /// Post a message. The stored row is returned but not added to any local
  /// list: it shows up through the channel's realtime echo.
  pub async fn send_message(&self, channel_id: i64, sender_id: &str, content: &str) -> Result<Message, FetchError> {
    let row = to_row(&NewMessage {
      channel_id,
      sender_id,
      message: content,
    })?;
    let stored = self.api.insert(MESSAGE_TABLE, row).await?;
    let first = stored.into_iter().next().ok_or_else(|| FetchError::Empty {
      table: MESSAGE_TABLE.to_string(),
    })?;
    let message: Message =
      serde_json::from_value(first).map_err(|e| FetchError::decode(MESSAGE_TABLE, e))?;
    debug!(channel_id, message_id = message.id, "message sent");
    Ok(message)
  }

  /// Latest inbound messages (not sent by the operator), newest first.
  pub async fn notification_history(&self) -> Result<Vec<Message>, FetchError> {
    let api = Arc::clone(&self.api);
    let query = RowQuery::on(MESSAGE_TABLE)
      .neq("sender_id", &self.admin_id)
      .order("created_at", Direction::Desc)
      .limit(self.history_limit);
    self
      .notifications
      .fetch(|| async move {
        api
          .select(&query)
          .await
          .and_then(|rows| decode_rows(MESSAGE_TABLE, rows))
      })
      .await
  }

  /// Last message of each channel, labelled relative to now.
  pub async fn last_messages(&self, channel_ids: &[i64]) -> Result<HashMap<i64, LastMessageInfo>, FetchError> {
    compute_last_messages(&*self.api, channel_ids, self.clock.now()).await
  }
}

fn timestamps<T: Timestamped>(rows: Vec<T>) -> Vec<DateTime<Utc>> {
  rows.iter().map(Timestamped::timestamp).collect()
}

fn decode_rows<T: serde::de::DeserializeOwned>(table: &str, rows: Vec<Value>) -> Result<Vec<T>, FetchError> {
  rows
    .into_iter()
    .map(|row| serde_json::from_value(row).map_err(|e| FetchError::decode(table, e)))
    .collect()
}

fn to_row<T: Serialize>(value: &T) -> Result<Value, FetchError> {
  serde_json::to_value(value).map_err(|e| FetchError::decode(MESSAGE_TABLE, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::testing::FakeRowApi;
  use crate::cache::clock::testing::ManualClock;
  use crate::cache::CacheSource;
  use chrono::TimeZone;

  fn january() -> DateRange {
    DateRange::parse("2024-01-01", "2024-01-31").unwrap()
  }

  /// 1200 orders, newest first, from Jan 31 23:59:59 down to Jan 1 00:00:00.
  fn january_orders() -> Vec<Value> {
    let newest = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
    let oldest = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let step = (newest - oldest) / 1199;
    (0..1200)
      .map(|i| {
        let at = if i == 1199 { oldest } else { newest - step * i };
        json!({ "id": i, "status": "PAID", "created_at": at.to_rfc3339() })
      })
      .collect()
  }

  fn client(api: Arc<FakeRowApi>, settings: DashboardSettings) -> DashboardClient {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap());
    DashboardClient::with_clock(api, settings, clock)
  }

  fn settings() -> DashboardSettings {
    DashboardSettings {
      admin_id: "admin-1".to_string(),
      ..DashboardSettings::default()
    }
  }

  #[tokio::test]
  async fn test_orders_month_then_subrange_from_cache() {
    let rows = january_orders();
    let api = FakeRowApi::with_pages(vec![Ok(rows[..1000].to_vec()), Ok(rows[1000..].to_vec())]);
    let client = client(api.clone(), settings());

    let month = client.orders(&january()).await.unwrap();
    assert_eq!(month.source, CacheSource::Network);
    assert_eq!(month.data.len(), 1200);
    assert_eq!(api.selects().len(), 2);

    let sub = DateRange::parse("2024-01-10", "2024-01-15").unwrap();
    let expected = month.data.iter().filter(|o| sub.contains(o.created_at)).count();
    assert!(expected > 0);

    let cached = client.orders(&sub).await.unwrap();
    assert_eq!(cached.source, CacheSource::Cache);
    assert_eq!(cached.data.len(), expected);
    assert!(cached.data.iter().all(|o| sub.contains(o.created_at)));
    assert_eq!(api.selects().len(), 2);
  }

  #[tokio::test]
  async fn test_sources_are_cached_independently() {
    let api = FakeRowApi::with_responder(|query| {
      let at = if query.table == "archive_search_results" {
        "2024-01-02T10:00:00"
      } else {
        "2024-01-02T10:00:00+00:00"
      };
      if query.offset == Some(0) {
        vec![json!({ "id": 1, "claim_id": 1, "created_at": at })]
      } else {
        Vec::new()
      }
    });
    let client = client(api.clone(), settings());
    let range = DateRange::parse("2024-01-02", "2024-01-02").unwrap();

    let orders = client.fetch_range(DataSource::Orders, &range).await.unwrap();
    let claims = client.fetch_range(DataSource::Claims, &range).await.unwrap();
    let searches = client.fetch_range(DataSource::SearchAnalytics, &range).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(claims.len(), 1);
    assert_eq!(searches, orders);

    let tables: Vec<String> = api.selects().into_iter().map(|q| q.table).collect();
    assert_eq!(tables, vec!["order", "claim", "archive_search_results"]);

    let stats = client.cache_stats();
    assert!(stats.iter().all(|(_, s)| s.misses == 1 && s.hits == 0));
  }

  #[tokio::test]
  async fn test_disabled_cache_always_fetches() {
    let api = FakeRowApi::with_responder(|query| {
      if query.offset == Some(0) {
        vec![
          json!({ "id": 1, "created_at": "2024-01-01T00:00:00Z" }),
          json!({ "id": 2, "created_at": "2024-01-31T23:59:59Z" }),
        ]
      } else {
        Vec::new()
      }
    });
    let client = client(
      api.clone(),
      DashboardSettings {
        cache_enabled: false,
        ..settings()
      },
    );

    client.orders(&january()).await.unwrap();
    client.orders(&january()).await.unwrap();
    assert_eq!(api.selects().len(), 2);
  }

  #[tokio::test]
  async fn test_notification_history_excludes_admin_and_is_cached() {
    let api = FakeRowApi::with_pages(vec![Ok(vec![json!({
      "id": 5,
      "channel_id": 3,
      "sender_id": "customer-1",
      "message": "where is my order?",
      "created_at": "2024-01-31T10:00:00+00:00"
    })])]);
    let client = client(api.clone(), settings());

    let first = client.notification_history().await.unwrap();
    let second = client.notification_history().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(api.selects().len(), 1);

    let pairs = api.selects()[0].query_pairs();
    assert!(pairs.contains(&("sender_id".to_string(), "neq.admin-1".to_string())));
    assert!(pairs.contains(&("order".to_string(), "created_at.desc".to_string())));
    assert!(pairs.contains(&("limit".to_string(), "50".to_string())));
  }

  #[tokio::test]
  async fn test_send_message_and_status_update_pass_through() {
    let api = FakeRowApi::new();
    let client = client(api.clone(), settings());

    let sent = client.send_message(3, "admin-1", "on it").await.unwrap();
    assert_eq!(sent.content, "on it");
    assert_eq!(sent.channel_id, 3);
    let (table, row) = &api.inserts()[0];
    assert_eq!(table, "message_chat");
    assert_eq!(row, &json!({ "channel_id": 3, "sender_id": "admin-1", "message": "on it" }));

    client
      .update_claim_status(12, ClaimStatus::Resolved)
      .await
      .unwrap();
    let (query, patch) = &api.updates()[0];
    assert_eq!(query.table, "claim");
    assert!(query
      .query_pairs()
      .contains(&("claim_id".to_string(), "eq.12".to_string())));
    assert_eq!(patch, &json!({ "status": "RESOLVED" }));
  }

  #[tokio::test]
  async fn test_claim_channels_skip_nulls_and_duplicates() {
    let api = FakeRowApi::with_pages(vec![Ok(vec![
      json!({ "channel_id": 9 }),
      json!({ "channel_id": 3 }),
      json!({ "channel_id": 9 }),
    ])]);
    let client = client(api.clone(), settings());

    assert_eq!(client.claim_channels().await.unwrap(), vec![3, 9]);
    assert!(api.selects()[0]
      .query_pairs()
      .contains(&("channel_id".to_string(), "not.is.null".to_string())));
  }
}
