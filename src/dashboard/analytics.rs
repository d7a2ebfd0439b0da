use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};

use crate::backend::types::Order;
use crate::backend::FetchError;
use crate::cache::{CacheSource, DateRange, StatsSnapshot};

use super::client::{DashboardClient, DataSource};

/// Status label for orders without one.
pub const UNKNOWN_STATUS: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCount {
  pub day: NaiveDate,
  pub count: usize,
}

/// Orders of one day, split by status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyStatuses {
  pub day: NaiveDate,
  pub total: usize,
  /// Every status seen anywhere in the range, zero when absent that day
  pub statuses: BTreeMap<String, usize>,
}

/// Row count per day of `range`, zero-filled. Timestamps outside the range
/// are ignored.
pub fn daily_counts<I>(range: &DateRange, timestamps: I) -> Vec<DailyCount>
where
  I: IntoIterator<Item = DateTime<Utc>>,
{
  let mut counts: BTreeMap<NaiveDate, usize> = range.days().map(|day| (day, 0)).collect();
  for ts in timestamps {
    if let Some(count) = counts.get_mut(&ts.date_naive()) {
      *count += 1;
    }
  }
  counts
    .into_iter()
    .map(|(day, count)| DailyCount { day, count })
    .collect()
}

fn status_of(order: &Order) -> &str {
  order.status.as_deref().unwrap_or(UNKNOWN_STATUS)
}

pub fn daily_statuses(range: &DateRange, orders: &[Order]) -> Vec<DailyStatuses> {
  let all: BTreeSet<&str> = orders.iter().map(status_of).collect();
  let empty: BTreeMap<String, usize> = all.iter().map(|s| (s.to_string(), 0)).collect();

  let mut days: BTreeMap<NaiveDate, DailyStatuses> = range
    .days()
    .map(|day| {
      (
        day,
        DailyStatuses {
          day,
          total: 0,
          statuses: empty.clone(),
        },
      )
    })
    .collect();

  for order in orders {
    if let Some(entry) = days.get_mut(&order.created_at.date_naive()) {
      entry.total += 1;
      *entry.statuses.entry(status_of(order).to_string()).or_default() += 1;
    }
  }
  days.into_values().collect()
}

/// Order totals per status over the whole range, largest first.
pub fn status_totals(orders: &[Order]) -> Vec<(String, usize)> {
  let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
  for order in orders {
    *totals.entry(status_of(order)).or_default() += 1;
  }
  let mut totals: Vec<(String, usize)> = totals
    .into_iter()
    .map(|(status, count)| (status.to_string(), count))
    .collect();
  totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
  totals
}

#[derive(Debug, Clone)]
pub struct SourceSeries {
  pub source: DataSource,
  pub days: Vec<DailyCount>,
  pub total: usize,
  pub served_from: CacheSource,
}

/// Everything the analytics screen shows for one range.
#[derive(Debug, Clone)]
pub struct AnalyticsSnapshot {
  pub range: DateRange,
  pub series: Vec<SourceSeries>,
  pub order_statuses: Vec<(String, usize)>,
  pub order_days: Vec<DailyStatuses>,
  pub stats: Vec<(DataSource, StatsSnapshot)>,
}

fn series<I>(source: DataSource, range: &DateRange, served_from: CacheSource, timestamps: I) -> SourceSeries
where
  I: IntoIterator<Item = DateTime<Utc>>,
{
  let days = daily_counts(range, timestamps);
  let total = days.iter().map(|d| d.count).sum();
  SourceSeries {
    source,
    days,
    total,
    served_from,
  }
}

/// Load the three sources for `range` concurrently and bucket them by day.
pub async fn load_analytics(client: &DashboardClient, range: DateRange) -> Result<AnalyticsSnapshot, FetchError> {
  let (orders, claims, searches) = tokio::try_join!(
    client.orders(&range),
    client.claims(&range),
    client.search_results(&range),
  )?;

  let series = vec![
    series(
      DataSource::Orders,
      &range,
      orders.source,
      orders.data.iter().map(|o| o.created_at),
    ),
    series(
      DataSource::Claims,
      &range,
      claims.source,
      claims.data.iter().map(|c| c.created_at),
    ),
    series(
      DataSource::SearchAnalytics,
      &range,
      searches.source,
      searches.data.iter().map(|s| s.created_at),
    ),
  ];

  Ok(AnalyticsSnapshot {
    range,
    order_statuses: status_totals(&orders.data),
    order_days: daily_statuses(&range, &orders.data),
    series,
    stats: client.cache_stats(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
  }

  fn order(id: i64, day: u32, status: Option<&str>) -> Order {
    Order {
      id,
      status: status.map(str::to_string),
      created_at: at(day, 12),
    }
  }

  #[test]
  fn test_daily_counts_zero_fill_and_ignore_outside() {
    let range = DateRange::parse("2024-01-01", "2024-01-04").unwrap();
    let counts = daily_counts(&range, vec![at(1, 0), at(1, 23), at(3, 5), at(9, 1)]);

    let values: Vec<usize> = counts.iter().map(|c| c.count).collect();
    assert_eq!(values, vec![2, 0, 1, 0]);
    assert_eq!(counts[0].day, range.start());
    assert_eq!(counts[3].day, range.end());
  }

  #[test]
  fn test_daily_statuses_fill_every_status() {
    let range = DateRange::parse("2024-01-01", "2024-01-02").unwrap();
    let orders = vec![
      order(1, 1, Some("PAID")),
      order(2, 1, None),
      order(3, 2, Some("CANCELLED")),
    ];

    let days = daily_statuses(&range, &orders);
    assert_eq!(days.len(), 2);
    assert_eq!(days[0].total, 2);
    assert_eq!(days[0].statuses["PAID"], 1);
    assert_eq!(days[0].statuses[UNKNOWN_STATUS], 1);
    assert_eq!(days[0].statuses["CANCELLED"], 0);
    assert_eq!(days[1].statuses["CANCELLED"], 1);
  }

  #[test]
  fn test_status_totals_sorted_by_count() {
    let orders = vec![
      order(1, 1, Some("PAID")),
      order(2, 1, Some("PAID")),
      order(3, 2, Some("CANCELLED")),
      order(4, 2, Some("ACCEPTED")),
    ];
    assert_eq!(
      status_totals(&orders),
      vec![
        ("PAID".to_string(), 2),
        ("ACCEPTED".to_string(), 1),
        ("CANCELLED".to_string(), 1),
      ]
    );
  }
}
