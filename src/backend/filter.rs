//! Row query description shared by every backend call.

use chrono::{DateTime, Utc};

/// Timestamp format used in range filters (no offset, interpreted as UTC).
const FILTER_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Asc,
  Desc,
}

impl Direction {
  fn as_str(self) -> &'static str {
    match self {
      Direction::Asc => "asc",
      Direction::Desc => "desc",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
  Gte(String, String),
  Lte(String, String),
  Eq(String, String),
  Neq(String, String),
  In(String, Vec<String>),
  NotNull(String),
}

impl Filter {
  fn to_pair(&self) -> (String, String) {
    match self {
      Filter::Gte(col, v) => (col.clone(), format!("gte.{}", v)),
      Filter::Lte(col, v) => (col.clone(), format!("lte.{}", v)),
      Filter::Eq(col, v) => (col.clone(), format!("eq.{}", v)),
      Filter::Neq(col, v) => (col.clone(), format!("neq.{}", v)),
      Filter::In(col, vs) => (col.clone(), format!("in.({})", vs.join(","))),
      Filter::NotNull(col) => (col.clone(), "not.is.null".to_string()),
    }
  }
}

/// A select against one table: filters, ordering and paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
  pub table: String,
  pub columns: String,
  pub filters: Vec<Filter>,
  pub order: Option<(String, Direction)>,
  pub offset: Option<usize>,
  pub limit: Option<usize>,
}

impl RowQuery {
  pub fn on(table: &str) -> Self {
    Self {
      table: table.to_string(),
      columns: "*".to_string(),
      filters: Vec::new(),
      order: None,
      offset: None,
      limit: None,
    }
  }

  pub fn select(mut self, columns: &str) -> Self {
    self.columns = columns.split_whitespace().collect::<Vec<_>>().join("");
    self
  }

  pub fn gte(mut self, column: &str, value: impl ToString) -> Self {
    self.filters.push(Filter::Gte(column.to_string(), value.to_string()));
    self
  }

  pub fn lte(mut self, column: &str, value: impl ToString) -> Self {
    self.filters.push(Filter::Lte(column.to_string(), value.to_string()));
    self
  }

  pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
    self.filters.push(Filter::Eq(column.to_string(), value.to_string()));
    self
  }

  pub fn neq(mut self, column: &str, value: impl ToString) -> Self {
    self.filters.push(Filter::Neq(column.to_string(), value.to_string()));
    self
  }

  pub fn is_in<V: ToString>(mut self, column: &str, values: &[V]) -> Self {
    let values = values.iter().map(ToString::to_string).collect();
    self.filters.push(Filter::In(column.to_string(), values));
    self
  }

  pub fn not_null(mut self, column: &str) -> Self {
    self.filters.push(Filter::NotNull(column.to_string()));
    self
  }

  /// Restrict `column` to the closed interval `[start, end]`.
  pub fn between(self, column: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
    self
      .gte(column, start.format(FILTER_TIMESTAMP_FORMAT))
      .lte(column, end.format(FILTER_TIMESTAMP_FORMAT))
  }

  pub fn order(mut self, column: &str, direction: Direction) -> Self {
    self.order = Some((column.to_string(), direction));
    self
  }

  /// Page window: `limit` rows starting at row `offset`.
  pub fn page(mut self, offset: usize, limit: usize) -> Self {
    self.offset = Some(offset);
    self.limit = Some(limit);
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// Query-string pairs for the row API.
  pub fn query_pairs(&self) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), self.columns.clone())];
    pairs.extend(self.filters.iter().map(Filter::to_pair));
    if let Some((column, direction)) = &self.order {
      pairs.push((
        "order".to_string(),
        format!("{}.{}", column, direction.as_str()),
      ));
    }
    if let Some(offset) = self.offset {
      pairs.push(("offset".to_string(), offset.to_string()));
    }
    if let Some(limit) = self.limit {
      pairs.push(("limit".to_string(), limit.to_string()));
    }
    pairs
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn pair(k: &str, v: &str) -> (String, String) {
    (k.to_string(), v.to_string())
  }

  #[test]
  fn test_range_page_query() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
    let query = RowQuery::on("order")
      .between("created_at", start, end)
      .order("created_at", Direction::Desc)
      .page(2000, 1000);

    assert_eq!(
      query.query_pairs(),
      vec![
        pair("select", "*"),
        pair("created_at", "gte.2024-01-01T00:00:00"),
        pair("created_at", "lte.2024-01-31T23:59:59"),
        pair("order", "created_at.desc"),
        pair("offset", "2000"),
        pair("limit", "1000"),
      ]
    );
  }

  #[test]
  fn test_set_and_null_filters() {
    let query = RowQuery::on("message_chat")
      .is_in("channel_id", &[3, 7, 11])
      .neq("sender_id", "admin")
      .not_null("channel_id");

    let pairs = query.query_pairs();
    assert!(pairs.contains(&pair("channel_id", "in.(3,7,11)")));
    assert!(pairs.contains(&pair("sender_id", "neq.admin")));
    assert!(pairs.contains(&pair("channel_id", "not.is.null")));
  }

  #[test]
  fn test_select_strips_whitespace() {
    let query = RowQuery::on("claim").select(
      "claim_id, status,
       public_profile ( first_name, last_name )",
    );
    assert_eq!(
      query.columns,
      "claim_id,status,public_profile(first_name,last_name)"
    );
  }
}
