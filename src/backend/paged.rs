use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::DateRange;

use super::client::RowApi;
use super::error::FetchError;
use super::filter::{Direction, RowQuery};

/// Rows per page requested from the row API.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Fetches every row of a table whose timestamp falls in a date range,
/// one fixed-size page at a time.
pub struct PagedFetcher<T> {
  api: Arc<dyn RowApi>,
  table: &'static str,
  column: &'static str,
  direction: Direction,
  page_size: usize,
  _rows: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> PagedFetcher<T> {
  pub fn new(api: Arc<dyn RowApi>, table: &'static str, direction: Direction) -> Self {
    Self {
      api,
      table,
      column: "created_at",
      direction,
      page_size: DEFAULT_PAGE_SIZE,
      _rows: PhantomData,
    }
  }

  pub fn with_page_size(mut self, page_size: usize) -> Self {
    self.page_size = page_size.max(1);
    self
  }

  pub fn table(&self) -> &'static str {
    self.table
  }

  /// All rows in `range`, in backend order.
  ///
  /// Stops after the first page shorter than the page size. If any page
  /// fails, rows from earlier pages are dropped and the error is returned.
  pub async fn fetch_range(&self, range: &DateRange) -> Result<Vec<T>, FetchError> {
    let mut rows = Vec::new();
    let mut offset = 0;

    loop {
      let query = RowQuery::on(self.table)
        .between(self.column, range.start_instant(), range.end_instant())
        .order(self.column, self.direction)
        .page(offset, self.page_size);

      let page = self.api.select(&query).await?;
      let count = page.len();
      debug!(table = self.table, offset, count, "page fetched");

      rows.reserve(count);
      for value in page {
        rows.push(self.decode(value)?);
      }

      if count < self.page_size {
        break;
      }
      offset += self.page_size;
    }

    info!(table = self.table, %range, rows = rows.len(), "range fetched");
    Ok(rows)
  }

  fn decode(&self, value: Value) -> Result<T, FetchError> {
    serde_json::from_value(value).map_err(|e| FetchError::decode(self.table, e))
  }
}

impl<T> Clone for PagedFetcher<T> {
  fn clone(&self) -> Self {
    Self {
      api: Arc::clone(&self.api),
      table: self.table,
      column: self.column,
      direction: self.direction,
      page_size: self.page_size,
      _rows: PhantomData,
    }
  }
}
