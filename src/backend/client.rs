use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;

use super::error::FetchError;
use super::filter::RowQuery;

/// Narrow row-level contract against the hosted relational API.
#[async_trait]
pub trait RowApi: Send + Sync {
  /// Run a select and return the raw JSON rows.
  async fn select(&self, query: &RowQuery) -> Result<Vec<Value>, FetchError>;

  /// Insert one row, returning the stored representation.
  async fn insert(&self, table: &str, row: Value) -> Result<Vec<Value>, FetchError>;

  /// Patch every row matched by the query's filters.
  async fn update(&self, query: &RowQuery, patch: Value) -> Result<(), FetchError>;
}

/// Row API client over HTTPS
#[derive(Clone)]
pub struct RestClient {
  http: reqwest::Client,
  base: Url,
  schema: String,
}

impl RestClient {
  pub fn new(config: &Config) -> Result<Self> {
    let key = Config::get_service_key()?;
    let base = base_url(&config.backend.url)?;

    let mut headers = HeaderMap::new();
    let apikey =
      HeaderValue::from_str(&key).map_err(|e| eyre!("Service key is not a valid header: {}", e))?;
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", key))
      .map_err(|e| eyre!("Service key is not a valid header: {}", e))?;
    bearer.set_sensitive(true);
    headers.insert("apikey", apikey);
    headers.insert(AUTHORIZATION, bearer);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .user_agent(concat!("claimdesk/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      schema: config.backend.schema.clone(),
    })
  }

  fn table_url(&self, table: &str) -> Result<Url, FetchError> {
    Ok(self.base.join(&format!("rest/v1/{}", table))?)
  }

  fn request(&self, method: Method, table: &str) -> Result<RequestBuilder, FetchError> {
    let profile = if method == Method::GET {
      "Accept-Profile"
    } else {
      "Content-Profile"
    };
    Ok(
      self
        .http
        .request(method, self.table_url(table)?)
        .header(profile, &self.schema),
    )
  }

  async fn send(&self, table: &str, request: RequestBuilder) -> Result<Response, FetchError> {
    let response = request.send().await.map_err(|source| FetchError::Http {
      table: table.to_string(),
      source,
    })?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    warn!(table, status = status.as_u16(), %message, "row api request failed");
    Err(FetchError::Api {
      table: table.to_string(),
      status: status.as_u16(),
      message,
    })
  }

  async fn rows(&self, table: &str, response: Response) -> Result<Vec<Value>, FetchError> {
    let bytes = response.bytes().await.map_err(|source| FetchError::Http {
      table: table.to_string(),
      source,
    })?;
    if bytes.is_empty() {
      return Ok(Vec::new());
    }
    serde_json::from_slice(&bytes).map_err(|e| FetchError::decode(table, e))
  }
}

#[async_trait]
impl RowApi for RestClient {
  async fn select(&self, query: &RowQuery) -> Result<Vec<Value>, FetchError> {
    debug!(table = %query.table, params = ?query.query_pairs(), "select");
    let request = self
      .request(Method::GET, &query.table)?
      .query(&query.query_pairs());
    let response = self.send(&query.table, request).await?;
    self.rows(&query.table, response).await
  }

  async fn insert(&self, table: &str, row: Value) -> Result<Vec<Value>, FetchError> {
    debug!(table, "insert");
    let request = self
      .request(Method::POST, table)?
      .header("Prefer", "return=representation")
      .json(&row);
    let response = self.send(table, request).await?;
    self.rows(table, response).await
  }

  async fn update(&self, query: &RowQuery, patch: Value) -> Result<(), FetchError> {
    debug!(table = %query.table, "update");
    let request = self
      .request(Method::PATCH, &query.table)?
      .query(&query.query_pairs())
      .header("Prefer", "return=minimal")
      .json(&patch);
    self.send(&query.table, request).await?;
    Ok(())
  }
}

/// Normalise the configured project URL so relative joins keep its path.
fn base_url(raw: &str) -> Result<Url> {
  let trimmed = raw.trim().trim_end_matches('/');
  Url::parse(&format!("{}/", trimmed)).map_err(|e| eyre!("Invalid backend url '{}': {}", raw, e))
}

/// Pull the human-readable message out of an error body.
fn error_message(body: &str) -> String {
  serde_json::from_str::<Value>(body)
    .ok()
    .and_then(|v| {
      v.get("message")
        .or_else(|| v.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
    })
    .unwrap_or_else(|| body.trim().to_string())
}
