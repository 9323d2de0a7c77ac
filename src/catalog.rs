use reqwest::{Client, redirect};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use urlencoding::encode;

use crate::constants::constants;

// --- Types ---

/// One movie as the catalog describes it. Search hits only fill title, year
/// and poster; `fetch_detail` fills the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogItem {
  pub title: String,
  pub year: String,
  pub director: String,
  pub runtime: String,
  pub genres: Vec<String>,
  pub cast: Vec<String>,
  pub rating: String,
  pub votes: String,
  pub poster_url: Option<String>,
}

impl CatalogItem {
  pub fn new(title: impl Into<String>, year: impl Into<String>) -> Self {
    Self { title: title.into(), year: year.into(), ..Self::default() }
  }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
  #[error("connection failed: {0}")]
  Connection(String),
  #[error("unexpected HTTP status {0}")]
  Status(u16),
  #[error("malformed catalog response: {0}")]
  Malformed(String),
  #[error("title not found in catalog")]
  NotFound,
  #[error("poster URL has no /images path: {0}")]
  InvalidPosterUrl(String),
}

// --- Transport ---

#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

/// A failure before any HTTP response arrived.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// "Send a GET, get status and body". The catalog client speaks only through this.
pub trait Transport: Send + Sync + 'static {
  fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
  client: Client,
}

impl HttpTransport {
  /// Catalog API transport: transport defaults, no explicit timeouts.
  pub fn catalog() -> Result<Self, TransportError> {
    let client = Client::builder().build().map_err(|e| TransportError(e.to_string()))?;
    Ok(Self { client })
  }

  /// Poster transport: browser User-Agent, redirects followed, fixed connect/read timeouts.
  pub fn images() -> Result<Self, TransportError> {
    let c = constants();
    let client = Client::builder()
      .user_agent(c.user_agent.as_str())
      .redirect(redirect::Policy::limited(10))
      .connect_timeout(Duration::from_secs(c.image_connect_timeout_secs))
      .read_timeout(Duration::from_secs(c.image_read_timeout_secs))
      .build()
      .map_err(|e| TransportError(e.to_string()))?;
    Ok(Self { client })
  }
}

impl Transport for HttpTransport {
  async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
    let response = self.client.get(url).send().await.map_err(|e| TransportError(e.to_string()))?;
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(|e| TransportError(e.to_string()))?;
    Ok(HttpResponse { status, body: body.to_vec() })
  }
}

// --- Wire format ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
  #[serde(rename = "Response", default)]
  response: String,
  #[serde(rename = "Search")]
  search: Option<Vec<SearchHit>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchHit {
  title: Option<String>,
  year: Option<String>,
  poster: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetailResponse {
  #[serde(default)]
  response: String,
  title: Option<String>,
  director: Option<String>,
  year: Option<String>,
  runtime: Option<String>,
  #[serde(rename = "imdbRating")]
  rating: Option<String>,
  #[serde(rename = "imdbVotes")]
  votes: Option<String>,
  genre: Option<String>,
  actors: Option<String>,
  poster: Option<String>,
}

/// Split a comma-separated catalog field, keeping order.
fn split_list(raw: &str) -> Vec<String> {
  raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

/// `"N/A"` and empty strings mean no poster.
fn poster_or_none(raw: Option<String>) -> Option<String> {
  raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty() && s != "N/A")
}

/// Substring match, so "201" keeps every 2010s release and "2010" keeps "2010–2012".
pub fn year_matches(year: &str, filter: &str) -> bool {
  filter.is_empty() || year.contains(filter)
}

/// The part of a poster URL the image host serves, from `/images` onward.
pub fn poster_path(url: &str) -> Option<&str> {
  url.find("/images").map(|idx| &url[idx..])
}

fn parse_search(body: &[u8], year_filter: &str) -> Result<Vec<CatalogItem>, CatalogError> {
  let parsed: SearchResponse = serde_json::from_slice(body).map_err(|e| CatalogError::Malformed(e.to_string()))?;
  if parsed.response != "True" {
    return Ok(Vec::new());
  }
  let hits = parsed.search.unwrap_or_default();
  Ok(
    hits
      .into_iter()
      .map(|hit| CatalogItem {
        title: hit.title.unwrap_or_else(|| "Unknown".to_string()),
        year: hit.year.unwrap_or_else(|| "Unknown".to_string()),
        poster_url: poster_or_none(hit.poster),
        ..CatalogItem::default()
      })
      .filter(|item| year_matches(&item.year, year_filter))
      .collect(),
  )
}

fn parse_detail(body: &[u8], base: &CatalogItem) -> Result<CatalogItem, CatalogError> {
  let parsed: DetailResponse = serde_json::from_slice(body).map_err(|e| CatalogError::Malformed(e.to_string()))?;
  if parsed.response != "True" {
    return Err(CatalogError::NotFound);
  }
  Ok(CatalogItem {
    title: parsed.title.unwrap_or_else(|| base.title.clone()),
    year: parsed.year.unwrap_or_else(|| base.year.clone()),
    director: parsed.director.unwrap_or_else(|| "Unknown".to_string()),
    runtime: parsed.runtime.unwrap_or_else(|| "Unknown".to_string()),
    rating: parsed.rating.unwrap_or_else(|| "N/A".to_string()),
    votes: parsed.votes.unwrap_or_else(|| "N/A".to_string()),
    genres: parsed.genre.as_deref().map(split_list).unwrap_or_default(),
    cast: parsed.actors.as_deref().map(split_list).unwrap_or_default(),
    poster_url: poster_or_none(parsed.poster),
  })
}

// --- Client ---

/// Stateless request/response calls against the remote catalog.
pub struct CatalogClient<T> {
  api: T,
  images: T,
  api_base: String,
  image_host: String,
  api_key: String,
}

impl<T: Transport> CatalogClient<T> {
  pub fn new(api: T, images: T, api_key: impl Into<String>) -> Self {
    let c = constants();
    Self { api, images, api_base: c.api_base.clone(), image_host: c.image_host.clone(), api_key: api_key.into() }
  }

  #[cfg(test)]
  pub fn with_endpoints(mut self, api_base: impl Into<String>, image_host: impl Into<String>) -> Self {
    self.api_base = api_base.into().trim_end_matches('/').to_string();
    self.image_host = image_host.into().trim_end_matches('/').to_string();
    self
  }

  pub async fn search(&self, title: &str, year_filter: &str) -> Result<Vec<CatalogItem>, CatalogError> {
    let url = format!("{}/?s={}&type=movie&apikey={}", self.api_base, encode(title), encode(&self.api_key));
    debug!(title = %title, year = %year_filter, "catalog: search");
    let response = self.api.get(&url).await.map_err(|e| CatalogError::Connection(e.0))?;
    if response.status != 200 {
      return Err(CatalogError::Status(response.status));
    }
    parse_search(&response.body, year_filter.trim())
  }

  /// Detail fields merged into a copy of `item`.
  pub async fn fetch_detail(&self, item: &CatalogItem) -> Result<CatalogItem, CatalogError> {
    let url = format!(
      "{}/?t={}&y={}&apikey={}",
      self.api_base,
      encode(&item.title),
      encode(&item.year),
      encode(&self.api_key)
    );
    debug!(title = %item.title, year = %item.year, "catalog: fetch detail");
    let response = self.api.get(&url).await.map_err(|e| CatalogError::Connection(e.0))?;
    if response.status != 200 {
      return Err(CatalogError::NotFound);
    }
    parse_detail(&response.body, item)
  }

  /// Raw poster bytes from the image host. Decoding is the caller's job.
  pub async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
    let path = poster_path(url).ok_or_else(|| CatalogError::InvalidPosterUrl(url.to_string()))?;
    let full = format!("{}{}", self.image_host, path);
    let response = self.images.get(&full).await.map_err(|e| CatalogError::Connection(e.0))?;
    if response.status != 200 {
      return Err(CatalogError::Status(response.status));
    }
    Ok(response.body)
  }
}
