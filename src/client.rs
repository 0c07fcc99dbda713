use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::batch::{apply_template, split_ids};
use crate::cache::{DiskCache, NoCache, ResponseCache};
use crate::config::load_config;
use crate::error::describe_failure;
use crate::normalize::normalize;
use crate::table::Table;
use crate::transport::{HttpResponse, ReqwestTransport, Transport};
use crate::util::{append_query, urljoin, value_to_plain_string};

/// Records requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base API URL, typically `https://api.rentman.net`.
    pub url: String,
    /// API token, sent as a bearer token.
    pub key: String,
    /// Print the number of API calls made when the client is dropped.
    pub debug: bool,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
            debug: false,
            timeout: Duration::from_secs(60),
        }
    }
}

/// The records gathered by [`Client::fetch_all_pages`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pages {
    pub records: Vec<Value>,
    /// Set when paging stopped early because a page could not be fetched.
    pub failure: Option<PageFailure>,
}

impl Pages {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub offset: usize,
    /// `None` when no response was received at all.
    pub status: Option<u16>,
    pub message: String,
}

enum PageData {
    Records(Vec<Value>),
    Single(Value),
}

#[derive(Debug, serde::Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Value,
}

/// A session against one Rentman account.
///
/// Owns the HTTP transport, the response cache and a count of paged fetches
/// made through it. All calls block; nothing is retried.
pub struct Client {
    url: String,
    headers: HeaderMap,
    debug: bool,
    page_size: usize,
    max_results: Option<usize>,
    progress: bool,
    timeout: Duration,

    api_calls: AtomicU64,

    transport: Box<dyn Transport>,
    cache: Box<dyn ResponseCache>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url)
            .field("debug", &self.debug)
            .field("page_size", &self.page_size)
            .field("max_results", &self.max_results)
            .field("timeout", &self.timeout)
            .field("api_calls", &self.api_call_count())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client from environment variables, `.env` and/or `.rentmanrc`.
    ///
    /// This is equivalent to `Client::new(None, None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `url`/`key`/`debug` arguments
    /// - environment variables `RENTMAN_URL` / `RENTMAN_API_KEY` / `RENTMAN_DEBUG`,
    ///   including those set by a `.env` file
    /// - config file from `RENTMAN_RC` or `.rentmanrc`
    pub fn new(url: Option<String>, key: Option<String>, debug: Option<bool>) -> Result<Self> {
        let cfg = load_config(url, key, debug)?;
        Self::from_config(cfg)
    }

    /// Creates a client with the reqwest transport and the on-disk cache.
    ///
    /// If no cache directory is available the client runs uncached.
    pub fn from_config(cfg: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(cfg.timeout)?;
        let cache: Box<dyn ResponseCache> = match DiskCache::open_default() {
            Ok(cache) => {
                tracing::debug!("using response cache at {}", cache.path().display());
                Box::new(cache)
            }
            Err(e) => {
                tracing::warn!("response cache disabled: {:#}", e);
                Box::new(NoCache)
            }
        };
        Self::from_parts(cfg, transport, cache)
    }

    pub fn from_parts(
        cfg: ClientConfig,
        transport: impl Transport + 'static,
        cache: impl ResponseCache + 'static,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", cfg.key.trim()))
            .context("API token contains characters that are not allowed in an HTTP header")?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            url: cfg.url,
            headers,
            debug: cfg.debug,
            page_size: DEFAULT_PAGE_SIZE,
            max_results: None,
            progress: true,
            timeout: cfg.timeout,
            api_calls: AtomicU64::new(0),
            transport: Box::new(transport),
            cache: Box::new(cache),
        })
    }

    /// Replaces the transport with a reqwest transport using `timeout` per
    /// request.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.transport = Box::new(ReqwestTransport::new(timeout)?);
        self.timeout = timeout;
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Stops paging once this many records have been gathered.
    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    pub fn with_cache(mut self, cache: impl ResponseCache + 'static) -> Self {
        self.cache = Box::new(cache);
        self
    }

    pub fn without_cache(self) -> Self {
        self.with_cache(NoCache)
    }

    /// Number of paged fetches issued so far (not individual page requests).
    pub fn api_call_count(&self) -> u64 {
        self.api_calls.load(Ordering::Relaxed)
    }

    /// Requests `endpoint` page by page until a short page arrives.
    ///
    /// `endpoint` may carry its own filters (`projects?number=12`) but must
    /// not set `offset` or `limit`. A `data` object instead of an array is
    /// taken as the only record. When a page fails, the records gathered so
    /// far are returned together with the failure.
    pub fn fetch_all_pages(&self, endpoint: &str) -> Pages {
        if self.max_results == Some(0) {
            return Pages::default();
        }
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("{}", endpoint);

        let base = urljoin(&self.url, endpoint);
        let limit = self.page_size;
        let mut offset = 0usize;
        let mut records = Vec::new();

        loop {
            let url = append_query(
                &base,
                &[
                    ("offset", offset.to_string().as_str()),
                    ("limit", limit.to_string().as_str()),
                ],
            );

            let page = match self.fetch_page(&url) {
                Ok(page) => page,
                Err((status, message)) => {
                    tracing::warn!("Error fetching offset: {}: {}", offset, message);
                    self.cache.flush();
                    return Pages {
                        records,
                        failure: Some(PageFailure {
                            offset,
                            status,
                            message,
                        }),
                    };
                }
            };

            let done = match page {
                PageData::Single(record) => {
                    records.push(record);
                    true
                }
                PageData::Records(batch) => {
                    let short = batch.len() < limit;
                    records.extend(batch);
                    short
                }
            };

            if let Some(max) = self.max_results {
                if records.len() >= max {
                    records.truncate(max);
                    break;
                }
            }
            if done {
                break;
            }
            offset += limit;
        }

        self.cache.flush();
        Pages {
            records,
            failure: None,
        }
    }

    fn fetch_page(&self, url: &str) -> std::result::Result<PageData, (Option<u16>, String)> {
        let resp = self.get(url).map_err(|e| (None, format!("{:#}", e)))?;
        if !resp.is_success() {
            return Err((Some(resp.status), failure_message(&resp, url)));
        }

        let envelope: Envelope = serde_json::from_str(&resp.body).map_err(|e| {
            (
                Some(resp.status),
                format!("failed to parse API JSON (url={}): {}", url, e),
            )
        })?;

        Ok(match envelope.data {
            Value::Array(items) => PageData::Records(items),
            Value::Null => PageData::Records(Vec::new()),
            other => PageData::Single(other),
        })
    }

    /// Fetches `{endpoint}/{id}` and returns the whole decoded body.
    pub fn get_item(&self, endpoint: &str, id: impl fmt::Display) -> Option<Value> {
        let url = urljoin(
            &self.url,
            &format!("{}/{}", endpoint.trim_end_matches('/'), id),
        );

        let resp = match self.get(&url) {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Error: {:#}", e);
                return None;
            }
        };
        self.cache.flush();

        if !resp.is_success() {
            tracing::warn!("Error: {} - {}", resp.status, failure_message(&resp, &url));
            return None;
        }

        match serde_json::from_str(&resp.body) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("failed to parse API JSON (url={}): {}", url, e);
                None
            }
        }
    }

    /// Fetches every page of `endpoint` and flattens the records into a table.
    ///
    /// A failed page is logged and the table holds whatever came before it;
    /// use [`Client::fetch_all_pages`] to detect truncation.
    pub fn fetch_and_normalize(&self, endpoint: &str) -> Table {
        let pages = self.fetch_all_pages(endpoint);
        normalize(&pages.records)
    }

    /// Runs [`Client::fetch_and_normalize`] once per chunk of `ids` and
    /// concatenates the results.
    ///
    /// `ids` is a comma-separated list; each chunk of at most `batch_size`
    /// ids replaces `{ids}` in `template`, or is appended when the template
    /// has no placeholder (`costs?project=`).
    pub fn batch_fetch_and_normalize(&self, template: &str, ids: &str, batch_size: usize) -> Table {
        let batches = split_ids(ids, batch_size);
        if batches.is_empty() {
            return Table::new();
        }

        let pb = if self.progress && batches.len() > 1 {
            let pb = ProgressBar::new(batches.len() as u64);
            pb.set_style(
                ProgressStyle::with_template("{spinner:.green} batch {pos}/{len} {wide_bar} {eta}")
                    .map(|s| s.progress_chars("=>-"))
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            Some(pb)
        } else {
            None
        };

        let mut tables = Vec::with_capacity(batches.len());
        for (i, batch) in batches.iter().enumerate() {
            tracing::info!("fetching batch {}/{}", i + 1, batches.len());
            let table = self.fetch_and_normalize(&apply_template(template, batch));
            // `[{}]` flattens to rows without columns; nothing to keep.
            if !table.is_empty() && !table.columns().is_empty() {
                tables.push(table);
            }
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        Table::concat(tables)
    }

    /// Looks up a project's id from its number (the identifier shown in the UI).
    pub fn project_id(&self, number: impl fmt::Display) -> Option<String> {
        let table = self.fetch_and_normalize(&format!("projects?number={}&fields=id,number", number));
        table.value(0, "id").and_then(value_to_plain_string)
    }

    /// Looks up a project's number from its id.
    pub fn project_number(&self, id: impl fmt::Display) -> Option<String> {
        let table = self.fetch_and_normalize(&format!("projects/{}?fields=number", id));
        table.value(0, "number").and_then(value_to_plain_string)
    }

    fn get(&self, url: &str) -> Result<HttpResponse> {
        if let Some(body) = self.cache.get(url) {
            tracing::trace!("cache hit: {}", url);
            return Ok(HttpResponse::new(StatusCode::OK.as_u16(), body));
        }

        let resp = self.transport.get(url, &self.headers)?;
        if resp.is_success() {
            self.cache.put(url, &resp.body);
        }
        Ok(resp)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if self.debug {
            eprintln!("Total Rentman API calls made: {}", self.api_call_count());
        }
    }
}

fn failure_message(resp: &HttpResponse, url: &str) -> String {
    match StatusCode::from_u16(resp.status) {
        Ok(status) => describe_failure(status, url, &resp.body),
        Err(_) => format!("HTTP {} for {}: {}", resp.status, url, resp.body.trim()),
    }
}
