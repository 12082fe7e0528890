use std::thread;
use std::time::Duration;

use ndarray::Array2;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RemoteOptions;
use crate::consts::{RETRY_INITIAL_BACKOFF_MS, RETRY_MAX_BACKOFF_MS};
use crate::error::{Result, ScanviewError};

use super::remote::ArrayStore;

/// One page of a Tiled `/api/v1/search` response.
#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    data: Vec<SearchEntry>,
    #[serde(default)]
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    next: Option<String>,
}

/// Blocking client bound to one node of a Tiled server.
///
/// `connect` accepts either a full API URI
/// (`http://host:8000/api/v1/metadata/raw/scans`) or a bare node URI
/// (`http://host:8000/raw/scans`).
#[derive(Clone, Debug)]
pub struct TiledClient {
    http: Client,
    root: Url,
    path: Vec<String>,
    api_key: String,
    options: RemoteOptions,
    uri: String,
}

impl TiledClient {
    pub fn connect(uri: &str, api_key: &str, options: &RemoteOptions) -> Result<Self> {
        let (root, path) = split_uri(uri)?;
        let http = Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("scatterview/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScanviewError::Remote {
                url: uri.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            root,
            path,
            api_key: api_key.to_string(),
            options: options.clone(),
            uri: uri.to_string(),
        })
    }

    /// Node path below the server root.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Client for a descendant node; `key` may contain `/`.
    pub fn child(&self, key: &str) -> Self {
        let mut client = self.clone();
        client
            .path
            .extend(key.split('/').filter(|s| !s.is_empty()).map(str::to_string));
        client
    }

    /// URL of `route` (e.g. `["array", "full"]`) for this node.
    pub fn endpoint(&self, route: &[&str]) -> Result<Url> {
        let mut url = self.root.clone();
        url.path_segments_mut()
            .map_err(|_| ScanviewError::InvalidConfig(format!("Store URI '{}' has no path", self.uri)))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(route)
            .extend(&self.path);
        Ok(url)
    }

    fn list_children(&self) -> Result<Vec<String>> {
        let mut first = self.endpoint(&["search"])?;
        first
            .query_pairs_mut()
            .append_pair("page[offset]", "0")
            .append_pair("page[limit]", &self.options.page_size.to_string());

        let mut ids = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            let page: SearchPage = self.get_json(&url)?;
            if page.data.is_empty() {
                break;
            }
            ids.extend(page.data.into_iter().map(|e| e.id));
            next = match page.links.and_then(|l| l.next) {
                Some(link) => {
                    let parsed = Url::parse(&link).map_err(|e| ScanviewError::Remote {
                        url: url.to_string(),
                        message: format!("bad next link '{link}': {e}"),
                    })?;
                    (parsed != url).then_some(parsed)
                }
                None => None,
            };
        }
        debug!(uri = %self.uri, count = ids.len(), "Listed store children");
        Ok(ids)
    }

    fn read_node(&self) -> Result<Array2<f64>> {
        let url = self.endpoint(&["array", "full"])?;
        let value: Value = self.get_json(&url)?;
        array_from_json(&value)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        with_retry(self.options.retries, url.as_str(), || {
            debug!(url = %url, "GET");
            let mut request = self
                .http
                .get(url.clone())
                .header(ACCEPT, "application/json");
            if !self.api_key.is_empty() {
                request = request.header(AUTHORIZATION, format!("Apikey {}", self.api_key));
            }
            let response = request.send().map_err(|e| transport_error(url, e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ScanviewError::Remote {
                    url: url.to_string(),
                    message: format!("HTTP {status}"),
                });
            }
            response.json::<T>().map_err(|e| transport_error(url, e))
        })
    }
}

impl ArrayStore for TiledClient {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn list_scan_options(&self) -> Result<Vec<String>> {
        self.list_children()
    }

    fn read(&self) -> Result<Array2<f64>> {
        self.read_node()
    }

    fn read_child(&self, key: &str) -> Result<Array2<f64>> {
        self.child(key).read_node()
    }
}

fn transport_error(url: &Url, err: reqwest::Error) -> ScanviewError {
    if err.is_timeout() {
        ScanviewError::Timeout {
            url: url.to_string(),
        }
    } else {
        ScanviewError::Remote {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Split a store URI into the server root and the node path.
fn split_uri(uri: &str) -> Result<(Url, Vec<String>)> {
    let url = Url::parse(uri)
        .map_err(|e| ScanviewError::InvalidConfig(format!("Invalid store URI '{uri}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ScanviewError::InvalidConfig(format!(
            "Store URI '{uri}' must be http or https"
        )));
    }

    let segments: Vec<String> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    let (prefix, path) = match segments.windows(2).position(|w| w[0] == "api" && w[1] == "v1") {
        Some(i) => {
            // Drop the route: "metadata", "node", or "array" plus its sub-route.
            let rest = match segments[i + 2..].split_first() {
                Some((route, tail)) if route == "array" && !tail.is_empty() => &tail[1..],
                Some((_, tail)) => tail,
                None => &[][..],
            };
            (&segments[..i], rest)
        }
        None => (&[][..], &segments[..]),
    };

    let mut root = url.clone();
    root.set_query(None);
    root.set_fragment(None);
    root.path_segments_mut()
        .map_err(|_| ScanviewError::InvalidConfig(format!("Store URI '{uri}' has no path")))?
        .clear()
        .extend(prefix);
    Ok((root, path.to_vec()))
}

/// Convert a nested JSON list into a 2-D array.
///
/// A leading axis of length 1 is squeezed away; `null` becomes NaN.
pub fn array_from_json(value: &Value) -> Result<Array2<f64>> {
    let rows = value
        .as_array()
        .ok_or_else(|| ScanviewError::InvalidArray("expected a JSON array".into()))?;

    if let [only] = rows.as_slice() {
        let nested = only
            .as_array()
            .and_then(|inner| inner.first())
            .is_some_and(Value::is_array);
        if nested {
            return array_from_json(only);
        }
    }

    let height = rows.len();
    let width = rows.first().and_then(Value::as_array).map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(height * width);
    for (r, row) in rows.iter().enumerate() {
        let row = row
            .as_array()
            .ok_or_else(|| ScanviewError::InvalidArray(format!("row {r} is not an array")))?;
        if row.len() != width {
            return Err(ScanviewError::InvalidArray(format!(
                "row {r} has {} columns, expected {width}",
                row.len()
            )));
        }
        for v in row {
            let x = match v {
                Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
                Value::Bool(b) => f64::from(u8::from(*b)),
                Value::Null => f64::NAN,
                other => {
                    return Err(ScanviewError::InvalidArray(format!(
                        "non-numeric element {other} in row {r}"
                    )))
                }
            };
            flat.push(x);
        }
    }
    Array2::from_shape_vec((height, width), flat)
        .map_err(|e| ScanviewError::InvalidArray(e.to_string()))
}

/// Run `op`, repeating it up to `retries` more times with exponential backoff
/// while it fails with a retryable error.
pub fn with_retry<T>(retries: u32, call: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut backoff = Duration::from_millis(RETRY_INITIAL_BACKOFF_MS);
    let mut attempt = 0;
    loop {
        match op() {
            Err(e) if attempt < retries && e.is_retryable() => {
                attempt += 1;
                warn!(
                    call,
                    attempt,
                    error = %e,
                    backoff_ms = backoff.as_millis() as u64,
                    "Retrying remote call"
                );
                thread::sleep(backoff);
                backoff = (backoff * 2).min(Duration::from_millis(RETRY_MAX_BACKOFF_MS));
            }
            other => return other,
        }
    }
}
