//! Network fetch for requests the worker forwards.
//!
//! ### Network seam
//! - The worker only sees the [`Network`] trait; tests script it.
//! - [`HttpNetwork`] is the reqwest implementation used by the binary.
//!
//! ### Response handling
//! - Any HTTP status is a response, not an error. Only transport failures
//!   (offline, DNS, refused, timeout) become `Error::Network`.
//! - Responses are typed `basic`/`cors`/`opaque` relative to the worker scope
//!   so the router can refuse to cache cross-origin content.

pub mod url;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use raphael_core::{Error, Method, Request, Response};
use reqwest::{Client, header};

pub use self::url::{UrlError, canonicalize, resolve, response_type_for, same_origin};

/// Performs network fetches on behalf of the worker.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetch `request` from the network.
    ///
    /// # Errors
    ///
    /// Returns `Error::Network` when no response could be obtained at all.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Origin and base path the worker controls.
    pub scope: ::url::Url,

    /// User agent string (default: "raphael-sw/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    pub fn new(scope: ::url::Url) -> Self {
        Self {
            scope,
            user_agent: "raphael-sw/0.1".to_string(),
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// reqwest-backed [`Network`].
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

impl HttpNetwork {
    /// Create a new HTTP network with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

fn collect_headers(headers: &header::HeaderMap) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            out.entry(name.as_str().to_ascii_lowercase())
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
    }
    out
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let mut builder = self.http.request(to_reqwest_method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Network(format!("timed out fetching {}", request.url))
            } else {
                Error::Network(format!("network error: {}", e))
            }
        })?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = collect_headers(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        let response_type = response_type_for(&self.config.scope, request.mode, &final_url);

        tracing::debug!(
            "fetched {} -> {} status {} ({:?}) in {}ms ({} bytes)",
            request.url,
            final_url,
            status.as_u16(),
            response_type,
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response {
            url: final_url,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            response_type,
        })
    }
}
