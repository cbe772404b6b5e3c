//! Request and response value types.
//!
//! These mirror the shape of fetch-API requests closely enough for routing
//! decisions (method, destination, mode) and for cache keying, without tying
//! the core crate to any HTTP client.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// HTTP request method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

impl std::str::FromStr for Method {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            other => Err(crate::Error::InvalidInput(format!("unsupported method: {other}"))),
        }
    }
}

/// What the requesting context intends to do with the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Unknown or fetch()/XHR.
    #[default]
    Empty,
    Document,
    Frame,
    Iframe,
    Image,
    Font,
    Manifest,
    Script,
    Style,
    Audio,
    Video,
    Worker,
}

/// Request mode, governing how cross-origin responses are exposed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    SameOrigin,
    NoCors,
    #[default]
    Cors,
    Navigate,
}

/// Response type as seen by the requesting page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    #[default]
    Basic,
    /// Cross-origin response exposed through CORS.
    Cors,
    /// Cross-origin `no-cors` response; status and body are not inspectable.
    Opaque,
    /// Network error placeholder.
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Cors => "cors",
            Self::Opaque => "opaque",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(Self::Basic),
            "cors" => Some(Self::Cors),
            "opaque" => Some(Self::Opaque),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// An outgoing request intercepted by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    /// Header names are stored lowercased.
    pub headers: BTreeMap<String, String>,
    pub destination: Destination,
    pub mode: RequestMode,
}

impl Request {
    /// A plain GET with no headers.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::Get,
            headers: BTreeMap::new(),
            destination: Destination::Empty,
            mode: RequestMode::Cors,
        }
    }

    /// A top-level navigation to `url`.
    pub fn navigate(url: Url) -> Self {
        Self { destination: Destination::Document, mode: RequestMode::Navigate, ..Self::get(url) }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// A response, either fetched from the network or read back from cache.
///
/// The body is a `Bytes` handle, so cloning yields an independent copy that
/// can be persisted without consuming the caller's body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub status_text: String,
    /// Header names are stored lowercased.
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    pub response_type: ResponseType,
}

impl Response {
    pub fn new(url: Url, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url,
            status,
            status_text: status_text_for(status).to_string(),
            headers: BTreeMap::new(),
            body: body.into(),
            response_type: ResponseType::Basic,
        }
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Status in the 200-299 range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header names listed in `Vary`, lowercased. `*` is returned verbatim.
    pub fn vary(&self) -> Vec<String> {
        vary_names(&self.headers)
    }
}

/// Header names listed in the `Vary` entry of a lowercased header map.
pub fn vary_names(headers: &BTreeMap<String, String>) -> Vec<String> {
    headers
        .get("vary")
        .map(|v| {
            v.split(',')
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn status_text_for(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
