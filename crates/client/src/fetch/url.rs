//! URL canonicalization, scope resolution and origin checks.

use raphael_core::{RequestMode, ResponseType};

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize an absolute URL string for consistent cache keys.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Lowercase the host
/// 3. Remove fragment (#...)
/// 4. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve a path or URL against the worker scope.
///
/// Absolute URLs replace the scope entirely; anything else (`/raphael/x.png`,
/// `icon.png`, `/share?u=https://...`) is joined onto it.
pub fn resolve(scope: &url::Url, input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }
    let joined = scope.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    canonicalize(joined.as_str())
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &url::Url, b: &url::Url) -> bool {
    a.origin() == b.origin()
}

/// Response type the requesting page would observe for a response served
/// from `final_url`.
///
/// Same-origin responses are `basic`. Cross-origin responses are `opaque`
/// when the request was made in `no-cors` mode and `cors` otherwise.
pub fn response_type_for(scope: &url::Url, mode: RequestMode, final_url: &url::Url) -> ResponseType {
    if same_origin(scope, final_url) {
        ResponseType::Basic
    } else if mode == RequestMode::NoCors {
        ResponseType::Opaque
    } else {
        ResponseType::Cors
    }
}
