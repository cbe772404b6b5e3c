//! Request-addressed cache key generation.

use sha2::{Digest, Sha256};

use crate::http::Request;

/// Compute the cache key for a method and URL.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cache key for a request. Responses carrying `Vary` may store several
/// entries under one key. Fragments never reach the server, so they do not
/// distinguish entries.
pub fn request_key(request: &Request) -> String {
    compute_cache_key(request.method.as_str(), keyed_url(request).as_str())
}

/// The request URL as stored in the cache, without fragment.
pub fn keyed_url(request: &Request) -> url::Url {
    let mut url = request.url.clone();
    url.set_fragment(None);
    url
}
