//! Request classification.

use raphael_core::{Method, Request};
use url::Url;

/// How the router treats an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Live-data endpoint; let it through and never touch the cache.
    Bypass,
    /// Safe read of an application asset; cache-first.
    Cacheable,
    /// Side-effecting method; not intercepted.
    Unhandled,
}

/// Whether `url`'s hostname, or host with port, contains any bypass pattern.
///
/// Empty patterns are ignored rather than matching every host.
pub fn is_bypass<S: AsRef<str>>(url: &Url, domains: &[S]) -> bool {
    let hostname = url.host_str().unwrap_or_default();
    let host = match url.port() {
        Some(port) => format!("{hostname}:{port}"),
        None => hostname.to_string(),
    };

    domains
        .iter()
        .map(S::as_ref)
        .filter(|pattern| !pattern.is_empty())
        .any(|pattern| hostname.contains(pattern) || host.contains(pattern))
}

pub fn classify<S: AsRef<str>>(request: &Request, domains: &[S]) -> Route {
    if is_bypass(&request.url, domains) {
        Route::Bypass
    } else if request.method == Method::Get {
        Route::Cacheable
    } else {
        Route::Unhandled
    }
}
