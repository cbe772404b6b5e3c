//! Named response caches.
//!
//! A cache storage holds any number of named caches (one per worker
//! generation); each cache maps a request to the last response stored for it.
//! Two backends implement [`CacheStorage`]:
//!
//! - [`CacheDb`]: persistent SQLite storage via tokio-rusqlite, with WAL mode
//!   and automatic schema migrations
//! - [`MemoryCache`]: process-local storage for tests and ephemeral hosts
//!
//! Matching follows the platform cache: method and fragment-less URL select
//! the entry, then any headers named by the stored response's `Vary` must
//! agree between the stored and the incoming request.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;

use std::collections::BTreeMap;

use async_trait::async_trait;

pub use crate::Error;
use crate::http::{Method, Request, Response};

pub use connection::CacheDb;
pub use memory::MemoryCache;

/// Keyed persistent response cache addressable by name.
///
/// Entries are immutable values: `put` replaces, it never patches. A URL may
/// hold several entries when its responses carry `Vary`; `put` replaces only
/// the entries the incoming request would match.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named cache if it does not exist.
    async fn open(&self, cache_name: &str) -> Result<(), Error>;

    /// Look up `request` in the named cache.
    ///
    /// A missing cache is a miss, not an error.
    async fn match_request(&self, cache_name: &str, request: &Request) -> Result<Option<Response>, Error>;

    /// Store `response` for `request`, creating the cache if needed.
    async fn put(&self, cache_name: &str, request: &Request, response: &Response) -> Result<(), Error>;

    /// Delete the named cache and all of its entries.
    ///
    /// Returns whether a cache was deleted.
    async fn delete(&self, cache_name: &str) -> Result<bool, Error>;

    /// Names of all caches, in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Request URLs stored in the named cache, in insertion order.
    async fn entries(&self, cache_name: &str) -> Result<Vec<String>, Error>;
}

/// Only GET requests may be stored.
pub(crate) fn ensure_storable(request: &Request) -> Result<(), Error> {
    if request.method == Method::Get {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("cannot cache {} request", request.method.as_str())))
    }
}

/// Whether a stored entry may answer `request`, given the header names its
/// response varies on.
pub(crate) fn vary_matches(
    stored_request_headers: &BTreeMap<String, String>, vary: &[String], request: &Request,
) -> bool {
    vary.iter().all(|name| {
        if name == "*" {
            return false;
        }
        stored_request_headers.get(name).map(String::as_str) == request.header(name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn url() -> Url {
        Url::parse("https://app.test/raphael/raphael.html").unwrap()
    }

    #[test]
    fn test_vary_absent_always_matches() {
        let response = Response::new(url(), 200, "doc");
        let request = Request::get(url()).with_header("accept-language", "fr");
        assert!(vary_matches(&BTreeMap::new(), &response.vary(), &request));
    }

    #[test]
    fn test_vary_header_must_agree() {
        let response = Response::new(url(), 200, "doc").with_header("Vary", "Accept-Language");
        let stored = Request::get(url()).with_header("Accept-Language", "en").headers;

        assert!(vary_matches(&stored, &response.vary(), &Request::get(url()).with_header("accept-language", "en")));
        assert!(!vary_matches(&stored, &response.vary(), &Request::get(url()).with_header("accept-language", "fr")));
        assert!(!vary_matches(&stored, &response.vary(), &Request::get(url())));
    }

    #[test]
    fn test_vary_star_never_matches() {
        let response = Response::new(url(), 200, "doc").with_header("Vary", "*");
        assert!(!vary_matches(&BTreeMap::new(), &response.vary(), &Request::get(url())));
    }

    #[test]
    fn test_only_get_is_storable() {
        assert!(ensure_storable(&Request::get(url())).is_ok());
        assert!(ensure_storable(&Request::get(url()).with_method(Method::Post)).is_err());
        assert!(ensure_storable(&Request::get(url()).with_method(Method::Head)).is_err());
    }
}
