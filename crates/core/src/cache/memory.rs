//! In-memory cache storage.
//!
//! Uses a tokio RwLock around an insertion-ordered list of named caches, so
//! `keys` and `entries` report creation order the same way the SQLite
//! backend does.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheStorage, ensure_storable, hash, vary_matches};
use crate::Error;
use crate::http::{Request, Response};

#[derive(Debug, Clone)]
struct StoredEntry {
    key: String,
    url: String,
    request_headers: BTreeMap<String, String>,
    response: Response,
}

impl StoredEntry {
    fn answers(&self, request: &Request) -> bool {
        vary_matches(&self.request_headers, &self.response.vary(), request)
    }
}

#[derive(Debug, Default)]
struct NamedCache {
    name: String,
    entries: Vec<StoredEntry>,
}

/// Process-local [`CacheStorage`]. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    caches: Arc<RwLock<Vec<NamedCache>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCache {
    async fn open(&self, cache_name: &str) -> Result<(), Error> {
        let mut caches = self.caches.write().await;
        if !caches.iter().any(|c| c.name == cache_name) {
            caches.push(NamedCache { name: cache_name.to_string(), entries: Vec::new() });
        }
        Ok(())
    }

    async fn match_request(&self, cache_name: &str, request: &Request) -> Result<Option<Response>, Error> {
        let key = hash::request_key(request);
        let caches = self.caches.read().await;
        let found = caches
            .iter()
            .find(|c| c.name == cache_name)
            .and_then(|c| c.entries.iter().find(|e| e.key == key && e.answers(request)))
            .map(|e| e.response.clone());
        Ok(found)
    }

    async fn put(&self, cache_name: &str, request: &Request, response: &Response) -> Result<(), Error> {
        ensure_storable(request)?;

        let entry = StoredEntry {
            key: hash::request_key(request),
            url: hash::keyed_url(request).to_string(),
            request_headers: request.headers.clone(),
            response: response.clone(),
        };

        let mut caches = self.caches.write().await;
        let index = match caches.iter().position(|c| c.name == cache_name) {
            Some(i) => i,
            None => {
                caches.push(NamedCache { name: cache_name.to_string(), entries: Vec::new() });
                caches.len() - 1
            }
        };
        let cache = &mut caches[index];
        cache.entries.retain(|e| !(e.key == entry.key && e.answers(request)));
        cache.entries.push(entry);
        Ok(())
    }

    async fn delete(&self, cache_name: &str) -> Result<bool, Error> {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|c| c.name != cache_name);
        Ok(caches.len() != before)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let caches = self.caches.read().await;
        Ok(caches.iter().map(|c| c.name.clone()).collect())
    }

    async fn entries(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        let caches = self.caches.read().await;
        Ok(caches
            .iter()
            .find(|c| c.name == cache_name)
            .map(|c| c.entries.iter().map(|e| e.url.clone()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use url::Url;

    fn request(path: &str) -> Request {
        Request::get(Url::parse(&format!("https://app.test{path}")).unwrap())
    }

    fn response(path: &str, body: &'static str) -> Response {
        Response::new(Url::parse(&format!("https://app.test{path}")).unwrap(), 200, body)
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let cache = MemoryCache::new();
        cache.put("v1", &request("/a.js"), &response("/a.js", "a")).await.unwrap();

        let hit = cache.match_request("v1", &request("/a.js")).await.unwrap().unwrap();
        assert_eq!(&hit.body[..], b"a");
        assert!(cache.match_request("v1", &request("/b.js")).await.unwrap().is_none());
        assert!(cache.match_request("v2", &request("/a.js")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = MemoryCache::new();
        cache.put("v1", &request("/a.js"), &response("/a.js", "old")).await.unwrap();
        cache.put("v1", &request("/a.js"), &response("/a.js", "new")).await.unwrap();

        assert_eq!(cache.entries("v1").await.unwrap().len(), 1);
        let hit = cache.match_request("v1", &request("/a.js")).await.unwrap().unwrap();
        assert_eq!(&hit.body[..], b"new");
    }

    #[tokio::test]
    async fn test_vary_variants_coexist() {
        let cache = MemoryCache::new();
        let en = request("/raphael/raphael.html").with_header("Accept-Language", "en");
        let fr = request("/raphael/raphael.html").with_header("Accept-Language", "fr");
        let varied = |body| response("/raphael/raphael.html", body).with_header("Vary", "Accept-Language");

        cache.put("v1", &en, &varied("hello")).await.unwrap();
        cache.put("v1", &fr, &varied("bonjour")).await.unwrap();

        let hit = cache.match_request("v1", &en).await.unwrap().unwrap();
        assert_eq!(&hit.body[..], b"hello");
        let hit = cache.match_request("v1", &fr).await.unwrap().unwrap();
        assert_eq!(&hit.body[..], b"bonjour");
        assert_eq!(cache.entries("v1").await.unwrap().len(), 2);

        cache.put("v1", &en, &varied("hi")).await.unwrap();
        let hit = cache.match_request("v1", &en).await.unwrap().unwrap();
        assert_eq!(&hit.body[..], b"hi");
        assert_eq!(cache.entries("v1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_puts_last_write_wins() {
        let cache = MemoryCache::new();
        let (req_a, resp_a) = (request("/a.js"), response("/a.js", "first"));
        let (req_b, resp_b) = (request("/a.js"), response("/a.js", "second"));
        let (a, b) = tokio::join!(
            cache.put("v1", &req_a, &resp_a),
            cache.put("v1", &req_b, &resp_b),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(cache.entries("v1").await.unwrap(), vec!["https://app.test/a.js"]);
        let hit = cache.match_request("v1", &request("/a.js")).await.unwrap().unwrap();
        assert!(&hit.body[..] == b"first" || &hit.body[..] == b"second");
    }

    #[tokio::test]
    async fn test_put_rejects_post() {
        let cache = MemoryCache::new();
        let post = request("/submit").with_method(Method::Post);
        assert!(cache.put("v1", &post, &response("/submit", "")).await.is_err());
        assert!(cache.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keys_in_creation_order_and_delete() {
        let cache = MemoryCache::new();
        cache.open("v2").await.unwrap();
        cache.open("v1").await.unwrap();
        cache.open("v2").await.unwrap();
        assert_eq!(cache.keys().await.unwrap(), vec!["v2", "v1"]);

        assert!(cache.delete("v2").await.unwrap());
        assert!(!cache.delete("v2").await.unwrap());
        assert_eq!(cache.keys().await.unwrap(), vec!["v1"]);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let cache = MemoryCache::new();
        let other = cache.clone();
        cache.put("v1", &request("/a.js"), &response("/a.js", "a")).await.unwrap();
        assert_eq!(other.entries("v1").await.unwrap(), vec!["https://app.test/a.js"]);
    }
}
