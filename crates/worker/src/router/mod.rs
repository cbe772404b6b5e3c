//! Fetch routing.
//!
//! ### Classification
//! - Hosts matching the bypass list always go to the network, untouched.
//! - GET requests for everything else are cache-first.
//! - Other methods are not intercepted.
//!
//! ### Cache-first
//! - A hit in the current generation is returned without touching the network.
//! - A miss goes to the network; a `200` same-origin response is stored before
//!   being returned. Opaque and CORS responses are returned but never stored.
//! - When the network fails, document requests get the offline document;
//!   everything else gets the error.

pub mod classify;

pub use classify::{Route, classify, is_bypass};

use raphael_core::{Destination, Error, Request, Response, ResponseType};

use crate::worker::Worker;

impl Worker {
    /// Classify a request against this generation's bypass list.
    pub fn route(&self, request: &Request) -> Route {
        classify(request, &self.manifest.bypass_domains)
    }

    /// Answer a cacheable request, cache-first.
    pub async fn respond(&self, request: &Request) -> Result<Response, Error> {
        let cache_name = self.cache_name();

        if let Some(cached) = self.cache.match_request(cache_name, request).await? {
            tracing::debug!("cache hit for {}", request.url);
            return Ok(cached);
        }

        tracing::debug!("cache miss for {}", request.url);

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200
                    && response.response_type == ResponseType::Basic
                    && let Err(e) = self.cache.put(cache_name, request, &response).await
                {
                    tracing::warn!(url = %request.url, error = %e, "failed to cache response");
                }
                Ok(response)
            }
            Err(e) if request.destination == Destination::Document => {
                tracing::debug!(url = %request.url, error = %e, "navigation failed, serving offline document");
                self.offline_fallback().await
            }
            Err(e) => Err(e),
        }
    }

    async fn offline_fallback(&self) -> Result<Response, Error> {
        let request = self.scoped_get(&self.manifest.offline_url)?;
        self.cache
            .match_request(self.cache_name(), &request)
            .await?
            .ok_or_else(|| Error::OfflineFallbackMissing(request.url.to_string()))
    }
}
