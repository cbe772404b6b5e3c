//! Install and activate handlers.
//!
//! Install populates the current generation from the precache list and then
//! asks to replace the active worker. Activate removes every other generation
//! and claims open clients.

use futures_util::future::join_all;
use raphael_core::Error;
use serde::Serialize;

use crate::worker::Worker;

/// Result of an install pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// Manifest paths now present in the current generation.
    pub cached: Vec<String>,
    /// Manifest paths that could not be stored.
    pub failed: Vec<FailedAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAsset {
    pub path: String,
    pub reason: String,
}

/// Result of an activation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    /// Stale generations that were deleted.
    pub deleted: Vec<String>,
}

impl Worker {
    /// Populate the current generation and skip waiting.
    ///
    /// Individual precache failures are logged and reported, never returned
    /// as errors. Failing to open the cache or to skip waiting is an error.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let cache_name = self.cache_name();
        self.cache.open(cache_name).await?;

        let results = join_all(self.manifest.precache_urls.iter().map(|path| self.precache(path))).await;

        let mut report = InstallReport::default();
        for (path, result) in self.manifest.precache_urls.iter().zip(results) {
            match result {
                Ok(()) => report.cached.push(path.clone()),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "cache install warning");
                    report.failed.push(FailedAsset { path: path.clone(), reason: e.to_string() });
                }
            }
        }

        tracing::info!(
            cache = cache_name,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "install complete"
        );

        self.registration.skip_waiting().await?;
        Ok(report)
    }

    async fn precache(&self, path: &str) -> Result<(), Error> {
        let request = self.scoped_get(path)?;
        let response = self.network.fetch(&request).await?;
        if !response.ok() {
            return Err(Error::HttpError(format!("{} returned status {}", request.url, response.status)));
        }
        self.cache.put(self.cache_name(), &request, &response).await
    }

    /// Delete every generation except the current one, then claim clients.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let current = self.cache_name();
        let stale: Vec<String> = self
            .cache
            .keys()
            .await?
            .into_iter()
            .filter(|name| name != current)
            .collect();

        let results = join_all(stale.iter().map(|name| self.cache.delete(name))).await;
        for result in results {
            result?;
        }

        for name in &stale {
            tracing::info!(cache = %name, "deleted stale cache generation");
        }

        self.clients.claim().await?;
        tracing::info!(cache = current, "activated");

        Ok(ActivateReport { deleted: stale })
    }
}
