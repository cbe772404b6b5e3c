//! The request interceptor and its injected capabilities.

use std::sync::Arc;

use raphael_client::Network;
use raphael_core::{CacheStorage, Error, Request, WorkerManifest};
use url::Url;

use crate::host::{Clients, Registration};

/// One deployed generation of the worker.
///
/// Lifecycle handlers live in [`crate::lifecycle`], fetch routing in
/// [`crate::router`], and the auxiliary signals in [`crate::signals`].
#[derive(Clone)]
pub struct Worker {
    pub(crate) manifest: WorkerManifest,
    pub(crate) scope: Url,
    pub(crate) cache: Arc<dyn CacheStorage>,
    pub(crate) network: Arc<dyn Network>,
    pub(crate) clients: Arc<dyn Clients>,
    pub(crate) registration: Arc<dyn Registration>,
}

impl Worker {
    pub fn new(
        manifest: WorkerManifest, scope: Url, cache: Arc<dyn CacheStorage>, network: Arc<dyn Network>,
        clients: Arc<dyn Clients>, registration: Arc<dyn Registration>,
    ) -> Self {
        Self { manifest, scope, cache, network, clients, registration }
    }

    pub fn manifest(&self) -> &WorkerManifest {
        &self.manifest
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    /// Name of the current cache generation.
    pub fn cache_name(&self) -> &str {
        &self.manifest.cache_name
    }

    pub fn cache(&self) -> &Arc<dyn CacheStorage> {
        &self.cache
    }

    /// A GET for a manifest path resolved against the scope.
    pub(crate) fn scoped_get(&self, path: &str) -> Result<Request, Error> {
        let url = raphael_client::resolve(&self.scope, path).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Request::get(url))
    }
}
