//! Scripted network and recording host for worker tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use raphael_client::Network;
use raphael_core::{Error, MemoryCache, Request, Response, WorkerManifest};
use url::Url;

use crate::host::{Clients, Notification, Registration};
use crate::worker::Worker;

pub const SCOPE: &str = "https://raphael.example/";

/// Absolute URL for a path under the test scope.
pub fn at(path: &str) -> String {
    format!("https://raphael.example{path}")
}

pub fn ok_response(url: &str, body: &'static str) -> Response {
    Response::new(Url::parse(url).unwrap(), 200, body)
}

/// Network that answers from a script; unscripted URLs fail as if offline.
#[derive(Default)]
pub struct MockNetwork {
    responses: Mutex<HashMap<String, Response>>,
    calls: AtomicUsize,
}

impl MockNetwork {
    pub fn respond(&self, url: &str, response: Response) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn respond_status(&self, url: &str, status: u16) {
        self.respond(url, Response::new(Url::parse(url).unwrap(), status, ""));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| Error::Network(format!("offline: {}", request.url)))
    }
}

/// Host that records every capability call.
#[derive(Default)]
pub struct RecordingHost {
    skip_waiting: AtomicUsize,
    claims: AtomicUsize,
    notifications: Mutex<Vec<Notification>>,
    reject_skip_waiting: AtomicBool,
}

impl RecordingHost {
    pub fn skip_waiting_calls(&self) -> usize {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn claim_calls(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn reject_skip_waiting(&self) {
        self.reject_skip_waiting.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clients for RecordingHost {
    async fn claim(&self) -> Result<(), Error> {
        self.claims.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Registration for RecordingHost {
    async fn skip_waiting(&self) -> Result<(), Error> {
        if self.reject_skip_waiting.load(Ordering::SeqCst) {
            return Err(Error::Host("skip_waiting rejected".into()));
        }
        self.skip_waiting.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<(), Error> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// A worker wired to an in-memory cache, a scripted network and a recording
/// host, with handles to all three.
pub struct Harness {
    pub worker: Worker,
    pub cache: MemoryCache,
    pub network: Arc<MockNetwork>,
    pub host: Arc<RecordingHost>,
}

impl Harness {
    pub fn new(scope: &str) -> Self {
        let cache = MemoryCache::new();
        let network = Arc::new(MockNetwork::default());
        let host = Arc::new(RecordingHost::default());
        let worker = Worker::new(
            WorkerManifest::default(),
            Url::parse(scope).unwrap(),
            Arc::new(cache.clone()),
            network.clone(),
            host.clone(),
            host.clone(),
        );
        Self { worker, cache, network, host }
    }

    /// Another generation sharing this harness's cache, network and host.
    pub fn with_cache_name(&self, cache_name: &str) -> Worker {
        Worker::new(
            self.worker.manifest().clone().with_cache_name(cache_name),
            self.worker.scope().clone(),
            Arc::new(self.cache.clone()),
            self.network.clone(),
            self.host.clone(),
            self.host.clone(),
        )
    }
}
