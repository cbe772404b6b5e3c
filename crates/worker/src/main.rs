//! raphael-sw entry point.
//!
//! Drives the worker from JSON-line events on stdin and writes outcomes to stdout.
//! Logging goes to stderr to avoid interfering with the protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use raphael_client::{FetchConfig, HttpNetwork};
use raphael_core::{AppConfig, CacheDb, CacheStorage, MemoryCache, WorkerManifest};
use raphael_worker::{Dispatcher, StdioHost, Worker, stdio};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let scope = config.scope_url()?;

    let cache: Arc<dyn CacheStorage> = if config.in_memory {
        Arc::new(MemoryCache::new())
    } else {
        Arc::new(CacheDb::open(&config.db_path).await?)
    };

    let network = HttpNetwork::new(FetchConfig {
        scope: scope.clone(),
        user_agent: config.user_agent.clone(),
        timeout: config.timeout(),
        max_redirects: config.max_redirects,
    })?;

    let (host, mut calls) = StdioHost::channel();
    let host = Arc::new(host);
    let worker = Worker::new(WorkerManifest::default(), scope, cache, Arc::new(network), host.clone(), host);
    let dispatcher = Dispatcher::new(worker);

    tracing::info!(
        scope = %dispatcher.worker().scope(),
        cache = dispatcher.worker().cache_name(),
        in_memory = config.in_memory,
        "Starting raphael-sw on stdio"
    );

    stdio::run(&dispatcher, BufReader::new(tokio::io::stdin()), tokio::io::stdout(), &mut calls).await?;

    Ok(())
}
