//! Fixed worker manifest.
//!
//! The generation name, offline document, precache list and bypass list ship
//! with each release of the worker. Bumping `CACHE_NAME` is what retires the
//! previous generation on the next activation.

use serde::{Deserialize, Serialize};

/// Current cache generation.
pub const CACHE_NAME: &str = "raphael-v3-cache";

/// Document served when a navigation fails offline.
pub const OFFLINE_URL: &str = "/raphael/raphael.html";

/// Assets cached at install time.
pub const PRECACHE_URLS: &[&str] = &[
    "/raphael/raphael.html",
    "/raphael/manifest.json",
    "/raphael/icon-192.png",
    "/raphael/icon-512.png",
];

/// Live-data hosts that always go to the network and are never cached.
///
/// `api.openmeteo` and `open-meteo.com` overlap; both are kept.
pub const BYPASS_DOMAINS: &[&str] = &[
    "api.groq.com",
    "openrouter.ai",
    "api.anthropic.com",
    "api.duckduckgo.com",
    "api.openmeteo",
    "open-meteo.com",
    "api.coingecko.com",
    "en.wikipedia.org",
    "api.pexels.com",
    "pixabay.com",
    "image.pollinations.ai",
    "tavily.com",
    "geocoding-api",
];

/// Tag carried by the connectivity-restored signal.
pub const SYNC_TAG: &str = "raphael-sync";

pub const NOTIFICATION_TITLE: &str = "Raphael AI";
pub const NOTIFICATION_BODY: &str = "New message from Raphael";
pub const NOTIFICATION_ICON: &str = "/raphael/icon-192.png";
pub const NOTIFICATION_BADGE: &str = "/raphael/icon-192.png";
pub const NOTIFICATION_VIBRATE: &[u32] = &[200, 100, 200];

/// Repeated notifications with this tag replace each other.
pub const NOTIFICATION_TAG: &str = "raphael-notification";

/// Everything the worker needs to know about one release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerManifest {
    pub cache_name: String,
    pub offline_url: String,
    pub precache_urls: Vec<String>,
    pub bypass_domains: Vec<String>,
    pub sync_tag: String,
    pub notification: NotificationDefaults,
}

/// Fallbacks and fixed presentation for push notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub tag: String,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: NOTIFICATION_TITLE.into(),
            body: NOTIFICATION_BODY.into(),
            icon: NOTIFICATION_ICON.into(),
            badge: NOTIFICATION_BADGE.into(),
            vibrate: NOTIFICATION_VIBRATE.to_vec(),
            tag: NOTIFICATION_TAG.into(),
        }
    }
}

impl Default for WorkerManifest {
    fn default() -> Self {
        Self {
            cache_name: CACHE_NAME.into(),
            offline_url: OFFLINE_URL.into(),
            precache_urls: PRECACHE_URLS.iter().map(|s| s.to_string()).collect(),
            bypass_domains: BYPASS_DOMAINS.iter().map(|s| s.to_string()).collect(),
            sync_tag: SYNC_TAG.into(),
            notification: NotificationDefaults::default(),
        }
    }
}

impl WorkerManifest {
    /// Same manifest under a different generation name.
    pub fn with_cache_name(mut self, cache_name: impl Into<String>) -> Self {
        self.cache_name = cache_name.into();
        self
    }
}
