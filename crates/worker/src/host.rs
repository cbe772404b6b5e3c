//! Host capabilities the worker calls out to.
//!
//! Cache storage and the network have their own seams in `raphael-core` and
//! `raphael-client`; the remaining platform primitives live here.

use async_trait::async_trait;
use raphael_core::Error;
use serde::Serialize;

/// Control over the pages the worker serves.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Take control of every open client without waiting for a reload.
    async fn claim(&self) -> Result<(), Error>;
}

/// The worker's registration with its host.
#[async_trait]
pub trait Registration: Send + Sync {
    /// Let this worker replace the active one without waiting for open
    /// clients to close.
    async fn skip_waiting(&self) -> Result<(), Error>;

    /// Display a user-visible notification. Resolves once it is shown.
    async fn show_notification(&self, notification: &Notification) -> Result<(), Error>;
}

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    /// Notifications sharing a tag replace each other.
    pub tag: String,
}
