//! The raphael-sw request interceptor.
//!
//! A [`Worker`] precaches the application shell on install, drops stale cache
//! generations on activate, and answers fetches cache-first with an offline
//! document for failed navigations. Hosts drive it through a [`Dispatcher`];
//! the `raphael-sw` binary does so over JSON lines on stdio.

pub mod dispatch;
pub mod host;
pub mod lifecycle;
pub mod router;
pub mod signals;
pub mod stdio;
pub mod worker;

#[cfg(test)]
mod testing;

pub use dispatch::{Dispatcher, Event, EventKind, Handler, Outcome, Work};
pub use host::{Clients, Notification, Registration};
pub use lifecycle::{ActivateReport, FailedAsset, InstallReport};
pub use router::Route;
pub use signals::PushPayload;
pub use stdio::{HostCall, StdioHost, WireEvent, WireOutcome};
pub use worker::Worker;
