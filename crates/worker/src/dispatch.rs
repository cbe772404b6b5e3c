//! Event dispatch.
//!
//! Every host event is routed through a table keyed by [`EventKind`]. A
//! handler either returns immediately (pass-through, unhandled kinds) or hands
//! back the work the host must wait on before treating the event as done.

use std::collections::HashMap;

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, ready};
use raphael_core::{Error, Request, Response};

use crate::host::Notification;
use crate::lifecycle::{ActivateReport, InstallReport};
use crate::router::Route;
use crate::worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Sync,
    Push,
}

/// A host lifecycle or network event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Sync { tag: String },
    Push { data: Option<Bytes> },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Install => EventKind::Install,
            Self::Activate => EventKind::Activate,
            Self::Fetch(_) => EventKind::Fetch,
            Self::Sync { .. } => EventKind::Sync,
            Self::Push { .. } => EventKind::Push,
        }
    }
}

/// What handling an event produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    /// The request was not intercepted; the host performs it unmodified.
    PassThrough,
    Responded(Response),
    Synced { acknowledged: bool },
    Notified(Notification),
    /// No handler is registered for the event's kind.
    Ignored,
}

/// Work the host waits on before the event counts as handled.
pub type Work<'a> = BoxFuture<'a, Result<Outcome, Error>>;

pub type Handler = for<'a> fn(&'a Worker, Event) -> Work<'a>;

/// Routes events to their handlers.
pub struct Dispatcher {
    worker: Worker,
    handlers: HashMap<EventKind, Handler>,
}

impl Dispatcher {
    /// A dispatcher with the standard handler for every event kind.
    pub fn new(worker: Worker) -> Self {
        let mut dispatcher = Self::empty(worker);
        dispatcher
            .on(EventKind::Install, on_install)
            .on(EventKind::Activate, on_activate)
            .on(EventKind::Fetch, on_fetch)
            .on(EventKind::Sync, on_sync)
            .on(EventKind::Push, on_push);
        dispatcher
    }

    /// A dispatcher that ignores every event until handlers are registered.
    pub fn empty(worker: Worker) -> Self {
        Self { worker, handlers: HashMap::new() }
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn on(&mut self, kind: EventKind, handler: Handler) -> &mut Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    pub fn dispatch(&self, event: Event) -> Work<'_> {
        let kind = event.kind();
        match self.handlers.get(&kind) {
            Some(handler) => handler(&self.worker, event),
            None => {
                tracing::debug!(?kind, "no handler registered");
                ready(Ok(Outcome::Ignored)).boxed()
            }
        }
    }
}

fn mismatched(expected: EventKind, got: EventKind) -> Work<'static> {
    tracing::warn!(?expected, ?got, "handler received foreign event");
    ready(Ok(Outcome::Ignored)).boxed()
}

fn on_install(worker: &Worker, event: Event) -> Work<'_> {
    if !matches!(event, Event::Install) {
        return mismatched(EventKind::Install, event.kind());
    }
    async move { worker.install().await.map(Outcome::Installed) }.boxed()
}

fn on_activate(worker: &Worker, event: Event) -> Work<'_> {
    if !matches!(event, Event::Activate) {
        return mismatched(EventKind::Activate, event.kind());
    }
    async move { worker.activate().await.map(Outcome::Activated) }.boxed()
}

fn on_fetch(worker: &Worker, event: Event) -> Work<'_> {
    let got = event.kind();
    let Event::Fetch(request) = event else {
        return mismatched(EventKind::Fetch, got);
    };

    match worker.route(&request) {
        Route::Bypass => {
            tracing::trace!(url = %request.url, "bypass");
            ready(Ok(Outcome::PassThrough)).boxed()
        }
        Route::Unhandled => ready(Ok(Outcome::PassThrough)).boxed(),
        Route::Cacheable => async move { worker.respond(&request).await.map(Outcome::Responded) }.boxed(),
    }
}

fn on_sync(worker: &Worker, event: Event) -> Work<'_> {
    let got = event.kind();
    let Event::Sync { tag } = event else {
        return mismatched(EventKind::Sync, got);
    };
    ready(Ok(Outcome::Synced { acknowledged: worker.sync(&tag) })).boxed()
}

fn on_push(worker: &Worker, event: Event) -> Work<'_> {
    let got = event.kind();
    let Event::Push { data } = event else {
        return mismatched(EventKind::Push, got);
    };
    async move { worker.push(data.as_deref()).await.map(Outcome::Notified) }.boxed()
}
