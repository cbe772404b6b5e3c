//! JSON-lines host protocol.
//!
//! Each input line is one event, each output line one result. Host capability
//! calls made while handling an event are written before that event's
//! outcome, so a reader sees them in the order the worker made them.
//!
//! ```text
//! <- {"type":"fetch","url":"/raphael/raphael.html","destination":"document"}
//! -> {"outcome":"response","status":200,"type":"basic",...}
//! <- {"type":"push","data":"{\"title\":\"Hi\"}"}
//! -> {"outcome":"host","call":"show_notification","title":"Hi",...}
//! -> {"outcome":"notified","title":"Hi",...}
//! ```

use std::collections::BTreeMap;
use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use raphael_core::{Destination, Error, Method, Request, RequestMode, Response};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use url::Url;

use crate::dispatch::{Dispatcher, Event, Outcome};
use crate::host::{Clients, Notification, Registration};
use crate::lifecycle::{ActivateReport, InstallReport};

/// An event as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireEvent {
    Install,
    Activate,
    Fetch {
        /// Absolute, or relative to the worker scope.
        url: String,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        destination: Option<Destination>,
        /// Defaults to `navigate` for documents and `cors` otherwise.
        #[serde(default)]
        mode: Option<RequestMode>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    Sync {
        tag: String,
    },
    Push {
        #[serde(default)]
        data: Option<String>,
    },
}

impl WireEvent {
    pub fn into_event(self, scope: &Url) -> Result<Event, Error> {
        Ok(match self {
            Self::Install => Event::Install,
            Self::Activate => Event::Activate,
            Self::Fetch { url, method, destination, mode, headers } => {
                let url = raphael_client::resolve(scope, &url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
                let method = method.as_deref().map(str::parse::<Method>).transpose()?.unwrap_or(Method::Get);
                let destination = destination.unwrap_or_default();
                let mode = mode.unwrap_or(match destination {
                    Destination::Document => RequestMode::Navigate,
                    _ => RequestMode::Cors,
                });

                let request = headers.into_iter().fold(
                    Request::get(url).with_method(method).with_destination(destination).with_mode(mode),
                    |request, (name, value)| request.with_header(&name, value),
                );
                Event::Fetch(request)
            }
            Self::Sync { tag } => Event::Sync { tag },
            Self::Push { data } => Event::Push { data: data.map(Bytes::from) },
        })
    }
}

/// A capability call the worker made on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum HostCall {
    SkipWaiting,
    Claim,
    ShowNotification(Notification),
}

/// One output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WireOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    PassThrough,
    Response {
        url: String,
        status: u16,
        status_text: String,
        #[serde(rename = "type")]
        response_type: String,
        headers: BTreeMap<String, String>,
        /// Body decoded as UTF-8, lossily.
        body: String,
        body_len: usize,
    },
    Synced {
        acknowledged: bool,
    },
    Notified(Notification),
    Ignored,
    Host(HostCall),
    Error {
        code: String,
        message: String,
    },
}

impl From<Response> for WireOutcome {
    fn from(response: Response) -> Self {
        Self::Response {
            url: response.url.to_string(),
            status: response.status,
            status_text: response.status_text,
            response_type: response.response_type.as_str().to_string(),
            headers: response.headers,
            body: String::from_utf8_lossy(&response.body).into_owned(),
            body_len: response.body.len(),
        }
    }
}

impl From<Outcome> for WireOutcome {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Installed(report) => Self::Installed(report),
            Outcome::Activated(report) => Self::Activated(report),
            Outcome::PassThrough => Self::PassThrough,
            Outcome::Responded(response) => response.into(),
            Outcome::Synced { acknowledged } => Self::Synced { acknowledged },
            Outcome::Notified(notification) => Self::Notified(notification),
            Outcome::Ignored => Self::Ignored,
        }
    }
}

impl From<Error> for WireOutcome {
    fn from(error: Error) -> Self {
        Self::Error { code: error.code().to_string(), message: error.to_string() }
    }
}

/// Host whose capability calls are queued for the protocol writer.
///
/// Calls are acknowledged as soon as they are queued.
#[derive(Debug, Clone)]
pub struct StdioHost {
    calls: UnboundedSender<HostCall>,
}

impl StdioHost {
    pub fn channel() -> (Self, UnboundedReceiver<HostCall>) {
        let (calls, rx) = unbounded_channel();
        (Self { calls }, rx)
    }

    fn send(&self, call: HostCall) -> Result<(), Error> {
        self.calls.send(call).map_err(|_| Error::Host("host channel closed".into()))
    }
}

#[async_trait]
impl Clients for StdioHost {
    async fn claim(&self) -> Result<(), Error> {
        self.send(HostCall::Claim)
    }
}

#[async_trait]
impl Registration for StdioHost {
    async fn skip_waiting(&self) -> Result<(), Error> {
        self.send(HostCall::SkipWaiting)
    }

    async fn show_notification(&self, notification: &Notification) -> Result<(), Error> {
        self.send(HostCall::ShowNotification(notification.clone()))
    }
}

/// Handle events from `reader` until EOF, writing results to `writer`.
///
/// Blank lines are skipped. A line that fails to parse or dispatch produces an
/// `error` outcome and processing continues.
pub async fn run<R, W>(
    dispatcher: &Dispatcher, reader: R, mut writer: W, calls: &mut UnboundedReceiver<HostCall>,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0usize;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = handle_line(dispatcher, line).await;

        while let Ok(call) = calls.try_recv() {
            write_line(&mut writer, &WireOutcome::Host(call)).await?;
        }

        let outcome: WireOutcome = match result {
            Ok(outcome) => outcome.into(),
            Err(e) => {
                tracing::warn!(error = %e, "event failed");
                e.into()
            }
        };
        write_line(&mut writer, &outcome).await?;
        handled += 1;
    }

    tracing::info!(handled, "input closed");
    writer.flush().await
}

async fn handle_line(dispatcher: &Dispatcher, line: &str) -> Result<Outcome, Error> {
    let event: WireEvent =
        serde_json::from_str(line).map_err(|e| Error::InvalidInput(format!("malformed event: {e}")))?;
    let event = event.into_event(dispatcher.worker().scope())?;
    tracing::debug!(kind = ?event.kind(), "dispatching");
    dispatcher.dispatch(event).await
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &WireOutcome) -> io::Result<()> {
    let mut json = serde_json::to_vec(line).map_err(io::Error::other)?;
    json.push(b'\n');
    writer.write_all(&json).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{MockNetwork, SCOPE, at, ok_response};
    use crate::worker::Worker;
    use raphael_core::{MemoryCache, WorkerManifest};
    use serde_json::Value;

    fn scope() -> Url {
        Url::parse(SCOPE).unwrap()
    }

    fn stdio_dispatcher(network: Arc<MockNetwork>) -> (Dispatcher, UnboundedReceiver<HostCall>) {
        let (host, calls) = StdioHost::channel();
        let host = Arc::new(host);
        let worker = Worker::new(
            WorkerManifest::default(),
            scope(),
            Arc::new(MemoryCache::new()),
            network,
            host.clone(),
            host,
        );
        (Dispatcher::new(worker), calls)
    }

    async fn drive(input: &str, network: Arc<MockNetwork>) -> Vec<Value> {
        let (dispatcher, mut calls) = stdio_dispatcher(network);
        let mut output = Vec::new();
        run(&dispatcher, input.as_bytes(), &mut output, &mut calls).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_wire_fetch_defaults() {
        let event: WireEvent = serde_json::from_str(r#"{"type":"fetch","url":"/raphael/raphael.html"}"#).unwrap();
        let Event::Fetch(request) = event.into_event(&scope()).unwrap() else {
            panic!("expected fetch");
        };
        assert_eq!(request.url.as_str(), "https://raphael.example/raphael/raphael.html");
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.destination, Destination::Empty);
        assert_eq!(request.mode, RequestMode::Cors);
    }

    #[test]
    fn test_wire_document_defaults_to_navigate() {
        let event: WireEvent = serde_json::from_str(
            r#"{"type":"fetch","url":"https://raphael.example/raphael/","destination":"document","headers":{"Accept":"text/html"}}"#,
        )
        .unwrap();
        let Event::Fetch(request) = event.into_event(&scope()).unwrap() else {
            panic!("expected fetch");
        };
        assert_eq!(request.mode, RequestMode::Navigate);
        assert_eq!(request.header("accept"), Some("text/html"));
    }

    #[test]
    fn test_wire_rejects_bad_method() {
        let event: WireEvent = serde_json::from_str(r#"{"type":"fetch","url":"/x","method":"BREW"}"#).unwrap();
        assert!(matches!(event.into_event(&scope()), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_wire_push_data() {
        let event: WireEvent = serde_json::from_str(r#"{"type":"push","data":"{}"}"#).unwrap();
        assert_eq!(event.into_event(&scope()).unwrap(), Event::Push { data: Some(Bytes::from_static(b"{}")) });

        let event: WireEvent = serde_json::from_str(r#"{"type":"push"}"#).unwrap();
        assert_eq!(event.into_event(&scope()).unwrap(), Event::Push { data: None });
    }

    #[tokio::test]
    async fn test_install_emits_skip_waiting_before_report() {
        let lines = drive("{\"type\":\"install\"}\n", Arc::new(MockNetwork::default())).await;

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["outcome"], "host");
        assert_eq!(lines[0]["call"], "skip_waiting");
        assert_eq!(lines[1]["outcome"], "installed");
        assert_eq!(lines[1]["failed"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_and_bypass() {
        let network = Arc::new(MockNetwork::default());
        network.respond(&at("/raphael/app.js"), ok_response(&at("/raphael/app.js"), "let x = 1;"));
        let input = concat!(
            "{\"type\":\"fetch\",\"url\":\"/raphael/app.js\",\"destination\":\"script\"}\n",
            "\n",
            "{\"type\":\"fetch\",\"url\":\"https://api.anthropic.com/v1/messages\",\"method\":\"POST\"}\n",
        );

        let lines = drive(input, network.clone()).await;

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["outcome"], "response");
        assert_eq!(lines[0]["status"], 200);
        assert_eq!(lines[0]["type"], "basic");
        assert_eq!(lines[0]["body"], "let x = 1;");
        assert_eq!(lines[0]["body_len"], 10);
        assert_eq!(lines[1]["outcome"], "pass_through");
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_push_and_sync() {
        let input = concat!(
            "{\"type\":\"push\",\"data\":\"{\\\"title\\\":\\\"Hi\\\"}\"}\n",
            "{\"type\":\"sync\",\"tag\":\"raphael-sync\"}\n",
        );

        let lines = drive(input, Arc::new(MockNetwork::default())).await;

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["call"], "show_notification");
        assert_eq!(lines[0]["title"], "Hi");
        assert_eq!(lines[1]["outcome"], "notified");
        assert_eq!(lines[1]["body"], "New message from Raphael");
        assert_eq!(lines[2]["outcome"], "synced");
        assert_eq!(lines[2]["acknowledged"], true);
    }

    #[tokio::test]
    async fn test_errors_do_not_stop_the_loop() {
        let input = concat!(
            "not json\n",
            "{\"type\":\"fetch\",\"url\":\"/raphael/chat\",\"destination\":\"document\"}\n",
            "{\"type\":\"activate\"}\n",
        );

        let lines = drive(input, Arc::new(MockNetwork::default())).await;

        assert_eq!(lines[0]["outcome"], "error");
        assert_eq!(lines[0]["code"], "INVALID_INPUT");
        assert_eq!(lines[1]["code"], "OFFLINE_FALLBACK_MISSING");
        assert_eq!(lines[2]["call"], "claim");
        assert_eq!(lines[3]["outcome"], "activated");
    }
}
