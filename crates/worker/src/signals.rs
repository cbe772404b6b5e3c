//! Connectivity-restored and push signals.

use raphael_core::Error;
use serde_json::Value;

use crate::host::Notification;
use crate::worker::Worker;

/// Title and body carried by a push payload, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl PushPayload {
    /// Parse a push payload leniently.
    ///
    /// Missing data, invalid JSON and non-object JSON all yield an empty
    /// payload. Only non-empty string fields are taken.
    pub fn parse(data: Option<&[u8]>) -> Self {
        let value = match data.map(serde_json::from_slice::<Value>) {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "ignoring malformed push payload");
                return Self::default();
            }
            None => return Self::default(),
        };

        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self { title: field("title"), body: field("body") }
    }
}

impl Worker {
    /// Acknowledge a connectivity-restored signal.
    ///
    /// Returns whether the tag was recognised. No work is deferred or retried.
    pub fn sync(&self, tag: &str) -> bool {
        if tag == self.manifest.sync_tag {
            tracing::info!(tag, "background sync triggered");
            true
        } else {
            tracing::debug!(tag, "ignoring unrecognised sync tag");
            false
        }
    }

    /// Build the notification for a push signal and wait for it to display.
    pub async fn push(&self, data: Option<&[u8]>) -> Result<Notification, Error> {
        let payload = PushPayload::parse(data);
        let defaults = &self.manifest.notification;

        let notification = Notification {
            title: payload.title.unwrap_or_else(|| defaults.title.clone()),
            body: payload.body.unwrap_or_else(|| defaults.body.clone()),
            icon: defaults.icon.clone(),
            badge: defaults.badge.clone(),
            vibrate: defaults.vibrate.clone(),
            tag: defaults.tag.clone(),
        };

        self.registration.show_notification(&notification).await?;
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, SCOPE};

    #[test]
    fn test_parse_payload() {
        let payload = PushPayload::parse(Some(br#"{"title":"T","body":"B"}"#));
        assert_eq!(payload.title.as_deref(), Some("T"));
        assert_eq!(payload.body.as_deref(), Some("B"));
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(PushPayload::parse(None), PushPayload::default());
        assert_eq!(PushPayload::parse(Some(b"not json")), PushPayload::default());
        assert_eq!(PushPayload::parse(Some(b"null")), PushPayload::default());
        assert_eq!(PushPayload::parse(Some(b"[1,2]")), PushPayload::default());
        assert_eq!(PushPayload::parse(Some(br#"{"title":7,"body":""}"#)), PushPayload::default());
    }

    #[test]
    fn test_parse_partial() {
        let payload = PushPayload::parse(Some(br#"{"body":"only body","extra":true}"#));
        assert_eq!(payload.title, None);
        assert_eq!(payload.body.as_deref(), Some("only body"));
    }

    #[tokio::test]
    async fn test_push_with_payload() {
        let harness = Harness::new(SCOPE);

        let shown = harness.worker.push(Some(br#"{"title":"T","body":"B"}"#)).await.unwrap();

        assert_eq!(shown.title, "T");
        assert_eq!(shown.body, "B");
        assert_eq!(harness.host.notifications(), vec![shown]);
    }

    #[tokio::test]
    async fn test_push_without_payload_uses_defaults() {
        let harness = Harness::new(SCOPE);

        let shown = harness.worker.push(None).await.unwrap();

        assert_eq!(shown.title, "Raphael AI");
        assert_eq!(shown.body, "New message from Raphael");
        assert_eq!(shown.icon, "/raphael/icon-192.png");
        assert_eq!(shown.badge, "/raphael/icon-192.png");
        assert_eq!(shown.vibrate, vec![200, 100, 200]);
        assert_eq!(shown.tag, "raphael-notification");
    }

    #[tokio::test]
    async fn test_push_malformed_payload_still_notifies() {
        let harness = Harness::new(SCOPE);

        let shown = harness.worker.push(Some(b"{broken")).await.unwrap();

        assert_eq!(shown.title, "Raphael AI");
        assert_eq!(harness.host.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_pushes_share_tag() {
        let harness = Harness::new(SCOPE);
        harness.worker.push(None).await.unwrap();
        harness.worker.push(Some(br#"{"title":"again"}"#)).await.unwrap();

        let tags: Vec<String> = harness.host.notifications().into_iter().map(|n| n.tag).collect();
        assert_eq!(tags, vec!["raphael-notification", "raphael-notification"]);
    }

    #[tokio::test]
    async fn test_sync_tag() {
        let harness = Harness::new(SCOPE);
        assert!(harness.worker.sync("raphael-sync"));
        assert!(!harness.worker.sync("other-sync"));
        assert_eq!(harness.network.calls(), 0);
    }
}
