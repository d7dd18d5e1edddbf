//! Outbound workflow notifications.
//!
//! Ingestion emits one `IngestEvent` per artifact so the workflow service
//! can later trigger the resume entry point. Delivery is best-effort: a
//! notifier error is reported to the caller, which logs it and carries on.

use serde::{Deserialize, Serialize};
use taskroute_core::{Error, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Event telling the workflow service that content awaits routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestEvent {
    #[serde(rename = "artifactId")]
    pub artifact_id: String,
    #[serde(rename = "contentId")]
    pub content_id: String,
}

/// Workflow-notification collaborator.
pub trait Notifier: Send + Sync {
    /// Hand an event to the transport. Must not block on delivery.
    fn notify(&self, event: &IngestEvent) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// POSTs events as JSON to a webhook. The request runs on the current tokio
/// runtime; delivery failures are logged there.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: &IngestEvent) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Notification(format!("no async runtime for webhook: {}", e)))?;

        let client = self.client.clone();
        let url = self.url.clone();
        let event = event.clone();
        handle.spawn(async move {
            match client.post(&url).json(&event).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!("Webhook delivered for content {}", event.content_id);
                }
                Ok(resp) => {
                    warn!(
                        "Webhook {} rejected event for content {}: HTTP {}",
                        url,
                        event.content_id,
                        resp.status()
                    );
                }
                Err(e) => {
                    warn!("Webhook {} unreachable for content {}: {}", url, event.content_id, e);
                }
            }
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// In-process delivery through an unbounded channel.
pub struct QueueNotifier {
    tx: mpsc::UnboundedSender<IngestEvent>,
}

impl QueueNotifier {
    /// Create the notifier and the receiver the consumer drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<IngestEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for QueueNotifier {
    fn notify(&self, event: &IngestEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| Error::Notification("ingest queue consumer has shut down".into()))
    }

    fn name(&self) -> &'static str {
        "queue"
    }
}

/// Only logs the event. Useful when an external poller drives resumption.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &IngestEvent) -> Result<()> {
        info!(
            "Content {} (artifact {}) ready for routing",
            event.content_id, event.artifact_id
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> IngestEvent {
        IngestEvent {
            artifact_id: "a1".into(),
            content_id: "c1".into(),
        }
    }

    #[test]
    fn test_queue_delivers() {
        let (notifier, mut rx) = QueueNotifier::new();
        notifier.notify(&event()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), event());
    }

    #[test]
    fn test_queue_closed_is_notification_error() {
        let (notifier, rx) = QueueNotifier::new();
        drop(rx);
        let err = notifier.notify(&event()).unwrap_err();
        assert!(matches!(err, Error::Notification(_)));
    }

    #[test]
    fn test_webhook_without_runtime_errors() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook");
        assert!(matches!(notifier.notify(&event()), Err(Error::Notification(_))));
    }

    #[tokio::test]
    async fn test_webhook_failure_is_not_surfaced() {
        // Nothing listens on the discard port; the spawned request fails
        // and is only logged.
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook");
        assert!(notifier.notify(&event()).is_ok());
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(event()).unwrap();
        assert_eq!(json["artifactId"], "a1");
        assert_eq!(json["contentId"], "c1");
    }
}
