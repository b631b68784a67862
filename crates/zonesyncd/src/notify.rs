//! Daemon-side collaborators: webhook notifications and log-backed metrics

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};
use zonesync_core::traits::{Metric, MetricsSink, Notifier, SyncNotification};
use zonesync_core::{Error, Result};

/// Webhook calls should never hold up the next cycle for long
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs each notification as JSON to a fixed URL
#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(Error::config(format!("notification webhook must be an HTTP(S) URL, got '{url}'")));
        }
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &SyncNotification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| Error::notification(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::notification(format!("webhook returned {status}")));
        }
        debug!("Delivered {:?} notification", notification.kind);
        Ok(())
    }
}

/// Writes metrics as structured log events under the `zonesync::metrics` target
#[derive(Debug, Default)]
pub struct TracingMetrics;

#[async_trait]
impl MetricsSink for TracingMetrics {
    async fn record(&self, metric: Metric) -> Result<()> {
        info!(
            target: "zonesync::metrics",
            name = %metric.name,
            value = metric.value,
            tags = ?metric.tags,
            "metric"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_requires_http_url() {
        assert!(WebhookNotifier::new("ftp://hooks.example.com").is_err());
        assert!(WebhookNotifier::new("https://hooks.example.com/zonesync").is_ok());
    }

    #[tokio::test]
    async fn tracing_metrics_never_fail() {
        let sink = TracingMetrics;
        sink.record(Metric::new("sync_success", 1.0).with_tag("mode", "full"))
            .await
            .unwrap();
    }
}
