use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use futures::{StreamExt, stream};
use tracing::{debug, info, instrument, warn};
use tracing_futures::Instrument;

use crate::{PriceStore, RecipientId, ReportStyle, Result, SubscriberRegistry, render_report};

/// Outbound side of the chat transport.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_text(&self, recipient: RecipientId, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Renders the price report and delivers it.
pub struct Notifier {
    store: Arc<PriceStore>,
    registry: Arc<SubscriberRegistry>,
    sink: Arc<dyn MessageSink>,
    style: ReportStyle,
    timezone: Tz,
}

impl Notifier {
    /// Sends in flight at once during a broadcast.
    const CONCURRENCY: usize = 8;

    pub fn new(
        store: Arc<PriceStore>,
        registry: Arc<SubscriberRegistry>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            store,
            registry,
            sink,
            style: ReportStyle::default(),
            timezone: Tz::UTC,
        }
    }

    pub fn with_style(mut self, style: ReportStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub async fn render(&self) -> String {
        let snapshot = self.store.snapshot().await;
        render_report(&snapshot, self.style, self.timezone)
    }

    /// Send the report to every subscriber. A failed send is logged and counted.
    #[instrument(name = "broadcast", skip(self))]
    pub async fn broadcast(&self) -> BroadcastSummary {
        let report = self.render().await;
        let recipients = self.registry.recipients().await;

        let mut summary = BroadcastSummary {
            recipients: recipients.len(),
            ..Default::default()
        };

        if recipients.is_empty() {
            debug!("no subscribers");
            return summary;
        }

        let report = report.as_str();
        let mut sends = stream::iter(recipients)
            .map(|recipient| {
                let span = tracing::debug_span!("deliver", recipient = %recipient);
                async move { self.sink.send_text(recipient, report).await }.instrument(span)
            })
            .buffer_unordered(Self::CONCURRENCY);

        while let Some(res) = sends.next().await {
            match res {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(error = %e, "send failed");
                }
            }
        }

        info!(
            recipients = summary.recipients,
            delivered = summary.delivered,
            failed = summary.failed,
            "broadcast completed"
        );
        summary
    }

    /// Send the report to one recipient, subscribed or not.
    #[instrument(name = "report_for", skip(self), fields(recipient = %recipient))]
    pub async fn report_for(&self, recipient: RecipientId) -> Result<()> {
        let report = self.render().await;
        self.sink.send_text(recipient, &report).await
    }

    pub fn sink(&self) -> &Arc<dyn MessageSink> {
        &self.sink
    }
}
