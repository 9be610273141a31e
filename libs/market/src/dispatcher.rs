//! Inbound command handling.
//!
//! Events arrive on an `mpsc` channel and are handled one at a time; every event gets exactly
//! one reply to the chat it came from before the next event is read.

use std::sync::Arc;

use strum::{Display, EnumIter, EnumMessage, EnumString, IntoEnumIterator};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::{
    Notifier, PriceRefresher, RecipientId, Result, SubscribeOutcome, SubscriberRegistry,
    UnsubscribeOutcome,
};

pub const SUBSCRIBED: &str = "Successfully subscribed.";
pub const ALREADY_SUBSCRIBED: &str = "Already subscribed.";
pub const UNSUBSCRIBED: &str = "Successfully unsubscribed.";
pub const NOT_SUBSCRIBED: &str = "Not subscribed.";
pub const PRICES_UPDATED: &str = "Prices updated.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, EnumMessage)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Command {
    #[strum(message = "Subscribe to price notifications")]
    Subscribe,
    #[strum(message = "Unsubscribe from price notifications")]
    Unsubscribe,
    #[strum(message = "Update market prices")]
    UpdateMarket,
    #[strum(message = "Show current prices")]
    ShowPrices,
    #[strum(to_string = "help", serialize = "start", message = "Show this list")]
    Help,
}

/// Whether `updatemarket` also pushes the fresh report to every subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum UpdateMarketPolicy {
    #[default]
    RefreshOnly,
    RefreshAndBroadcast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    /// Keyword after the command prefix, not yet validated.
    Command(String),
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub recipient: RecipientId,
    pub body: EventBody,
}

impl InboundEvent {
    pub fn command(recipient: RecipientId, keyword: impl Into<String>) -> Self {
        Self {
            recipient,
            body: EventBody::Command(keyword.into()),
        }
    }

    pub fn text(recipient: RecipientId) -> Self {
        Self {
            recipient,
            body: EventBody::Text,
        }
    }

    /// Classify raw chat text. `!showprices@PriceBot now` becomes `Command("showprices")`.
    pub fn from_message(recipient: RecipientId, content: &str, prefix: &str) -> Self {
        let keyword = content
            .trim()
            .strip_prefix(prefix)
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|word| word.split('@').next())
            .filter(|keyword| !keyword.is_empty());

        match keyword {
            Some(keyword) => Self::command(recipient, keyword),
            None => Self::text(recipient),
        }
    }
}

pub struct Dispatcher {
    registry: Arc<SubscriberRegistry>,
    refresher: Arc<PriceRefresher>,
    notifier: Arc<Notifier>,
    update_policy: UpdateMarketPolicy,
    prefix: String,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        refresher: Arc<PriceRefresher>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            registry,
            refresher,
            notifier,
            update_policy: UpdateMarketPolicy::default(),
            prefix: "!".to_string(),
        }
    }

    pub fn with_update_policy(mut self, policy: UpdateMarketPolicy) -> Self {
        self.update_policy = policy;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn help_text(&self) -> String {
        let mut out = format!("Bot commands ({}help):\n\n", self.prefix);
        for command in Command::iter() {
            out.push_str(&format!(
                "{}{} - {}\n",
                self.prefix,
                command,
                command.get_message().unwrap_or_default()
            ));
        }
        out
    }

    pub fn commands_only_text(&self) -> String {
        format!(
            "Bot accepts only commands. Send {}help for the list.",
            self.prefix
        )
    }

    #[instrument(name = "dispatch", skip(self, event), fields(recipient = %event.recipient))]
    pub async fn handle(&self, event: &InboundEvent) -> Result<()> {
        let recipient = event.recipient;

        let command = match &event.body {
            EventBody::Command(keyword) => keyword.parse::<Command>().ok(),
            EventBody::Text => None,
        };

        let Some(command) = command else {
            debug!(body = ?event.body, "not a command");
            return self.reply(recipient, &self.commands_only_text()).await;
        };

        info!(command = %command, "dispatching");

        match command {
            Command::Subscribe => {
                let text = match self.registry.subscribe(recipient).await {
                    SubscribeOutcome::Added => SUBSCRIBED,
                    SubscribeOutcome::AlreadyPresent => ALREADY_SUBSCRIBED,
                };
                self.reply(recipient, text).await
            }
            Command::Unsubscribe => {
                let text = match self.registry.unsubscribe(recipient).await {
                    UnsubscribeOutcome::Removed => UNSUBSCRIBED,
                    UnsubscribeOutcome::NotPresent => NOT_SUBSCRIBED,
                };
                self.reply(recipient, text).await
            }
            Command::UpdateMarket => {
                if let Err(e) = self.refresher.refresh().await {
                    warn!(error = %e, "forced refresh failed");
                }
                if self.update_policy == UpdateMarketPolicy::RefreshAndBroadcast {
                    self.notifier.broadcast().await;
                }
                self.reply(recipient, PRICES_UPDATED).await
            }
            Command::ShowPrices => self.notifier.report_for(recipient).await,
            Command::Help => self.reply(recipient, &self.help_text()).await,
        }
    }

    async fn reply(&self, recipient: RecipientId, text: &str) -> Result<()> {
        self.notifier.sink().send_text(recipient, text).await
    }

    /// Handle events until every sender is dropped.
    pub async fn run(&self, mut events: mpsc::Receiver<InboundEvent>) {
        info!("dispatcher started");

        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle(&event).await {
                warn!(error = %e, recipient = %event.recipient, "reply failed");
            }
        }

        info!("inbound channel closed, dispatcher stopped");
    }
}
