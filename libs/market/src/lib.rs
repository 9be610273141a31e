mod error;
mod notifier;
mod price_client;
mod price_store;
mod refresher;
mod report;
mod scheduler;
mod subscribers;

pub mod dispatcher;

#[cfg(test)]
mod testing;

use std::fmt;

pub use dispatcher::{Command, Dispatcher, EventBody, InboundEvent, UpdateMarketPolicy};
pub use error::{MarketError, Result};
pub use notifier::{BroadcastSummary, MessageSink, Notifier};
pub use price_client::{PriceClient, PriceSource, Quote};
pub use price_store::{PriceSnapshot, PriceStore, TrackedSymbol};
pub use refresher::{PriceRefresher, RefreshPolicy, RefreshSummary};
pub use report::{ReportStyle, render_report};
pub use scheduler::{CycleSummary, Scheduler, SchedulerState};
pub use subscribers::{SubscribeOutcome, SubscriberRegistry, UnsubscribeOutcome};

/// Transport-chosen address of a chat (Discord channel id in the bot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecipientId(pub u64);

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecipientId {
    fn from(id: u64) -> Self {
        RecipientId(id)
    }
}
