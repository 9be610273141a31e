use std::sync::Arc;

use strum::{Display, EnumString};
use tracing::{info, instrument};

use crate::{MarketError, PriceSource, PriceStore, Quote, Result};

/// What to do with the store when a tracked price fails to parse mid-snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum RefreshPolicy {
    /// Keep the entries applied before the bad one.
    #[default]
    Partial,
    /// Parse everything first and apply nothing on failure.
    AllOrNothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub applied: usize,
    pub skipped: usize,
}

/// Pulls a snapshot from the price source and rolls it into the store.
pub struct PriceRefresher {
    source: Arc<dyn PriceSource>,
    store: Arc<PriceStore>,
    policy: RefreshPolicy,
}

impl PriceRefresher {
    pub fn new(source: Arc<dyn PriceSource>, store: Arc<PriceStore>) -> Self {
        Self {
            source,
            store,
            policy: RefreshPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[instrument(name = "refresh", skip(self), fields(policy = %self.policy))]
    pub async fn refresh(&self) -> Result<RefreshSummary> {
        let quotes = self.source.fetch_snapshot().await?;
        let total = quotes.len();

        let tracked: Vec<Quote> = quotes
            .into_iter()
            .filter(|q| self.store.is_tracked(&q.symbol))
            .collect();
        let skipped = total - tracked.len();

        let readings = tracked.into_iter().map(parse_quote);
        let applied = match self.policy {
            RefreshPolicy::Partial => self.store.update_many(readings).await?,
            RefreshPolicy::AllOrNothing => {
                let parsed = readings.collect::<Result<Vec<_>>>()?;
                self.store.update_many(parsed.into_iter().map(Ok)).await?
            }
        };

        info!(applied, skipped, "refresh completed");
        Ok(RefreshSummary { applied, skipped })
    }
}

fn parse_quote(quote: Quote) -> Result<(String, f64)> {
    match quote.price.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok((quote.symbol, value)),
        _ => Err(MarketError::Parse {
            symbol: quote.symbol,
            value: quote.price,
        }),
    }
}
