use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{MarketError, Result};

/// Value of a reading that has never been set.
const UNSET: f64 = 0.0;

/// The two most recent observations of one symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackedSymbol {
    pub previous: f64,
    pub current: f64,
}

impl TrackedSymbol {
    /// Signed change between the two most recent observations.
    pub fn change(&self) -> f64 {
        self.current - self.previous
    }

    /// First observation becomes a flat baseline, later ones shift current into previous.
    fn roll(&mut self, value: f64) {
        if self.previous == UNSET {
            self.previous = value;
        } else {
            self.previous = self.current;
        }
        self.current = value;
    }
}

/// Consistent copy of the store, symbols in lexicographic order.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub symbols: Vec<(String, TrackedSymbol)>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Table {
    symbols: BTreeMap<String, TrackedSymbol>,
    refreshed_at: Option<DateTime<Utc>>,
}

/// In-memory table of the tracked symbols. The symbol set never changes after `new`.
#[derive(Debug)]
pub struct PriceStore {
    tracked: Vec<String>,
    table: RwLock<Table>,
}

impl PriceStore {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols: BTreeMap<String, TrackedSymbol> = symbols
            .into_iter()
            .map(|s| Self::normalize(s.as_ref()))
            .filter(|s| !s.is_empty())
            .map(|s| (s, TrackedSymbol::default()))
            .collect();

        Self {
            tracked: symbols.keys().cloned().collect(),
            table: RwLock::new(Table {
                symbols,
                refreshed_at: None,
            }),
        }
    }

    pub(crate) fn normalize(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    /// Tracked symbols, sorted.
    pub fn symbols(&self) -> &[String] {
        &self.tracked
    }

    pub fn is_tracked(&self, symbol: &str) -> bool {
        let symbol = Self::normalize(symbol);
        self.tracked
            .binary_search_by(|s| s.as_str().cmp(symbol.as_str()))
            .is_ok()
    }

    pub async fn get(&self, symbol: &str) -> Result<TrackedSymbol> {
        let symbol = Self::normalize(symbol);
        self.table
            .read()
            .await
            .symbols
            .get(&symbol)
            .copied()
            .ok_or(MarketError::UnknownSymbol(symbol))
    }

    /// Apply one reading with the rollover rule.
    pub async fn update(&self, symbol: &str, value: f64) -> Result<()> {
        self.update_many([Ok((symbol.to_string(), value))])
            .await
            .map(|_| ())
    }

    /// Apply readings in order under one write lock, stopping at the first error.
    ///
    /// Readings applied before the error stay applied. Returns how many were applied.
    pub async fn update_many<I>(&self, readings: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<(String, f64)>>,
    {
        let mut table = self.table.write().await;
        let mut applied = 0usize;
        let mut failure = None;

        for reading in readings {
            let (symbol, value) = match reading {
                Ok(r) => r,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };

            let symbol = Self::normalize(&symbol);
            match table.symbols.get_mut(&symbol) {
                Some(entry) => {
                    entry.roll(value);
                    applied += 1;
                    debug!(
                        symbol = %symbol,
                        previous = entry.previous,
                        current = entry.current,
                        "price rolled over"
                    );
                }
                None => {
                    failure = Some(MarketError::UnknownSymbol(symbol));
                    break;
                }
            }
        }

        if applied > 0 {
            table.refreshed_at = Some(Utc::now());
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(applied),
        }
    }

    pub async fn snapshot(&self) -> PriceSnapshot {
        let table = self.table.read().await;
        PriceSnapshot {
            symbols: table
                .symbols
                .iter()
                .map(|(symbol, tracked)| (symbol.clone(), *tracked))
                .collect(),
            refreshed_at: table.refreshed_at,
        }
    }
}
