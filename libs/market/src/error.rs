use thiserror::Error;

use crate::RecipientId;

/// Failures raised by the price engine.
///
/// None of these are fatal: the scheduler and dispatcher log them and carry on.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Price source unreachable, timed out, answered non-2xx or sent an undecodable body.
    #[error("price fetch failed: {0}")]
    Fetch(String),

    /// A tracked symbol came back with a price that is not a number.
    #[error("invalid price {value:?} for {symbol}")]
    Parse { symbol: String, value: String },

    /// Sending a message to one recipient failed.
    #[error("delivery to {recipient} failed: {reason}")]
    Delivery {
        recipient: RecipientId,
        reason: String,
    },

    /// Lookup of a symbol outside the tracked set.
    #[error("symbol not tracked: {0}")]
    UnknownSymbol(String),
}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        MarketError::Fetch(err.to_string())
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Fetch(format!("decode snapshot: {err}"))
    }
}

pub type Result<T, E = MarketError> = std::result::Result<T, E>;
