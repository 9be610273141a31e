use std::{env, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use chrono_tz::Tz;
use market::{RefreshPolicy, ReportStyle, UpdateMarketPolicy};

const DEFAULT_SYMBOLS: &str = "BTC,ETH,ETC";
const DEFAULT_PRICE_API_URL: &str = "https://api.coinmarketcap.com/v1/ticker/?limit=10";

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub refresh_interval: Duration,
    pub tracked_symbols: Vec<String>,
    pub price_api_url: String,
    pub price_symbol_suffix: String,
    pub fetch_timeout: Duration,
    pub refresh_policy: RefreshPolicy,
    pub update_market_policy: UpdateMarketPolicy,
    pub command_prefix: String,
    pub report_style: ReportStyle,
    pub report_timezone: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN").context("DISCORD_TOKEN not set")?;

        let tracked_symbols: Vec<String> = get("TRACKED_SYMBOLS")
            .unwrap_or_else(|| DEFAULT_SYMBOLS.to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if tracked_symbols.is_empty() {
            bail!("TRACKED_SYMBOLS has no symbols");
        }

        let update_market_policy = if parse_bool(get("UPDATEMARKET_BROADCAST"), false)
            .context("UPDATEMARKET_BROADCAST")?
        {
            UpdateMarketPolicy::RefreshAndBroadcast
        } else {
            UpdateMarketPolicy::RefreshOnly
        };

        Ok(Self {
            discord_token,
            refresh_interval: parse_secs(get("REFRESH_INTERVAL_SECS"), 300)
                .context("REFRESH_INTERVAL_SECS")?,
            tracked_symbols,
            price_api_url: get("PRICE_API_URL")
                .unwrap_or_else(|| DEFAULT_PRICE_API_URL.to_string()),
            price_symbol_suffix: get("PRICE_SYMBOL_SUFFIX").unwrap_or_default(),
            fetch_timeout: parse_secs(get("FETCH_TIMEOUT_SECS"), 10)
                .context("FETCH_TIMEOUT_SECS")?,
            refresh_policy: parse_enum(get("REFRESH_POLICY"), RefreshPolicy::default())
                .context("REFRESH_POLICY (partial | all-or-nothing)")?,
            update_market_policy,
            command_prefix: parse_prefix(lookup("COMMAND_PREFIX"))
                .context("COMMAND_PREFIX")?,
            report_style: parse_enum(get("REPORT_STYLE"), ReportStyle::default())
                .context("REPORT_STYLE (plain | markdown)")?,
            report_timezone: parse_enum(get("REPORT_TIMEZONE"), Tz::UTC)
                .context("REPORT_TIMEZONE (IANA name like America/New_York)")?,
        })
    }
}

fn parse_secs(value: Option<String>, default: u64) -> Result<Duration> {
    let secs = match value {
        Some(v) => v.trim().parse::<u64>()?,
        None => default,
    };
    if secs == 0 {
        bail!("must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

// An empty prefix would turn every guild message into a command.
fn parse_prefix(value: Option<String>) -> Result<String> {
    match value {
        None => Ok("!".to_string()),
        Some(v) if v.trim().is_empty() => bail!("must not be empty"),
        Some(v) => Ok(v.trim().to_string()),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(anyhow!("invalid boolean: {other}")),
        },
    }
}

fn parse_enum<T>(value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("invalid value {v:?}: {e}")),
        None => Ok(default),
    }
}
