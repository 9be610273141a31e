use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use bot::{
    config::Config,
    discord::{DiscordSink, Handler},
};
use market::{
    Dispatcher, Notifier, PriceClient, PriceRefresher, PriceStore, Scheduler, SubscriberRegistry,
};
use serenity::all::{ClientBuilder, GatewayIntents};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const INBOUND_QUEUE: usize = 256;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;

    let store = Arc::new(PriceStore::new(&config.tracked_symbols));
    let registry = Arc::new(SubscriberRegistry::new());

    let price_client = PriceClient::new(&config.price_api_url, config.fetch_timeout)
        .context("init price client failed")?
        .with_symbol_suffix(&config.price_symbol_suffix);
    let refresher = Arc::new(
        PriceRefresher::new(Arc::new(price_client), Arc::clone(&store))
            .with_policy(config.refresh_policy),
    );

    let (events_tx, events_rx) = mpsc::channel(INBOUND_QUEUE);
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .event_handler(Handler::new(events_tx, config.command_prefix.clone()))
        .await
        .context("create discord client failed")?;

    let sink = Arc::new(DiscordSink::new(client.http.clone()));
    let notifier = Arc::new(
        Notifier::new(Arc::clone(&store), Arc::clone(&registry), sink)
            .with_style(config.report_style)
            .with_timezone(config.report_timezone),
    );

    let dispatcher = Dispatcher::new(registry, Arc::clone(&refresher), Arc::clone(&notifier))
        .with_update_policy(config.update_market_policy)
        .with_prefix(config.command_prefix.clone());
    let scheduler = Scheduler::new(config.refresh_interval, refresher, notifier);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(async move { scheduler.run(shutdown_rx).await });
    let dispatcher_task = tokio::spawn(async move { dispatcher.run(events_rx).await });

    let shard_manager = client.shard_manager.clone();
    let client_task = tokio::spawn(async move {
        if let Err(why) = client.start().await {
            error!("Client error: {why:?}");
        }
    });

    info!(
        symbols = ?config.tracked_symbols,
        interval_secs = config.refresh_interval.as_secs(),
        policy = %config.refresh_policy,
        "price watch running"
    );

    shutdown_signal().await?;
    info!("shutdown requested");

    if let Err(e) = shutdown_tx.send(true) {
        debug!(error = ?e, "scheduler already stopped");
    }
    shard_manager.shutdown_all().await;

    if let Err(e) = client_task.await {
        warn!(error = ?e, "discord client task failed");
    }
    if let Err(e) = scheduler_task.await {
        warn!(error = ?e, "scheduler task failed");
    }
    if tokio::time::timeout(DRAIN_TIMEOUT, dispatcher_task).await.is_err() {
        warn!("dispatcher did not drain in time");
    }

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
        select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?;
    }

    Ok(())
}
