use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, instrument, warn};

use crate::{BroadcastSummary, Notifier, PriceRefresher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub refreshed: bool,
    pub broadcast: BroadcastSummary,
}

/// Runs refresh-then-broadcast on a fixed period until told to stop.
pub struct Scheduler {
    period: Duration,
    refresher: Arc<PriceRefresher>,
    notifier: Arc<Notifier>,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(period: Duration, refresher: Arc<PriceRefresher>, notifier: Arc<Notifier>) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            period: period.max(Duration::from_millis(1)),
            refresher,
            notifier,
            state,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// One refresh followed by one broadcast. The broadcast runs even if the refresh failed.
    #[instrument(name = "cycle", skip(self))]
    pub async fn run_cycle(&self) -> CycleSummary {
        self.state.send_replace(SchedulerState::Running);

        let refreshed = match self.refresher.refresh().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "refresh failed, broadcasting last known prices");
                false
            }
        };
        let broadcast = self.notifier.broadcast().await;

        self.state.send_replace(SchedulerState::Idle);
        CycleSummary {
            refreshed,
            broadcast,
        }
    }

    /// Tick until `shutdown` turns true or its sender is dropped.
    ///
    /// The first cycle starts one period after the call. Shutdown only interrupts the wait
    /// between cycles.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period_secs = self.period.as_secs(), "scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            self.run_cycle().await;
        }

        info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::testing::{RecordingSink, ScriptedSource};
    use crate::{PriceSource, PriceStore, Quote, RecipientId, Result, SubscriberRegistry};

    const PERIOD: Duration = Duration::from_secs(60);

    struct Fixture {
        store: Arc<PriceStore>,
        sink: Arc<RecordingSink>,
        scheduler: Arc<Scheduler>,
    }

    async fn fixture(source: Arc<dyn PriceSource>) -> Fixture {
        let store = Arc::new(PriceStore::new(["BTC", "ETH"]));
        let registry = Arc::new(SubscriberRegistry::new());
        registry.subscribe(RecipientId(1)).await;

        let sink = Arc::new(RecordingSink::default());
        let refresher = Arc::new(PriceRefresher::new(source, store.clone()));
        let notifier = Arc::new(Notifier::new(store.clone(), registry, sink.clone()));

        Fixture {
            store,
            sink,
            scheduler: Arc::new(Scheduler::new(PERIOD, refresher, notifier)),
        }
    }

    fn spawn(scheduler: &Arc<Scheduler>) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = watch::channel(false);
        let scheduler = scheduler.clone();
        let handle = tokio::spawn(async move { scheduler.run(rx).await });
        (tx, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_cycle_before_first_period() {
        let source = Arc::new(ScriptedSource::default());
        let fx = fixture(source.clone()).await;
        let (tx, handle) = spawn(&fx.scheduler);

        time::sleep(PERIOD / 2).await;
        assert_eq!(source.calls(), 0);

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(source.calls(), 0);
        assert!(fx.sink.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_error_does_not_stop_next_tick() {
        let source = Arc::new(ScriptedSource::default());
        source.push_ok(&[("BTC", "not-a-number")]);
        source.push_ok(&[("BTC", "100.00")]);
        let fx = fixture(source.clone()).await;
        let (tx, handle) = spawn(&fx.scheduler);

        time::sleep(PERIOD * 2 + Duration::from_secs(5)).await;

        assert_eq!(source.calls(), 2);
        assert_eq!(fx.store.get("BTC").await.unwrap().current, 100.0);
        assert_eq!(fx.sink.messages_to(RecipientId(1)).len(), 2);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_still_broadcasts_stale_prices() {
        let source = Arc::new(ScriptedSource::default());
        source.push_err("timeout");
        let fx = fixture(source.clone()).await;

        let summary = fx.scheduler.run_cycle().await;
        assert!(!summary.refreshed);
        assert_eq!(summary.broadcast.delivered, 1);
        assert_eq!(fx.scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_shutdown_sender_stops_scheduler() {
        let source = Arc::new(ScriptedSource::default());
        let fx = fixture(source.clone()).await;
        let (tx, handle) = spawn(&fx.scheduler);

        drop(tx);
        handle.await.unwrap();
        assert_eq!(source.calls(), 0);
    }

    struct SlowSource {
        delay: Duration,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl PriceSource for SlowSource {
        async fn fetch_snapshot(&self) -> Result<Vec<Quote>> {
            time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Quote::new("ETH", "50.00")])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_cycle_in_progress() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_secs(10),
            finished: AtomicUsize::new(0),
        });
        let fx = fixture(source.clone()).await;
        let mut state = fx.scheduler.watch_state();
        let (tx, handle) = spawn(&fx.scheduler);

        state
            .wait_for(|s| *s == SchedulerState::Running)
            .await
            .unwrap();
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(source.finished.load(Ordering::SeqCst), 1);
        assert_eq!(fx.store.get("ETH").await.unwrap().current, 50.0);
        assert_eq!(fx.sink.messages_to(RecipientId(1)).len(), 1);
        assert_eq!(fx.scheduler.state(), SchedulerState::Idle);
    }
}
