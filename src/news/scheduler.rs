use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::feed::{FetchSource, Source};

use super::aggregator::build_snapshot;
use super::error::BuildError;
use super::store::{CacheService, LockStrategy};

/// What a failed refresh does to the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshFailurePolicy {
    /// Log the failure and keep serving the previous snapshot until the next
    /// scheduled refresh.
    #[default]
    RetainStale,
    /// Stop the scheduler and hand the error to the caller, which is expected
    /// to terminate the service.
    Fatal,
}

/// Observable state of the refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Refreshing,
    /// Last refresh published this version.
    Published(u64),
    Failed,
    Stopped,
}

/// Static settings for the refresh loop.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub sources: Vec<Source>,
    pub capacity: usize,
    pub interval: Duration,
    pub on_failure: RefreshFailurePolicy,
    pub lock_strategy: LockStrategy,
}

/// The single writer: periodically rebuilds and publishes the snapshot.
pub struct RefreshScheduler<F> {
    service: Arc<CacheService>,
    fetcher: F,
    settings: RefreshSettings,
    state: watch::Sender<SchedulerState>,
}

impl<F: FetchSource> RefreshScheduler<F> {
    pub fn new(service: Arc<CacheService>, fetcher: F, settings: RefreshSettings) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            service,
            fetcher,
            settings,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Builds one snapshot and publishes it. Returns the published version.
    ///
    /// A failure leaves the current snapshot untouched regardless of policy.
    pub async fn refresh_once(&self) -> Result<u64, BuildError> {
        self.state.send_replace(SchedulerState::Refreshing);
        tracing::info!(sources = self.settings.sources.len(), "Refreshing news snapshot");

        let build = build_snapshot(&self.fetcher, &self.settings.sources, self.settings.capacity);
        match self
            .service
            .refresh_with(self.settings.lock_strategy, build)
            .await
        {
            Ok(version) => {
                self.state.send_replace(SchedulerState::Published(version));
                tracing::info!(version = version, "Published news snapshot");
                Ok(version)
            }
            Err(e) => {
                self.state.send_replace(SchedulerState::Failed);
                tracing::warn!(
                    error = %e,
                    policy = ?self.settings.on_failure,
                    "Refresh failed"
                );
                Err(e)
            }
        }
    }

    /// Refreshes immediately, then every `interval`, until `shutdown` turns
    /// true (or its sender is dropped).
    ///
    /// A refresh in progress always runs to completion; shutdown is only
    /// observed between refreshes. Under [`RefreshFailurePolicy::Fatal`] the
    /// first failed refresh ends the loop with that error.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), BuildError> {
        let mut next_refresh = Instant::now();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            self.state.send_replace(SchedulerState::Idle);

            // Waking for a shutdown change that is not a stop keeps the
            // same deadline.
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = tokio::time::sleep_until(next_refresh) => {}
            }

            if let Err(e) = self.refresh_once().await {
                if self.settings.on_failure == RefreshFailurePolicy::Fatal {
                    self.state.send_replace(SchedulerState::Stopped);
                    tracing::error!(error = %e, "Refresh failed, stopping");
                    return Err(e);
                }
            }
            next_refresh = Instant::now() + self.settings.interval;
            tracing::debug!(
                wait_secs = self.settings.interval.as_secs(),
                "Next refresh scheduled"
            );
        }

        self.state.send_replace(SchedulerState::Stopped);
        tracing::info!("Refresh scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FetchError, RawItem};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Plays back one scripted outcome per fetch call; optionally signals
    /// shutdown once the script runs out.
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<Vec<RawItem>, FetchError>>>,
        shutdown_when_done: Option<watch::Sender<bool>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<Vec<RawItem>, FetchError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                shutdown_when_done: None,
            }
        }
    }

    impl FetchSource for ScriptedFetcher {
        async fn fetch<'a>(&'a self, _source: &'a Source) -> Result<Vec<RawItem>, FetchError> {
            let (next, done) = {
                let mut script = self.script.lock().unwrap();
                let next = script.pop_front().unwrap_or_else(|| Ok(Vec::new()));
                (next, script.is_empty())
            };
            if done {
                if let Some(tx) = &self.shutdown_when_done {
                    let _ = tx.send(true);
                }
            }
            next
        }
    }

    fn items(title: &str) -> Result<Vec<RawItem>, FetchError> {
        Ok(vec![RawItem {
            title: title.to_string(),
            link: String::new(),
            description: String::new(),
            pub_date: "Mon, 01 Jan 2024 00:00:00 +0000".to_string(),
        }])
    }

    fn settings(on_failure: RefreshFailurePolicy) -> RefreshSettings {
        RefreshSettings {
            sources: vec![Source::new("T", "https://example.com/rss")],
            capacity: 20,
            interval: Duration::from_secs(300),
            on_failure,
            lock_strategy: LockStrategy::SwapOnly,
        }
    }

    async fn titles(service: &CacheService) -> Vec<String> {
        service
            .current_snapshot()
            .await
            .unwrap()
            .items()
            .iter()
            .map(|i| i.title.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_retain_stale_keeps_snapshot_then_replaces() {
        let service = Arc::new(CacheService::new());
        let fetcher = ScriptedFetcher::new(vec![
            items("first"),
            Err(FetchError::HttpStatus(502)),
            items("second"),
        ]);
        let scheduler = RefreshScheduler::new(
            Arc::clone(&service),
            fetcher,
            settings(RefreshFailurePolicy::RetainStale),
        );

        assert_eq!(scheduler.refresh_once().await.unwrap(), 1);
        let bytes = service.get_snapshot().await.unwrap();

        let err = scheduler.refresh_once().await.unwrap_err();
        assert!(matches!(err, BuildError::Fetch { .. }));
        assert_eq!(*scheduler.subscribe().borrow(), SchedulerState::Failed);
        assert_eq!(service.get_snapshot().await.unwrap(), bytes);
        assert_eq!(titles(&service).await, ["[T] first"]);

        assert_eq!(scheduler.refresh_once().await.unwrap(), 2);
        assert_eq!(titles(&service).await, ["[T] second"]);
        assert_ne!(service.get_snapshot().await.unwrap(), bytes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_refreshes_on_interval_until_shutdown() {
        let service = Arc::new(CacheService::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut fetcher = ScriptedFetcher::new(vec![
            items("first"),
            Err(FetchError::Timeout),
            items("third"),
        ]);
        fetcher.shutdown_when_done = Some(shutdown_tx);

        let scheduler = RefreshScheduler::new(
            Arc::clone(&service),
            fetcher,
            settings(RefreshFailurePolicy::RetainStale),
        );
        let state = scheduler.subscribe();

        let started = tokio::time::Instant::now();
        scheduler.run(shutdown_rx).await.unwrap();

        // Immediate first refresh, then two intervals
        assert_eq!(started.elapsed(), Duration::from_secs(600));
        assert_eq!(*state.borrow(), SchedulerState::Stopped);
        assert_eq!(service.version(), 2);
        assert_eq!(titles(&service).await, ["[T] third"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fatal_policy_stops_on_failure() {
        let service = Arc::new(CacheService::new());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let fetcher = ScriptedFetcher::new(vec![
            items("first"),
            Err(FetchError::Decode("truncated".to_string())),
            items("never"),
        ]);

        let scheduler = RefreshScheduler::new(
            Arc::clone(&service),
            fetcher,
            settings(RefreshFailurePolicy::Fatal),
        );
        let state = scheduler.subscribe();

        let err = scheduler.run(shutdown_rx).await.unwrap_err();
        assert!(matches!(err, BuildError::Decode { .. }));
        assert_eq!(*state.borrow(), SchedulerState::Stopped);
        // The snapshot published before the failure is still intact.
        assert_eq!(service.version(), 1);
        assert_eq!(titles(&service).await, ["[T] first"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fatal_on_initial_refresh() {
        let service = Arc::new(CacheService::new());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::HttpStatus(404))]);

        let scheduler = RefreshScheduler::new(
            Arc::clone(&service),
            fetcher,
            settings(RefreshFailurePolicy::Fatal),
        );

        assert!(scheduler.run(shutdown_rx).await.is_err());
        assert!(service.current_snapshot().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_idle() {
        let service = Arc::new(CacheService::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let fetcher = ScriptedFetcher::new(vec![items("first"), items("second")]);

        let scheduler = RefreshScheduler::new(
            Arc::clone(&service),
            fetcher,
            settings(RefreshFailurePolicy::RetainStale),
        );
        let state = scheduler.subscribe();
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        // First refresh runs at once, the second is 300s away.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(service.version(), 1);
        assert_eq!(*state.borrow(), SchedulerState::Idle);
        shutdown_tx.send(true).unwrap();

        handle.await.unwrap().unwrap();
        assert_eq!(*state.borrow(), SchedulerState::Stopped);
        assert_eq!(service.version(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_stop_shutdown_updates_keep_refresh_deadline() {
        let service = Arc::new(CacheService::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let fetcher = ScriptedFetcher::new(vec![items("first"), items("second"), items("third")]);

        let scheduler = RefreshScheduler::new(
            Arc::clone(&service),
            fetcher,
            settings(RefreshFailurePolicy::RetainStale),
        );
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        // Wake the loop every 90s without asking it to stop.
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_secs(90)).await;
            shutdown_tx.send(false).unwrap();
        }
        assert_eq!(service.version(), 1);

        // The second refresh is still due 300s after the first.
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(service.version(), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(service.version(), 2);
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_stops_loop() {
        let service = Arc::new(CacheService::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);

        let fetcher = ScriptedFetcher::new(vec![items("first")]);
        let scheduler = RefreshScheduler::new(
            Arc::clone(&service),
            fetcher,
            settings(RefreshFailurePolicy::RetainStale),
        );

        scheduler.run(shutdown_rx).await.unwrap();
        assert!(service.current_snapshot().await.is_none());
    }
}
