use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::delta::{parse_cutoff, Delta, DeltaEncoding};
use super::error::{BuildError, QueryError};
use super::snapshot::Snapshot;

/// When a refresh takes the exclusive lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockStrategy {
    /// Build the next snapshot without the lock, lock only to swap it in.
    #[default]
    SwapOnly,
    /// Hold the write lock for the whole fetch, rank and encode. Readers
    /// wait for the refresh to finish.
    HoldDuringRefresh,
}

/// Owner of the currently published snapshot.
///
/// One instance is shared (via `Arc`) between the refresh scheduler and
/// every request handler. The visible state is either "nothing published
/// yet" or one complete snapshot.
#[derive(Debug, Default)]
pub struct CacheService {
    current: RwLock<Option<Arc<Snapshot>>>,
    last_version: AtomicU64,
}

impl CacheService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `snapshot` the current one and returns its version.
    pub async fn publish(&self, snapshot: Snapshot) -> u64 {
        let mut guard = self.current.write().await;
        self.install(&mut guard, snapshot)
    }

    /// Runs `build` and publishes its result according to `strategy`.
    ///
    /// On error the current snapshot is left exactly as it was.
    pub async fn refresh_with<Fut>(&self, strategy: LockStrategy, build: Fut) -> Result<u64, BuildError>
    where
        Fut: Future<Output = Result<Snapshot, BuildError>>,
    {
        match strategy {
            LockStrategy::SwapOnly => {
                let snapshot = build.await?;
                Ok(self.publish(snapshot).await)
            }
            LockStrategy::HoldDuringRefresh => {
                let mut guard = self.current.write().await;
                let snapshot = build.await?;
                Ok(self.install(&mut guard, snapshot))
            }
        }
    }

    fn install(&self, slot: &mut Option<Arc<Snapshot>>, mut snapshot: Snapshot) -> u64 {
        // Only the write-lock holder gets here, so versions follow publish order.
        let version = self.last_version.fetch_add(1, Ordering::AcqRel) + 1;
        snapshot.set_version(version);
        *slot = Some(Arc::new(snapshot));
        version
    }

    /// The current snapshot, or `None` before the first publish.
    pub async fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current.read().await.clone()
    }

    /// Version of the current snapshot; 0 before the first publish.
    pub fn version(&self) -> u64 {
        self.last_version.load(Ordering::Acquire)
    }

    async fn ready(&self) -> Result<Arc<Snapshot>, QueryError> {
        self.current_snapshot().await.ok_or(QueryError::NotReady)
    }

    /// Canonical encoding of the current snapshot.
    pub async fn get_snapshot(&self) -> Result<Arc<[u8]>, QueryError> {
        Ok(self.ready().await?.encoded())
    }

    /// The current snapshot indented for debugging.
    pub async fn get_snapshot_indented(&self) -> Result<Vec<u8>, QueryError> {
        Ok(self.ready().await?.indented()?)
    }

    /// Items of the current snapshot published strictly after `cutoff`.
    pub async fn query_updates_since(
        &self,
        cutoff: DateTime<FixedOffset>,
    ) -> Result<Delta, QueryError> {
        Ok(Delta::new(self.ready().await?, cutoff))
    }

    /// Wire entry point for delta requests.
    ///
    /// A missing or blank cutoff is a full snapshot request.
    pub async fn get_delta(
        &self,
        cutoff: Option<&str>,
        encoding: DeltaEncoding,
    ) -> Result<Arc<[u8]>, QueryError> {
        let raw = match cutoff.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return self.get_snapshot().await,
        };

        let cutoff = parse_cutoff(raw)?;
        let delta = self.query_updates_since(cutoff).await?;
        tracing::debug!(
            cutoff = %cutoff,
            version = delta.version(),
            items = delta.items().len(),
            "Serving delta"
        );
        Ok(delta.encode(encoding)?.into())
    }
}
