//! The news cache: aggregation, ranking, snapshot publishing and delta
//! queries.
//!
//! # Architecture
//!
//! - [`build_snapshot`] fetches every configured source, normalizes entries
//!   into [`Item`]s and produces a ranked, size-bounded [`Snapshot`]
//! - [`CacheService`] owns the published snapshot behind a single
//!   read-write lock and answers reader queries
//! - [`RefreshScheduler`] is the only writer, rebuilding on an interval
//! - [`delta`] implements the "what changed since T" protocol
//!
//! # Example
//!
//! ```ignore
//! let service = Arc::new(CacheService::new());
//! let scheduler = RefreshScheduler::new(service.clone(), HttpFetcher::default(), settings);
//! tokio::spawn(scheduler.run(shutdown_rx));
//!
//! let body = service.get_delta(Some("20240102000000+0100"), DeltaEncoding::Tagged).await?;
//! ```

mod aggregator;
pub mod delta;
mod error;
mod item;
mod ranker;
mod scheduler;
mod snapshot;
mod store;

pub use aggregator::build_snapshot;
pub use delta::{Delta, DeltaEncoding, DeltaEnvelope};
pub use error::{BuildError, QueryError};
pub use item::{Item, NewsList};
pub use ranker::rank;
pub use scheduler::{RefreshFailurePolicy, RefreshScheduler, RefreshSettings, SchedulerState};
pub use snapshot::Snapshot;
pub use store::{CacheService, LockStrategy};
