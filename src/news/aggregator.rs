use crate::feed::{FetchSource, Source};

use super::error::BuildError;
use super::item::Item;
use super::snapshot::Snapshot;

/// Fetches every source in configured order and builds the next snapshot.
///
/// The first failing source aborts the build; nothing fetched so far is
/// kept. The caller decides what happens to the snapshot currently served.
pub async fn build_snapshot<F: FetchSource>(
    fetcher: &F,
    sources: &[Source],
    capacity: usize,
) -> Result<Snapshot, BuildError> {
    let mut items = Vec::new();

    for source in sources {
        let raw_items = fetcher
            .fetch(source)
            .await
            .map_err(|e| BuildError::from_fetch(&source.name, e))?;

        items.reserve(raw_items.len());
        for raw in raw_items {
            items.push(Item::from_raw(source, raw)?);
        }
    }

    let collected = items.len();
    let snapshot = Snapshot::new(items, capacity)?;

    tracing::debug!(
        sources = sources.len(),
        collected = collected,
        kept = snapshot.len(),
        "Built snapshot"
    );
    Ok(snapshot)
}
