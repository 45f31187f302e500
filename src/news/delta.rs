//! Incremental "what changed since T" queries.
//!
//! Cutoffs arrive as `YYYYMMDDHHMMSS±HHMM`. Results come back either as a
//! tagged envelope or in the legacy form, where an empty result is the single
//! byte `0`.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::QueryError;
use super::item::{Item, NewsRef};
use super::snapshot::{to_indented, Snapshot};

const CUTOFF_FORMAT: &str = "%Y%m%d%H%M%S%z";

/// Body of an empty legacy delta response.
pub const LEGACY_UNCHANGED: &[u8] = b"0";

/// How delta responses are encoded on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeltaEncoding {
    /// `{"changed": false, ...}` / `{"changed": true, "news": [...]}`
    #[default]
    Tagged,
    /// `0` when nothing is new, else the indented `{"news": [...]}` document
    Legacy,
}

/// Parses a wire cutoff such as `20240102000000+0100`.
///
/// Query strings often arrive with `+` already decoded to a space; a space
/// in the sign position is read as `+`.
pub fn parse_cutoff(raw: &str) -> Result<DateTime<FixedOffset>, QueryError> {
    let trimmed = raw.trim_start();
    let normalized = match trimmed.char_indices().nth(14) {
        Some((idx, ' ')) => format!("{}+{}", &trimmed[..idx], trimmed[idx + 1..].trim_end()),
        _ => trimmed.trim_end().to_string(),
    };

    DateTime::parse_from_str(&normalized, CUTOFF_FORMAT).map_err(|reason| {
        QueryError::MalformedCutoff {
            raw: raw.to_string(),
            reason,
        }
    })
}

/// Formats an instant in the wire cutoff format, keeping its offset.
pub fn format_cutoff(at: &DateTime<FixedOffset>) -> String {
    at.format(CUTOFF_FORMAT).to_string()
}

/// The leading run of `items` published strictly after `cutoff`.
///
/// `items` must be newest first. The scan stops at the first item that is
/// not newer than the cutoff.
pub fn updates_since(items: &[Item], cutoff: DateTime<FixedOffset>) -> &[Item] {
    let end = items
        .iter()
        .position(|item| item.published_at <= cutoff)
        .unwrap_or(items.len());
    &items[..end]
}

/// Result of a delta query against one snapshot version.
#[derive(Debug, Clone)]
pub struct Delta {
    snapshot: Arc<Snapshot>,
    len: usize,
}

impl Delta {
    pub(crate) fn new(snapshot: Arc<Snapshot>, cutoff: DateTime<FixedOffset>) -> Self {
        let len = updates_since(snapshot.items(), cutoff).len();
        Self { snapshot, len }
    }

    /// Whether any item is newer than the cutoff.
    pub fn changed(&self) -> bool {
        self.len > 0
    }

    pub fn items(&self) -> &[Item] {
        &self.snapshot.items()[..self.len]
    }

    /// Version of the snapshot the delta was computed against.
    pub fn version(&self) -> u64 {
        self.snapshot.version()
    }

    pub fn encode(&self, encoding: DeltaEncoding) -> Result<Vec<u8>, serde_json::Error> {
        match encoding {
            DeltaEncoding::Tagged => serde_json::to_vec(&TaggedDelta {
                changed: self.changed(),
                version: self.version(),
                news: self.changed().then(|| self.items()),
            }),
            DeltaEncoding::Legacy if !self.changed() => Ok(LEGACY_UNCHANGED.to_vec()),
            DeltaEncoding::Legacy => to_indented(&NewsRef { news: self.items() }),
        }
    }
}

#[derive(Serialize)]
struct TaggedDelta<'a> {
    changed: bool,
    version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    news: Option<&'a [Item]>,
}

/// Decoded form of a tagged delta response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeltaEnvelope {
    pub changed: bool,
    pub version: u64,
    #[serde(default)]
    pub news: Vec<Item>,
}
