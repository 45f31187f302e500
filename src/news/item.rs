use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::feed::{RawItem, Source};

use super::error::BuildError;

/// A normalized news item.
///
/// Items carry no identity: the same story from two feeds, or from two
/// refreshes, shows up twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub text: String,
    pub link: String,
    /// Publication time with the offset the feed declared.
    #[serde(rename = "pubDate")]
    pub published_at: DateTime<FixedOffset>,
}

impl Item {
    /// Normalizes one raw feed entry, tagging its title with the source name.
    pub fn from_raw(source: &Source, raw: RawItem) -> Result<Self, BuildError> {
        let published_at = DateTime::parse_from_rfc2822(raw.pub_date.trim()).map_err(|reason| {
            BuildError::TimestampParse {
                feed: source.name.clone(),
                raw: raw.pub_date.clone(),
                reason,
            }
        })?;

        Ok(Self {
            title: format!("[{}] {}", source.name, raw.title.trim()),
            text: raw.description.trim().to_string(),
            link: raw.link,
            published_at,
        })
    }
}

/// Wire document shared by full snapshots and delta responses: `{"news": [...]}`.
#[derive(Debug, Serialize)]
pub(crate) struct NewsRef<'a> {
    pub news: &'a [Item],
}

/// Owned counterpart of [`NewsRef`], for consumers decoding a response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewsList {
    pub news: Vec<Item>,
}
