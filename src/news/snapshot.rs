use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::item::{Item, NewsRef};
use super::ranker::rank;

/// One complete, ranked, size-bounded list of items and its canonical
/// encoding.
///
/// The only constructor ranks its input, so `items` is always newest first
/// and never longer than the capacity it was built with. Once published the
/// snapshot is shared behind an `Arc` and never modified; the next refresh
/// replaces it wholesale.
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: u64,
    built_at: DateTime<Utc>,
    items: Vec<Item>,
    encoded: Arc<[u8]>,
}

impl Snapshot {
    /// Ranks `items`, keeps the newest `capacity`, and encodes the result.
    ///
    /// The snapshot starts at version 0; the store assigns the real version
    /// when it is published.
    pub fn new(items: Vec<Item>, capacity: usize) -> Result<Self, serde_json::Error> {
        let items = rank(items, capacity);
        let encoded = serde_json::to_vec(&NewsRef { news: &items })?;

        Ok(Self {
            version: 0,
            built_at: Utc::now(),
            items,
            encoded: encoded.into(),
        })
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Canonical `{"news": [...]}` encoding, shared without copying.
    pub fn encoded(&self) -> Arc<[u8]> {
        Arc::clone(&self.encoded)
    }

    /// The same document indented for humans.
    pub fn indented(&self) -> Result<Vec<u8>, serde_json::Error> {
        to_indented(&NewsRef { news: &self.items })
    }
}

/// Serializes with four-space indentation, matching what existing clients
/// of the debug and legacy delta endpoints expect.
pub(crate) fn to_indented<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::NewsList;
    use chrono::FixedOffset;

    fn item(title: &str, rfc3339: &str) -> Item {
        Item {
            title: title.to_string(),
            text: format!("{title} text"),
            link: format!("https://example.com/{title}"),
            published_at: DateTime::<FixedOffset>::parse_from_rfc3339(rfc3339).unwrap(),
        }
    }

    #[test]
    fn test_new_ranks_and_bounds() {
        let snapshot = Snapshot::new(
            vec![
                item("a", "2024-01-01T00:00:00Z"),
                item("c", "2024-01-03T00:00:00Z"),
                item("b", "2024-01-02T00:00:00Z"),
            ],
            2,
        )
        .unwrap();

        assert_eq!(snapshot.version(), 0);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.items()[0].title, "c");
        assert_eq!(snapshot.items()[1].title, "b");
    }

    #[test]
    fn test_encoded_round_trips_to_items() {
        let snapshot = Snapshot::new(
            vec![
                item("a", "2024-01-01T12:00:00+01:00"),
                item("b", "2024-01-02T00:00:00-05:00"),
            ],
            20,
        )
        .unwrap();

        let decoded: NewsList = serde_json::from_slice(&snapshot.encoded()).unwrap();
        assert_eq!(decoded.news, snapshot.items());
    }

    #[test]
    fn test_empty_snapshot_encoding() {
        let snapshot = Snapshot::new(Vec::new(), 20).unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(&*snapshot.encoded(), br#"{"news":[]}"#);
    }

    #[test]
    fn test_indented_uses_four_spaces() {
        let snapshot = Snapshot::new(vec![item("a", "2024-01-01T00:00:00Z")], 20).unwrap();
        let pretty = String::from_utf8(snapshot.indented().unwrap()).unwrap();

        assert!(pretty.starts_with("{\n    \"news\": [\n        {"));
        let reparsed: serde_json::Value = serde_json::from_str(&pretty).unwrap();
        let compact: serde_json::Value = serde_json::from_slice(&snapshot.encoded()).unwrap();
        assert_eq!(reparsed, compact);
    }
}
