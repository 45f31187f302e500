use serde::Deserialize;

/// Character set handling requested for a feed.
///
/// Most feeds are UTF-8. Some older publishers still serve ISO-8859-1 and
/// declare it in the XML prolog, which needs transcoding before parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Decoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "latin1", alias = "iso-8859-1")]
    Latin1,
}

/// A configured feed. Read-only once the service is running.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Source {
    /// Short tag prefixed to every item title, e.g. `[NRK] `.
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub decoding: Decoding,
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            decoding: Decoding::Utf8,
        }
    }

    pub fn with_decoding(mut self, decoding: Decoding) -> Self {
        self.decoding = decoding;
        self
    }
}

/// One entry as it appears in the feed document, before normalization.
///
/// `pub_date` is kept verbatim so a parse failure can report the raw value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}
