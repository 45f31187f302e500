//! Feed retrieval: the fetch capability the aggregator depends on.
//!
//! - [`FetchSource`] - the trait the aggregator calls, one feed at a time
//! - [`HttpFetcher`] - the production implementation over `reqwest`
//! - RSS 2.0 item extraction with `quick-xml`, with ISO-8859-1 transcoding
//!   for sources that ask for it
//!
//! No retry or backoff happens here: a failed fetch is reported once and the
//! refresh that asked for it decides what to do.

mod charset;
mod fetcher;
mod parser;
mod source;

pub use fetcher::{FetchError, FetchSource, HttpFetcher};
pub use parser::parse_rss;
pub use source::{Decoding, RawItem, Source};
