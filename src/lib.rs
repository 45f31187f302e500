//! Aggregates RSS feeds into one ranked, size-bounded news list, keeps it
//! fresh in the background, and answers full and incremental queries
//! against it.

pub mod config;
pub mod feed;
pub mod news;
