//! Finance News Agent
//!
//! Discovers financial news from allow-listed publishers, summarizes each
//! article with an LLM and appends the result to storage. Every run also
//! records the current Bitcoin/USD price.

pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod http_client;
pub mod pipeline;
pub mod price;
pub mod schemas;
pub mod sources;
pub mod storage;
pub mod summarizer;

pub use error::{IngestionError, Result};
