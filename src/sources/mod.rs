//! Candidate sources
//!
//! A source turns a search query into allow-listed candidate articles.

pub mod brave;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schemas::Candidate;

/// Metadata about a source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Unique identifier for the source
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Description
    pub description: String,
    /// Rate limit in effect (requests per minute)
    pub rate_limit_rpm: u32,
}

/// Trait for all candidate sources
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Gets metadata about this source
    fn metadata(&self) -> &SourceMetadata;

    /// Runs one search and returns allow-listed candidates in ranking order
    ///
    /// Fails with `SearchUnavailable` when the upstream API cannot be reached
    /// or answers with an error.
    async fn search(&self, query: &str) -> Result<Vec<Candidate>>;

    /// Gets the source ID
    fn id(&self) -> &str {
        &self.metadata().id
    }
}

pub use brave::BraveNewsSource;
