//! Candidate and NewsItem Schemas
//!
//! A `Candidate` is a search hit that has not been checked against storage.
//! A `NewsItem` is a summarized article ready to become a `finance_news` row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Search result restricted to an allow-listed publisher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    /// Canonical article URL
    pub url: String,
    /// Allow-listed publisher domain the URL belongs to
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One `finance_news` row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub source: String,
    #[serde(rename = "finance_info")]
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl NewsItem {
    pub fn from_candidate(candidate: Candidate, summary: String) -> Self {
        Self {
            title: candidate.title,
            url: candidate.url,
            source: candidate.source,
            summary,
            created_at: Utc::now(),
        }
    }

    /// Names the first required column that is blank, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("title", &self.title),
            ("url", &self.url),
            ("source", &self.source),
            ("finance_info", &self.summary),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Candidate {
        Candidate {
            title: "Stocks rally as yields ease".to_string(),
            url: "https://www.cnbc.com/2024/05/01/stocks-rally.html".to_string(),
            source: "cnbc.com".to_string(),
            description: None,
        }
    }

    #[test]
    fn test_news_item_column_names() {
        let item = NewsItem::from_candidate(candidate(), "Stocks rose on Wednesday.".to_string());
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["finance_info"], "Stocks rose on Wednesday.");
        assert_eq!(json["source"], "cnbc.com");
        assert!(json.get("summary").is_none());
        assert!(json["created_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_missing_field() {
        let mut item = NewsItem::from_candidate(candidate(), "A summary.".to_string());
        assert_eq!(item.missing_field(), None);

        item.summary = "   ".to_string();
        assert_eq!(item.missing_field(), Some("finance_info"));
    }

    #[test]
    fn test_candidate_skips_empty_description() {
        let json = serde_json::to_string(&candidate()).unwrap();
        assert!(!json.contains("description"));
    }
}
