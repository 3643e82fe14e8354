//! Row and record types
//!
//! `NewsItem` and `PricePoint` serialize to the column names of the
//! `finance_news` and `btc_price` tables.

pub mod news_item;
pub mod price_point;

pub use news_item::*;
pub use price_point::*;

/// Table holding summarized articles
pub const NEWS_TABLE: &str = "finance_news";

/// Table holding Bitcoin price points
pub const PRICE_TABLE: &str = "btc_price";
