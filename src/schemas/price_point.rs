//! PricePoint Schema

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One `btc_price` row. `created_at` is left to the database default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl PricePoint {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            created_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_payload_omits_created_at() {
        let json = serde_json::to_string(&PricePoint::new(67000.5)).unwrap();
        assert_eq!(json, r#"{"price":67000.5}"#);
    }

    #[test]
    fn test_row_with_server_timestamp() {
        let row: PricePoint =
            serde_json::from_str(r#"{"price": 64210.12, "created_at": "2024-05-01T12:00:00+00:00"}"#).unwrap();
        assert_eq!(row.price, 64210.12);
        assert!(row.created_at.is_some());
    }
}
