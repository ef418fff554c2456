//! Core data types for API responses, output documents and errors.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// Optional fields are `None` when the key is absent and `Some(Value::Null)`
// when it is an explicit null; only the former is left out of the output.

/// Reconstructed auction-house payload. `items` is still a compressed blob.
#[derive(Debug, Clone, Deserialize)]
pub struct AuctionPayload {
    pub items: Value,
    #[serde(default, deserialize_with = "present")]
    pub traits: Option<Value>,
}

/// Body of the prices endpoint. Each `list` value is a JSON string holding a
/// compressed blob.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceApiResponse {
    pub list: Map<String, Value>,
    #[serde(default, deserialize_with = "present")]
    pub total: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub regions: Option<Value>,
}

/// Document written to `auction_house_data.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionHouseDocument {
    pub items: Value,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub traits: Option<Value>,
}

/// Document written to `item_prices_data.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPricesDocument {
    pub list: Map<String, Value>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub total: Option<Value>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub regions: Option<Value>,
}

/// A field that is present deserializes to `Some`, even when it is `null`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Errors that can occur while fetching, decoding or persisting data.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(e.to_string())
    }
}

/// Convenience result type.
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auction_payload_without_traits() {
        let payload: AuctionPayload =
            serde_json::from_value(json!({ "items": [["a|"], "0"] })).unwrap();
        assert_eq!(payload.traits, None);
    }

    #[test]
    fn test_auction_payload_null_traits() {
        let payload: AuctionPayload =
            serde_json::from_value(json!({ "items": [["a|"], "0"], "traits": null })).unwrap();
        assert_eq!(payload.traits, Some(Value::Null));
    }

    #[test]
    fn test_price_response_missing_optional_fields() {
        let resp: PriceApiResponse =
            serde_json::from_value(json!({ "list": { "101": "[]" } })).unwrap();
        assert_eq!(resp.list.len(), 1);
        assert_eq!(resp.total, None);
        assert_eq!(resp.regions, None);
    }

    #[test]
    fn test_price_response_requires_list() {
        let result: Result<PriceApiResponse, _> =
            serde_json::from_value(json!({ "total": 3, "regions": {} }));
        assert!(result.is_err());
    }

    #[test]
    fn test_document_omits_absent_fields() {
        let doc = ItemPricesDocument {
            list: Map::new(),
            total: Some(json!(0)),
            regions: None,
        };
        let text = serde_json::to_string(&doc).unwrap();
        assert_eq!(text, r#"{"list":{},"total":0}"#);
    }

    #[test]
    fn test_document_keeps_explicit_nulls() {
        let resp: PriceApiResponse =
            serde_json::from_value(json!({ "list": {}, "total": null, "regions": null })).unwrap();
        let doc = ItemPricesDocument {
            list: resp.list,
            total: resp.total,
            regions: resp.regions,
        };
        let text = serde_json::to_string(&doc).unwrap();
        assert_eq!(text, r#"{"list":{},"total":null,"regions":null}"#);

        let doc = AuctionHouseDocument {
            items: json!([1]),
            traits: Some(Value::Null),
        };
        let text = serde_json::to_string(&doc).unwrap();
        assert_eq!(text, r#"{"items":[1],"traits":null}"#);
    }

    #[test]
    fn test_error_display() {
        let err = FetchError::NotFound("no data node".to_string());
        assert_eq!(err.to_string(), "Not found: no data node");
    }
}
