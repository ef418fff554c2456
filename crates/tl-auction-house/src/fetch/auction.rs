//! Auction-house listings: page data → devalue → compress-json → file.

use std::path::PathBuf;
use std::time::Instant;

use serde_json::Value;

use crate::codec::decompress;
use crate::config::FetchConfig;
use crate::devalue::unflatten;
use crate::http::HttpClient;
use crate::storage::{write_json_pretty, OutputTarget};
use crate::types::{AuctionHouseDocument, AuctionPayload, FetchError, FetchResult};

/// `auction_house_data.json`, snapshots under `data/auction_house/`.
pub const AUCTION_TARGET: OutputTarget = OutputTarget {
    stem: "auction_house_data",
    snapshot_dir: "auction_house",
};

/// Return the `data` field of the first node whose `type` is `"data"`.
pub fn find_data_node(api_resp: &Value) -> FetchResult<&Value> {
    let nodes = api_resp
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::NotFound("response has no nodes array".to_string()))?;

    let node = nodes
        .iter()
        .find(|node| node.get("type").and_then(Value::as_str) == Some("data"))
        .ok_or_else(|| {
            FetchError::NotFound(format!("no data node among {} nodes", nodes.len()))
        })?;

    Ok(node.get("data").unwrap_or(&Value::Null))
}

/// Turn a page data response into the document that gets saved.
pub fn build_auction_document(api_resp: &Value) -> FetchResult<AuctionHouseDocument> {
    let flattened = find_data_node(api_resp)?;
    let reconstructed = unflatten(flattened)?;
    let payload: AuctionPayload = serde_json::from_value(reconstructed)
        .map_err(|e| FetchError::Decode(format!("auction payload: {e}")))?;

    let items = decompress(&payload.items)?;
    Ok(AuctionHouseDocument {
        items,
        traits: payload.traits,
    })
}

/// Fetch the auction-house listings and write them to disk.
///
/// Returns the path of the written file. Nothing is written on error.
pub async fn fetch_auction_house(
    client: &HttpClient,
    config: &FetchConfig,
) -> FetchResult<PathBuf> {
    let started = Instant::now();
    let api_resp = client.get_json(&config.auction_url).await?;
    let fetched = started.elapsed();

    let started = Instant::now();
    let document = build_auction_document(&api_resp)?;
    tracing::debug!(
        "auction house: fetch {:?}, reconstruct and decompress {:?}",
        fetched,
        started.elapsed()
    );

    let timestamp = config.timestamped.then(chrono::Utc::now);
    let path = AUCTION_TARGET.path(&config.output_dir, timestamp);
    write_json_pretty(&path, &document)?;

    let item_count = document.items.as_array().map(Vec::len).unwrap_or(0);
    tracing::info!(
        "auction house data saved to {} ({item_count} items)",
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::compress;
    use crate::devalue::flatten;
    use serde_json::json;

    fn page(nodes: Value) -> Value {
        json!({ "type": "data", "nodes": nodes })
    }

    #[test]
    fn test_find_first_data_node() {
        let resp = page(json!([
            null,
            { "type": "skip" },
            { "type": "data", "data": [1] },
            { "type": "data", "data": [2] }
        ]));
        assert_eq!(find_data_node(&resp).unwrap(), &json!([1]));
    }

    #[test]
    fn test_missing_nodes_is_not_found() {
        assert!(matches!(
            find_data_node(&json!({})),
            Err(FetchError::NotFound(_))
        ));
        assert!(matches!(
            find_data_node(&json!({ "nodes": "nope" })),
            Err(FetchError::NotFound(_))
        ));
        assert!(matches!(
            find_data_node(&page(json!([{ "type": "skip" }]))),
            Err(FetchError::NotFound(_))
        ));
    }

    #[test]
    fn test_build_document() {
        let items = json!([{ "num": 1, "name": "Sword" }]);
        let flat = flatten(&json!({ "items": compress(&items), "traits": { "7": "Heavy" } }));
        let doc = build_auction_document(&page(json!([{ "type": "data", "data": flat }]))).unwrap();
        assert_eq!(doc.items, items);
        assert_eq!(doc.traits, Some(json!({ "7": "Heavy" })));
    }

    #[test]
    fn test_build_document_keeps_null_traits() {
        let flat = flatten(&json!({ "items": compress(&json!([1])), "traits": null }));
        let doc = build_auction_document(&page(json!([{ "type": "data", "data": flat }]))).unwrap();
        assert_eq!(doc.traits, Some(Value::Null));
        assert_eq!(
            serde_json::to_string(&doc).unwrap(),
            r#"{"items":[1],"traits":null}"#
        );
    }

    #[test]
    fn test_build_document_missing_items() {
        let flat = json!([{ "traits": 1 }, {}]);
        let result = build_auction_document(&page(json!([{ "type": "data", "data": flat }])));
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_data_node_without_data() {
        let result = build_auction_document(&page(json!([{ "type": "data" }])));
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }
}
