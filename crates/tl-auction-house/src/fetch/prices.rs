//! Item prices: per-server compress-json strings → decompressed document.

use std::path::PathBuf;
use std::time::Instant;

use serde_json::{Map, Value};

use crate::codec::decompress;
use crate::config::FetchConfig;
use crate::http::HttpClient;
use crate::storage::{write_json_pretty, OutputTarget};
use crate::types::{FetchError, FetchResult, ItemPricesDocument, PriceApiResponse};

/// `item_prices_data.json`, snapshots under `data/item_prices/`.
pub const PRICES_TARGET: OutputTarget = OutputTarget {
    stem: "item_prices_data",
    snapshot_dir: "item_prices",
};

/// Decode one `list` entry: a JSON string holding a compressed blob.
pub fn decompress_server_entry(server: &str, entry: &Value) -> FetchResult<Value> {
    let text = entry.as_str().ok_or_else(|| {
        FetchError::Decode(format!("server {server}: price entry is not a string"))
    })?;
    let blob: Value = serde_json::from_str(text).map_err(|e| {
        FetchError::Decode(format!("server {server}: price entry is not valid JSON: {e}"))
    })?;
    decompress(&blob).map_err(|e| match e {
        FetchError::Decode(msg) => FetchError::Decode(format!("server {server}: {msg}")),
        other => other,
    })
}

/// Decompress every server entry of a prices response.
///
/// The first bad entry aborts the whole document.
pub fn build_price_document(resp: PriceApiResponse) -> FetchResult<ItemPricesDocument> {
    let mut list = Map::new();
    for (server, entry) in &resp.list {
        list.insert(server.clone(), decompress_server_entry(server, entry)?);
    }

    Ok(ItemPricesDocument {
        list,
        total: resp.total,
        regions: resp.regions,
    })
}

/// Fetch the item prices and write them to disk.
///
/// Returns the path of the written file. Nothing is written on error.
pub async fn fetch_item_prices(client: &HttpClient, config: &FetchConfig) -> FetchResult<PathBuf> {
    let started = Instant::now();
    let body = client.get_json(&config.prices_url).await?;
    let fetched = started.elapsed();

    let resp: PriceApiResponse = serde_json::from_value(body)
        .map_err(|e| FetchError::Network(format!("malformed prices response: {e}")))?;

    let started = Instant::now();
    let document = build_price_document(resp)?;
    tracing::debug!(
        "item prices: fetch {:?}, decompress {:?}",
        fetched,
        started.elapsed()
    );

    let timestamp = config.timestamped.then(chrono::Utc::now);
    let path = PRICES_TARGET.path(&config.output_dir, timestamp);
    write_json_pretty(&path, &document)?;

    tracing::info!(
        "item prices saved to {} ({} servers)",
        path.display(),
        document.list.len()
    );
    Ok(path)
}
