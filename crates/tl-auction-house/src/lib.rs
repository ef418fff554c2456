//! tl-auction-house: fetch Throne and Liberty auction-house listings and item
//! prices from tldb.info, rebuild the devalue / compress-json payloads, and
//! save them as plain JSON.

pub mod codec;
pub mod config;
pub mod devalue;
pub mod fetch;
pub mod http;
pub mod storage;
pub mod types;

pub use codec::{compress, decompress};
pub use config::{ConfigOverrides, FetchConfig};
pub use devalue::{flatten, unflatten};
pub use fetch::{fetch_auction_house, fetch_item_prices, run, run_all, Routine};
pub use http::HttpClient;
pub use storage::write_json_pretty;
pub use types::*;
