//! The two fetch routines and their catch-and-log entry points.
//!
//! Each routine is linear: fetch → extract → decompress → persist. Errors
//! stop the routine before anything is written and are logged once here;
//! they never reach the caller.

pub mod auction;
pub mod prices;

use std::path::PathBuf;

use crate::config::FetchConfig;
use crate::http::HttpClient;
use crate::types::FetchResult;

pub use auction::{build_auction_document, fetch_auction_house, find_data_node, AUCTION_TARGET};
pub use prices::{build_price_document, decompress_server_entry, fetch_item_prices, PRICES_TARGET};

/// Which routine to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routine {
    /// Auction-house listings → `auction_house_data.json`.
    AuctionHouse,
    /// Item prices → `item_prices_data.json`.
    ItemPrices,
}

impl Routine {
    pub fn name(&self) -> &'static str {
        match self {
            Routine::AuctionHouse => "auction house",
            Routine::ItemPrices => "item prices",
        }
    }

    /// Fixed prefix of the failure log line.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Routine::AuctionHouse => "Error fetching auction house data",
            Routine::ItemPrices => "Error fetching item prices",
        }
    }

    async fn execute(&self, client: &HttpClient, config: &FetchConfig) -> FetchResult<PathBuf> {
        match self {
            Routine::AuctionHouse => fetch_auction_house(client, config).await,
            Routine::ItemPrices => fetch_item_prices(client, config).await,
        }
    }
}

/// Run one routine, logging any failure. Returns the written path on success.
pub async fn run(routine: Routine, client: &HttpClient, config: &FetchConfig) -> Option<PathBuf> {
    tracing::debug!("starting {} fetch", routine.name());
    match routine.execute(client, config).await {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::error!("{}: {e}", routine.failure_message());
            None
        }
    }
}

/// Run both routines concurrently. They share nothing but the client.
pub async fn run_all(
    client: &HttpClient,
    config: &FetchConfig,
) -> (Option<PathBuf>, Option<PathBuf>) {
    tokio::join!(
        run(Routine::AuctionHouse, client, config),
        run(Routine::ItemPrices, client, config)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routine_messages_differ() {
        assert_ne!(
            Routine::AuctionHouse.failure_message(),
            Routine::ItemPrices.failure_message()
        );
        assert_eq!(Routine::ItemPrices.name(), "item prices");
    }

    #[tokio::test]
    async fn test_run_swallows_connection_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = FetchConfig {
            prices_url: "http://127.0.0.1:9/api/ah/prices".to_string(),
            output_dir: dir.path().to_path_buf(),
            timeout_ms: 2_000,
            ..FetchConfig::default()
        };
        let client = HttpClient::new(config.timeout_ms, &config.user_agent).unwrap();

        assert!(run(Routine::ItemPrices, &client, &config).await.is_none());
        assert!(!PRICES_TARGET.path(dir.path(), None).exists());
    }
}
