//! tl-auction-house: entry point.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::Value;

use tl_auction_house::{ConfigOverrides, FetchConfig, HttpClient, Routine};

#[derive(Parser)]
#[command(
    name = "tl-auction-house",
    about = "Fetch Throne and Liberty auction-house listings and item prices from tldb.info",
    version
)]
struct Cli {
    /// Directory the JSON files are written into (env: TLAH_OUTPUT_DIR).
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Request timeout in milliseconds (env: TLAH_TIMEOUT_MS).
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Write dated snapshots under data/<routine>/ instead of overwriting.
    #[arg(long, global = true)]
    timestamped: bool,

    /// Override the auction-house page data URL (env: TLAH_AUCTION_URL).
    #[arg(long, global = true)]
    auction_url: Option<String>,

    /// Override the item prices URL (env: TLAH_PRICES_URL).
    #[arg(long, global = true)]
    prices_url: Option<String>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch auction-house listings into auction_house_data.json.
    Auction,

    /// Fetch item prices into item_prices_data.json.
    Prices,

    /// Run both fetches concurrently.
    All,

    /// Decode a local compress-json blob (or devalue payload) to plain JSON.
    Decode {
        /// JSON file holding the encoded payload.
        input: PathBuf,

        /// Treat the input as a devalue payload instead.
        #[arg(long)]
        devalue: bool,
    },

    /// Encode a plain JSON file as a compress-json blob (or devalue payload).
    Encode {
        /// JSON file to encode.
        input: PathBuf,

        /// Produce a devalue payload instead.
        #[arg(long)]
        devalue: bool,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   tl-auction-house completions bash > ~/.local/share/bash-completion/completions/tl-auction-house
    ///   tl-auction-house completions zsh > ~/.zfunc/_tl-auction-house
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = FetchConfig::resolve(ConfigOverrides {
        output_dir: cli.output_dir,
        timeout_ms: cli.timeout_ms,
        auction_url: cli.auction_url,
        prices_url: cli.prices_url,
        timestamped: cli.timestamped,
    });

    match cli.command {
        Commands::Auction => {
            let client = HttpClient::new(config.timeout_ms, &config.user_agent)?;
            tl_auction_house::run(Routine::AuctionHouse, &client, &config).await;
        }

        Commands::Prices => {
            let client = HttpClient::new(config.timeout_ms, &config.user_agent)?;
            tl_auction_house::run(Routine::ItemPrices, &client, &config).await;
        }

        Commands::All => {
            let client = HttpClient::new(config.timeout_ms, &config.user_agent)?;
            let (auction, prices) = tl_auction_house::run_all(&client, &config).await;
            tracing::debug!(
                "finished: auction house {}, item prices {}",
                outcome(auction.as_deref()),
                outcome(prices.as_deref())
            );
        }

        Commands::Decode { input, devalue } => {
            let encoded = read_json_file(&input)?;
            let decoded = if devalue {
                tl_auction_house::unflatten(&encoded)?
            } else {
                tl_auction_house::decompress(&encoded)?
            };
            println!("{}", serde_json::to_string_pretty(&decoded)?);
        }

        Commands::Encode { input, devalue } => {
            let plain = read_json_file(&input)?;
            let encoded = if devalue {
                tl_auction_house::flatten(&plain)
            } else {
                tl_auction_house::compress(&plain)
            };
            println!("{}", serde_json::to_string(&encoded)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "tl-auction-house", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn read_json_file(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn outcome(written: Option<&Path>) -> String {
    match written {
        Some(path) => path.display().to_string(),
        None => "failed".to_string(),
    }
}
