//! Configuration loading and resolution.
//!
//! Every setting resolves as: explicit value (CLI flag), then environment
//! variable, then built-in default.

use std::path::PathBuf;

/// Auction-house page data endpoint.
pub const DEFAULT_AUCTION_URL: &str = "https://tldb.info/auction-house/__data.json";

/// Item prices endpoint.
pub const DEFAULT_PRICES_URL: &str = "https://tldb.info/api/ah/prices";

/// Request timeout when nothing else is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// The endpoints answer plain clients with a challenge page.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/115.0.0.0 Safari/537.36";

pub const ENV_OUTPUT_DIR: &str = "TLAH_OUTPUT_DIR";
pub const ENV_TIMEOUT_MS: &str = "TLAH_TIMEOUT_MS";
pub const ENV_AUCTION_URL: &str = "TLAH_AUCTION_URL";
pub const ENV_PRICES_URL: &str = "TLAH_PRICES_URL";

/// Settings shared by both fetch routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub auction_url: String,
    pub prices_url: String,
    /// Directory the output files are written into.
    pub output_dir: PathBuf,
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Write dated snapshots under `data/<routine>/` instead of overwriting
    /// the fixed file names.
    pub timestamped: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            auction_url: DEFAULT_AUCTION_URL.to_string(),
            prices_url: DEFAULT_PRICES_URL.to_string(),
            output_dir: PathBuf::from("."),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timestamped: false,
        }
    }
}

/// Explicit overrides, usually parsed from the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub auction_url: Option<String>,
    pub prices_url: Option<String>,
    pub timestamped: bool,
}

impl FetchConfig {
    /// Resolve the configuration from overrides and the process environment.
    pub fn resolve(overrides: ConfigOverrides) -> Self {
        Self::resolve_with(overrides, |name| std::env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with(
        overrides: ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let defaults = Self::default();

        let output_dir = overrides
            .output_dir
            .or_else(|| env(ENV_OUTPUT_DIR).map(PathBuf::from))
            .unwrap_or(defaults.output_dir);

        let timeout_ms = overrides
            .timeout_ms
            .or_else(|| {
                let raw = env(ENV_TIMEOUT_MS)?;
                match raw.trim().parse::<u64>() {
                    Ok(ms) if ms > 0 => Some(ms),
                    _ => {
                        tracing::warn!(
                            "ignoring {ENV_TIMEOUT_MS}={raw:?}, using {}ms",
                            defaults.timeout_ms
                        );
                        None
                    }
                }
            })
            .unwrap_or(defaults.timeout_ms);

        let auction_url = overrides
            .auction_url
            .or_else(|| env(ENV_AUCTION_URL))
            .unwrap_or(defaults.auction_url);

        let prices_url = overrides
            .prices_url
            .or_else(|| env(ENV_PRICES_URL))
            .unwrap_or(defaults.prices_url);

        Self {
            auction_url,
            prices_url,
            output_dir,
            timeout_ms,
            user_agent: defaults.user_agent,
            timestamped: overrides.timestamped,
        }
    }
}
