use alloy_primitives::Address;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path, str::FromStr, time::Duration};
use tracing::info;

use crate::types::{account::MonitoredAccount, network::Network, thresholds::ThresholdTable};

/// Default per-request timeout in seconds for RPC, HTTP and GraphQL queries
const DEFAULT_RPC_TIMEOUT_S: u64 = 30;

/// Default maximum age of the head block in seconds
const DEFAULT_STALE_BLOCK_THRESHOLD_S: u64 = 5;

/// Default validator liveness window, in blocks per validator
const DEFAULT_VALIDATOR_WINDOW_MULTIPLIER: u64 = 2;

/// Default trailing window in blocks scanned for bridge mints
const DEFAULT_BRIDGE_MINT_WINDOW_BLOCKS: u64 = 1000;

/// Default tolerated indexer lag in blocks
const DEFAULT_INDEX_LAG_THRESHOLD_BLOCKS: u64 = 5;

/// Default maximum number of balance queries in flight
const DEFAULT_BALANCE_CHECK_CONCURRENCY: usize = 5;

/// Default check intervals in seconds
const DEFAULT_VALIDATOR_CHECK_INTERVAL_S: u64 = 60;
const DEFAULT_BRIDGE_CHECK_INTERVAL_S: u64 = 600;
const DEFAULT_BALANCE_CHECK_INTERVAL_S: u64 = 300;
const DEFAULT_INDEX_LAG_CHECK_INTERVAL_S: u64 = 60;

/// Default subject prefix of alert messages
const DEFAULT_ALERT_SUBJECT: &str = "Network Monitor";

/// Reads `key` from the environment, falling back to `default` when unset or unparsable
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

/// Reads a non-empty string from the environment
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Thresholds, intervals and service endpoints taken from the environment
#[derive(Debug, Clone)]
pub(crate) struct MonitorSettings {
    /// Per-request timeout in seconds
    rpc_timeout_s: u64,

    /// Maximum age of the head block in seconds
    stale_block_threshold_s: u64,

    /// Validator liveness window, in blocks per validator
    validator_window_multiplier: u64,

    /// Trailing window in blocks scanned for bridge mints
    bridge_mint_window_blocks: u64,

    /// Tolerated indexer lag in blocks
    index_lag_threshold_blocks: u64,

    /// Maximum number of balance queries in flight
    balance_check_concurrency: usize,

    validator_check_interval_s: u64,
    bridge_check_interval_s: u64,
    balance_check_interval_s: u64,
    index_lag_check_interval_s: u64,

    /// Status report interval in seconds; 0 disables the report
    status_report_interval_s: u64,

    /// Etherscan-compatible explorer API URL
    explorer_api_url: Option<String>,

    /// Explorer API key
    explorer_api_key: Option<String>,

    /// Graph-node index status GraphQL URL
    index_status_url: Option<String>,

    /// Token balances subgraph GraphQL URL
    token_balance_url: Option<String>,

    /// Alert webhook URL; alerts go to the log when unset
    alert_webhook_url: Option<String>,

    /// Subject prefix of alert messages
    alert_subject: String,
}

impl MonitorSettings {
    pub(crate) fn from_env() -> Self {
        let settings = MonitorSettings {
            rpc_timeout_s: env_or("RPC_TIMEOUT_S", DEFAULT_RPC_TIMEOUT_S),
            stale_block_threshold_s: env_or("STALE_BLOCK_THRESHOLD_S", DEFAULT_STALE_BLOCK_THRESHOLD_S),
            validator_window_multiplier: env_or(
                "VALIDATOR_WINDOW_MULTIPLIER",
                DEFAULT_VALIDATOR_WINDOW_MULTIPLIER,
            ),
            bridge_mint_window_blocks: env_or("BRIDGE_MINT_WINDOW_BLOCKS", DEFAULT_BRIDGE_MINT_WINDOW_BLOCKS),
            index_lag_threshold_blocks: env_or(
                "INDEX_LAG_THRESHOLD_BLOCKS",
                DEFAULT_INDEX_LAG_THRESHOLD_BLOCKS,
            ),
            balance_check_concurrency: env_or("BALANCE_CHECK_CONCURRENCY", DEFAULT_BALANCE_CHECK_CONCURRENCY),
            validator_check_interval_s: env_or(
                "VALIDATOR_CHECK_INTERVAL_S",
                DEFAULT_VALIDATOR_CHECK_INTERVAL_S,
            ),
            bridge_check_interval_s: env_or("BRIDGE_CHECK_INTERVAL_S", DEFAULT_BRIDGE_CHECK_INTERVAL_S),
            balance_check_interval_s: env_or("BALANCE_CHECK_INTERVAL_S", DEFAULT_BALANCE_CHECK_INTERVAL_S),
            index_lag_check_interval_s: env_or(
                "INDEX_LAG_CHECK_INTERVAL_S",
                DEFAULT_INDEX_LAG_CHECK_INTERVAL_S,
            ),
            status_report_interval_s: env_or("STATUS_REPORT_INTERVAL_S", 0),
            explorer_api_url: env_opt("EXPLORER_API_URL"),
            explorer_api_key: env_opt("EXPLORER_API_KEY"),
            index_status_url: env_opt("INDEX_STATUS_URL"),
            token_balance_url: env_opt("TOKEN_BALANCE_URL"),
            alert_webhook_url: env_opt("ALERT_WEBHOOK_URL"),
            alert_subject: env_opt("ALERT_SUBJECT").unwrap_or_else(|| DEFAULT_ALERT_SUBJECT.to_string()),
        };

        info!(
            explorer_api_url = ?settings.explorer_api_url,
            index_status_url = ?settings.index_status_url,
            token_balance_url = ?settings.token_balance_url,
            webhook = settings.alert_webhook_url.is_some(),
            "Loaded monitor settings:"
        );

        settings
    }

    /// Getter for `rpc_timeout_s`
    pub(crate) fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_s)
    }

    /// Getter for `stale_block_threshold_s`
    pub(crate) fn stale_block_threshold_s(&self) -> u64 {
        self.stale_block_threshold_s
    }

    /// Getter for `validator_window_multiplier`
    pub(crate) fn validator_window_multiplier(&self) -> u64 {
        self.validator_window_multiplier
    }

    /// Getter for `bridge_mint_window_blocks`
    pub(crate) fn bridge_mint_window_blocks(&self) -> u64 {
        self.bridge_mint_window_blocks
    }

    /// Getter for `index_lag_threshold_blocks`
    pub(crate) fn index_lag_threshold_blocks(&self) -> u64 {
        self.index_lag_threshold_blocks
    }

    /// Getter for `balance_check_concurrency`
    pub(crate) fn balance_check_concurrency(&self) -> usize {
        self.balance_check_concurrency
    }

    pub(crate) fn validator_check_interval(&self) -> Duration {
        Duration::from_secs(self.validator_check_interval_s)
    }

    pub(crate) fn bridge_check_interval(&self) -> Duration {
        Duration::from_secs(self.bridge_check_interval_s)
    }

    pub(crate) fn balance_check_interval(&self) -> Duration {
        Duration::from_secs(self.balance_check_interval_s)
    }

    pub(crate) fn index_lag_check_interval(&self) -> Duration {
        Duration::from_secs(self.index_lag_check_interval_s)
    }

    /// Status report interval, `None` when disabled
    pub(crate) fn status_report_interval(&self) -> Option<Duration> {
        (self.status_report_interval_s > 0).then(|| Duration::from_secs(self.status_report_interval_s))
    }

    pub(crate) fn explorer_api_url(&self) -> Option<&str> {
        self.explorer_api_url.as_deref()
    }

    pub(crate) fn explorer_api_key(&self) -> Option<&str> {
        self.explorer_api_key.as_deref()
    }

    pub(crate) fn index_status_url(&self) -> Option<&str> {
        self.index_status_url.as_deref()
    }

    pub(crate) fn token_balance_url(&self) -> Option<&str> {
        self.token_balance_url.as_deref()
    }

    pub(crate) fn alert_webhook_url(&self) -> Option<&str> {
        self.alert_webhook_url.as_deref()
    }

    pub(crate) fn alert_subject(&self) -> &str {
        &self.alert_subject
    }
}

/// Endpoint of a monitored network
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NetworkEndpoint {
    pub(crate) rpc_url: String,
}

/// Networks, contracts, thresholds and account roster loaded from the config file
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MonitorConfig {
    /// All monitored networks by name
    pub(crate) networks: HashMap<Network, NetworkEndpoint>,

    /// Chain whose validators are monitored and on which tokens are checked
    pub(crate) primary_network: Network,

    /// Chain on which the bridge mints
    pub(crate) secondary_network: Network,

    /// Consensus contract on the primary network
    pub(crate) consensus_address: Address,

    /// Bridge contract on the secondary network
    pub(crate) bridge_address: Address,

    #[serde(default)]
    pub(crate) thresholds: ThresholdTable,

    #[serde(default)]
    pub(crate) accounts: Vec<MonitoredAccount>,

    /// Subgraph indexing each network, for the index lag check
    #[serde(default)]
    pub(crate) subgraphs: HashMap<Network, String>,
}

impl MonitorConfig {
    /// Load and validate the config file
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: MonitorConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;

        info!(
            networks = config.networks.len(),
            accounts = config.accounts.len(),
            primary = %config.primary_network,
            secondary = %config.secondary_network,
            "Loaded monitor config:"
        );

        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for network in [&self.primary_network, &self.secondary_network] {
            if !self.networks.contains_key(network) {
                bail!("network '{network}' has no endpoint configured");
            }
        }
        Ok(())
    }

    /// Networks in name order
    pub(crate) fn network_names(&self) -> Vec<Network> {
        let mut names: Vec<Network> = self.networks.keys().cloned().collect();
        names.sort();
        names
    }
}
