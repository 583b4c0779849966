use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::types::network::Network;

/// Label of the alert target that collects anomalies not tied to one network
pub(crate) const GENERAL_TARGET: &str = "general";

/// Where the anomalies of a [`CheckResult`] are reported
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Target {
    Network(Network),
    General,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Network(network) => write!(f, "{network}"),
            Target::General => f.write_str(GENERAL_TARGET),
        }
    }
}

/// Condition detected by a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Anomaly {
    /// Head block is older than the staleness threshold
    StaleChainHead {
        block_number: u64,
        diff_secs: i64,
        threshold_secs: u64,
    },
    /// Validators that authored no block in the trailing window
    ValidatorsNotMining {
        missing: Vec<Address>,
        window_blocks: u64,
    },
    /// Bridge minted nothing in the trailing window
    NoMintObserved {
        bridge: Address,
        start_block: u64,
        end_block: u64,
    },
    /// Transfer history could not be read, so minting is unconfirmed
    MintUnconfirmed {
        bridge: Address,
        start_block: u64,
        end_block: u64,
        reason: String,
    },
    /// Balance strictly below the threshold of the account role
    LowBalance {
        description: String,
        address: Address,
        role: String,
        network: Network,
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<Address>,
        balance: String,
        threshold: String,
    },
    /// Indexer is more than the allowed number of blocks behind the chain head
    FallingBehind {
        network: Network,
        chain_head: u64,
        indexed_block: u64,
        lag: u64,
    },
    /// A query failed and the check could not reach a verdict
    CheckFailed {
        check: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        network: Option<Network>,
        error: String,
    },
}

/// Anomalies found by one check for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CheckResult {
    pub(crate) target: Target,
    pub(crate) anomalies: Vec<Anomaly>,
}

impl CheckResult {
    pub(crate) fn new(target: Target, anomalies: Vec<Anomaly>) -> Self {
        Self { target, anomalies }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// A named check run by the scheduler
#[async_trait]
pub(crate) trait Check: Send + Sync {
    /// Name used in logs and alert subjects
    fn name(&self) -> &'static str;

    /// Run the check once. Results with no anomalies produce no alert.
    async fn run(&self) -> anyhow::Result<Vec<CheckResult>>;
}
