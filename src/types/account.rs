use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::types::network::Network;

/// Account whose balance is compared against the threshold of its role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MonitoredAccount {
    /// Human readable description used in alerts
    pub(crate) description: String,
    /// Account address
    pub(crate) address: Address,
    /// Role used to look up the balance threshold
    pub(crate) role: String,
    /// Networks on which the native balance is checked
    #[serde(default)]
    pub(crate) networks: Vec<Network>,
    /// Tokens whose balance is checked on the primary network
    #[serde(default)]
    pub(crate) tokens: Vec<Address>,
}

impl MonitoredAccount {
    /// Accounts configured with tokens are evaluated on token balances only.
    pub(crate) fn is_token_account(&self) -> bool {
        !self.tokens.is_empty()
    }
}
