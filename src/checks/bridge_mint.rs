use alloy_primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::checks::types::{Anomaly, Check, CheckResult, Target};
use crate::clients::{
    traits::{BridgeHistoryClient, ChainClient},
    types::{Transfer, TransferHistory},
};
use crate::types::network::Network;

/// Detects absence of bridge minting on the secondary chain within a trailing window
#[derive(Debug)]
pub(crate) struct BridgeMintChecker {
    /// Secondary network
    network: Network,
    client: Arc<dyn ChainClient>,
    history: Arc<dyn BridgeHistoryClient>,
    /// Bridge contract address
    bridge: Address,
    /// Trailing window size in blocks
    window_blocks: u64,
}

/// A transfer from the zero address is a mint
fn is_mint(transfer: &Transfer) -> bool {
    transfer.from == Address::ZERO
}

impl BridgeMintChecker {
    pub(crate) fn new(
        network: Network,
        client: Arc<dyn ChainClient>,
        history: Arc<dyn BridgeHistoryClient>,
        bridge: Address,
        window_blocks: u64,
    ) -> Self {
        Self {
            network,
            client,
            history,
            bridge,
            window_blocks,
        }
    }

    /// Scan the trailing window. Query failures are reported as anomalies,
    /// never as a clean result.
    pub(crate) async fn check(&self) -> CheckResult {
        let target = Target::Network(self.network.clone());

        let end_block = match self.client.current_block_number().await {
            Ok(number) => number,
            Err(e) => {
                error!(check = self.name(), network = %self.network, error = %e, "Failed to fetch block number");
                let anomaly = Anomaly::CheckFailed {
                    check: self.name().to_string(),
                    network: Some(self.network.clone()),
                    error: e.to_string(),
                };
                return CheckResult::new(target, vec![anomaly]);
            }
        };
        let start_block = end_block.saturating_sub(self.window_blocks);

        let history = self
            .history
            .transfers(self.bridge, start_block, end_block)
            .await;

        let anomaly = match history {
            Ok(TransferHistory::Ok(transfers)) => {
                let mint = transfers
                    .iter()
                    .filter(|t| (start_block..=end_block).contains(&t.block_number))
                    .find(|t| is_mint(t));
                if let Some(mint) = mint {
                    info!(
                        network = %self.network,
                        block = mint.block_number,
                        to = %mint.to,
                        value = %mint.value,
                        "Bridge mint observed"
                    );
                    return CheckResult::new(target, Vec::new());
                }
                warn!(network = %self.network, start_block, end_block, "No bridge mint observed");
                Anomaly::NoMintObserved {
                    bridge: self.bridge,
                    start_block,
                    end_block,
                }
            }
            Ok(TransferHistory::Failed(reason)) => {
                warn!(network = %self.network, %reason, "Transfer history query reported failure");
                Anomaly::MintUnconfirmed {
                    bridge: self.bridge,
                    start_block,
                    end_block,
                    reason,
                }
            }
            Err(e) => {
                error!(check = self.name(), network = %self.network, error = %e, "Failed to fetch transfer history");
                Anomaly::MintUnconfirmed {
                    bridge: self.bridge,
                    start_block,
                    end_block,
                    reason: e.to_string(),
                }
            }
        };

        CheckResult::new(target, vec![anomaly])
    }
}

#[async_trait]
impl Check for BridgeMintChecker {
    fn name(&self) -> &'static str {
        "bridge_mint"
    }

    async fn run(&self) -> anyhow::Result<Vec<CheckResult>> {
        Ok(vec![self.check().await])
    }
}
