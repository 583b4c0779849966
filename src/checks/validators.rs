use alloy_primitives::Address;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, error, warn};

use crate::checks::types::{Anomaly, Check, CheckResult, Target};
use crate::clients::{errors::ClientError, traits::ChainClient};
use crate::types::network::Network;

sol! {
    /// Current validator set of the consensus contract
    function getValidators() external view returns (address[] memory);
}

/// Detects a stalled chain head and validators that stopped authoring blocks
#[derive(Debug)]
pub(crate) struct ValidatorLivenessChecker {
    network: Network,
    client: Arc<dyn ChainClient>,
    /// Consensus contract holding the validator set
    consensus: Address,
    /// Maximum accepted age of the head block in seconds
    stale_threshold_secs: u64,
    /// Window size in blocks per validator
    window_multiplier: u64,
}

impl ValidatorLivenessChecker {
    pub(crate) fn new(
        network: Network,
        client: Arc<dyn ChainClient>,
        consensus: Address,
        stale_threshold_secs: u64,
        window_multiplier: u64,
    ) -> Self {
        Self {
            network,
            client,
            consensus,
            stale_threshold_secs,
            window_multiplier,
        }
    }

    /// Validator set with duplicates removed, in contract order
    async fn validator_set(&self) -> Result<Vec<Address>, ClientError> {
        let output = self
            .client
            .call(self.consensus, getValidatorsCall {}.abi_encode().into())
            .await?;
        let validators = getValidatorsCall::abi_decode_returns(&output, true)
            .map_err(|e| ClientError::Malformed(format!("invalid getValidators output: {e}")))?
            ._0;

        let mut seen = HashSet::new();
        Ok(validators.into_iter().filter(|v| seen.insert(*v)).collect())
    }

    /// Run the check as of `now`
    pub(crate) async fn check_at(&self, now: DateTime<Utc>) -> Result<CheckResult, ClientError> {
        let mut anomalies = Vec::new();

        let head_number = self.client.current_block_number().await?;
        let head = self.client.block(head_number).await?;

        let diff_secs = now.timestamp() - head.timestamp as i64;
        if diff_secs > self.stale_threshold_secs as i64 {
            warn!(network = %self.network, block = head.number, diff_secs, "Chain head is stale");
            anomalies.push(Anomaly::StaleChainHead {
                block_number: head.number,
                diff_secs,
                threshold_secs: self.stale_threshold_secs,
            });
        }

        let validators = self.validator_set().await?;
        let window_blocks = self.window_multiplier * validators.len() as u64;

        let mut authors = HashSet::new();
        if window_blocks > 0 {
            authors.insert(head.author);
            let lowest = head_number.saturating_sub(window_blocks - 1);
            for number in (lowest..head_number).rev() {
                authors.insert(self.client.block(number).await?.author);
            }
        }

        let missing: Vec<Address> = validators
            .iter()
            .filter(|v| !authors.contains(*v))
            .copied()
            .collect();

        debug!(
            network = %self.network,
            validators = validators.len(),
            window_blocks,
            authors = authors.len(),
            "Scanned block authors"
        );

        if !missing.is_empty() {
            warn!(network = %self.network, ?missing, window_blocks, "Validators are not mining");
            anomalies.push(Anomaly::ValidatorsNotMining {
                missing,
                window_blocks,
            });
        }

        Ok(CheckResult::new(Target::Network(self.network.clone()), anomalies))
    }
}

#[async_trait]
impl Check for ValidatorLivenessChecker {
    fn name(&self) -> &'static str {
        "validator_liveness"
    }

    /// Query failures are reported as a `CheckFailed` anomaly on the general target
    async fn run(&self) -> anyhow::Result<Vec<CheckResult>> {
        let result = match self.check_at(Utc::now()).await {
            Ok(result) => result,
            Err(e) => {
                error!(check = self.name(), network = %self.network, error = %e, "Validator liveness check failed");
                CheckResult::new(
                    Target::General,
                    vec![Anomaly::CheckFailed {
                        check: self.name().to_string(),
                        network: Some(self.network.clone()),
                        error: e.to_string(),
                    }],
                )
            }
        };
        Ok(vec![result])
    }
}
