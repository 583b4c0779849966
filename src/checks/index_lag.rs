use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::checks::types::{Anomaly, Check, CheckResult, Target};
use crate::clients::traits::{ChainClient, IndexStatusClient};
use crate::types::network::Network;

/// Compares each network's chain head with the indexer's last synced block
#[derive(Debug)]
pub(crate) struct IndexLagChecker {
    chains: Vec<(Network, Arc<dyn ChainClient>)>,
    status: Arc<dyn IndexStatusClient>,
    /// Largest tolerated lag in blocks
    max_lag: u64,
}

impl IndexLagChecker {
    pub(crate) fn new(
        chains: Vec<(Network, Arc<dyn ChainClient>)>,
        status: Arc<dyn IndexStatusClient>,
        max_lag: u64,
    ) -> Self {
        Self {
            chains,
            status,
            max_lag,
        }
    }

    async fn check_network(&self, network: &Network, client: &dyn ChainClient) -> Result<Option<Anomaly>, Anomaly> {
        let failed = |error: String| Anomaly::CheckFailed {
            check: self.name().to_string(),
            network: Some(network.clone()),
            error,
        };

        let chain_head = client.current_block_number().await.map_err(|e| {
            error!(check = self.name(), %network, error = %e, "Failed to fetch chain head");
            failed(e.to_string())
        })?;

        // Missing indexer status usually means the status service is down
        let indexed_block = self.status.synced_block(network).await.map_err(|e| {
            error!(check = self.name(), %network, error = %e, "Failed to fetch indexing status");
            failed(format!("indexing status unavailable: {e}"))
        })?;

        let lag = chain_head.saturating_sub(indexed_block);
        debug!(%network, chain_head, indexed_block, lag, "Indexing lag");

        if lag > self.max_lag {
            warn!(%network, chain_head, indexed_block, lag, "Indexer is falling behind");
            return Ok(Some(Anomaly::FallingBehind {
                network: network.clone(),
                chain_head,
                indexed_block,
                lag,
            }));
        }

        Ok(None)
    }

    /// Lag anomalies are reported per network, query failures on the general target
    pub(crate) async fn check(&self) -> Vec<CheckResult> {
        let outcomes = join_all(
            self.chains
                .iter()
                .map(|(network, client)| self.check_network(network, client.as_ref())),
        )
        .await;

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for ((network, _), outcome) in self.chains.iter().zip(outcomes) {
            match outcome {
                Ok(Some(anomaly)) => {
                    results.push(CheckResult::new(Target::Network(network.clone()), vec![anomaly]))
                }
                Ok(None) => {}
                Err(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            results.push(CheckResult::new(Target::General, failures));
        }
        results
    }
}

#[async_trait]
impl Check for IndexLagChecker {
    fn name(&self) -> &'static str {
        "index_lag"
    }

    async fn run(&self) -> anyhow::Result<Vec<CheckResult>> {
        Ok(self.check().await)
    }
}
