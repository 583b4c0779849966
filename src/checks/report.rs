use alloy_primitives::Address;
use futures::{
    future::join_all,
    stream::{self, StreamExt},
};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use tracing::warn;

use crate::clients::traits::ChainClient;
use crate::types::{
    account::MonitoredAccount,
    amount::{format_amount, NATIVE_DECIMALS},
    network::Network,
};

/// A value read from a chain, or the error that prevented reading it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub(crate) enum Reading<T> {
    Value(T),
    Error(String),
}

/// Native balance of one roster account on one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct AccountBalance {
    pub(crate) description: String,
    pub(crate) address: Address,
    pub(crate) role: String,
    pub(crate) network: Network,
    /// Human decimal amount
    pub(crate) balance: Reading<String>,
}

/// Body of the periodic status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct StatusReport {
    pub(crate) heads: BTreeMap<Network, Reading<u64>>,
    pub(crate) balances: Vec<AccountBalance>,
}

/// Periodic informational report of every network's head block and the
/// native balance of every roster account
#[derive(Debug)]
pub(crate) struct ChainReport {
    chains: Vec<(Network, Arc<dyn ChainClient>)>,
    accounts: Arc<Vec<MonitoredAccount>>,
    /// Maximum number of balance queries in flight
    concurrency: usize,
}

impl ChainReport {
    pub(crate) fn new(
        chains: Vec<(Network, Arc<dyn ChainClient>)>,
        accounts: Arc<Vec<MonitoredAccount>>,
        concurrency: usize,
    ) -> Self {
        Self {
            chains,
            accounts,
            concurrency: concurrency.max(1),
        }
    }

    async fn heads(&self) -> BTreeMap<Network, Reading<u64>> {
        let heads = join_all(
            self.chains
                .iter()
                .map(|(_, client)| client.current_block_number()),
        )
        .await;

        self.chains
            .iter()
            .zip(heads)
            .map(|((network, _), head)| {
                let reading = match head {
                    Ok(number) => Reading::Value(number),
                    Err(e) => {
                        warn!(%network, error = %e, "Failed to fetch head for report");
                        Reading::Error(e.to_string())
                    }
                };
                (network.clone(), reading)
            })
            .collect()
    }

    async fn balances(&self) -> Vec<AccountBalance> {
        let mut lookups = Vec::new();
        for account in self.accounts.iter() {
            for network in &account.networks {
                match self.chains.iter().find(|(n, _)| n == network) {
                    Some((_, client)) => lookups.push((account.clone(), network.clone(), Arc::clone(client))),
                    None => warn!(account = %account.address, %network, "Network is not configured, skipping"),
                }
            }
        }

        let fetches: Vec<_> = lookups
            .into_iter()
            .enumerate()
            .map(|(seq, (account, network, client))| fetch_balance(seq, account, network, client))
            .collect();
        let mut balances: Vec<(usize, AccountBalance)> = stream::iter(fetches)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        balances.sort_by_key(|(seq, _)| *seq);
        balances.into_iter().map(|(_, entry)| entry).collect()
    }

    pub(crate) async fn collect(&self) -> StatusReport {
        StatusReport {
            heads: self.heads().await,
            balances: self.balances().await,
        }
    }
}

/// Fetch one account's native balance; `seq` is carried through for ordering
async fn fetch_balance(
    seq: usize,
    account: MonitoredAccount,
    network: Network,
    client: Arc<dyn ChainClient>,
) -> (usize, AccountBalance) {
    let balance = match client.native_balance(account.address).await {
        Ok(amount) => Reading::Value(format_amount(amount, NATIVE_DECIMALS)),
        Err(e) => {
            warn!(account = %account.address, %network, error = %e, "Failed to fetch balance for report");
            Reading::Error(e.to_string())
        }
    };
    let entry = AccountBalance {
        description: account.description,
        address: account.address,
        role: account.role,
        network,
        balance,
    };
    (seq, entry)
}
