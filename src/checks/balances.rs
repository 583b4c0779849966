use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::{info, warn};

use crate::checks::types::{Anomaly, Check, CheckResult, Target};
use crate::clients::{
    errors::ClientError,
    traits::{ChainClient, TokenBalanceClient},
    types::TokenBalance,
};
use crate::types::{
    account::MonitoredAccount,
    amount::{format_amount, DecimalAmount, NATIVE_DECIMALS},
    network::Network,
    thresholds::ThresholdTable,
};

/// Single balance lookup planned for one invocation
enum Lookup {
    Native {
        account: MonitoredAccount,
        network: Network,
        client: Arc<dyn ChainClient>,
        threshold: DecimalAmount,
    },
    Token {
        account: MonitoredAccount,
        network: Network,
        token: Address,
        client: Arc<dyn TokenBalanceClient>,
        threshold: DecimalAmount,
    },
}

/// True when `balance` is strictly below `threshold`.
///
/// Both sides are scaled to the finer of the token decimals and the threshold
/// precision, so a threshold finer than the token unit still compares exactly.
fn is_below(balance: TokenBalance, threshold: &DecimalAmount) -> Result<bool, ClientError> {
    let scale = balance.decimals.max(NATIVE_DECIMALS);
    let minimum = threshold
        .to_base_units(scale)
        .map_err(|e| ClientError::Malformed(format!("threshold {threshold}: {e}")))?;

    let factor = U256::from(10u64).pow(U256::from(scale - balance.decimals));
    Ok(match balance.amount.checked_mul(factor) {
        Some(scaled) => scaled < minimum,
        // larger than any threshold we can express
        None => false,
    })
}

impl Lookup {
    fn network(&self) -> &Network {
        match self {
            Lookup::Native { network, .. } | Lookup::Token { network, .. } => network,
        }
    }

    fn account(&self) -> &MonitoredAccount {
        match self {
            Lookup::Native { account, .. } | Lookup::Token { account, .. } => account,
        }
    }

    /// Fetch the balance and compare it against the threshold
    async fn evaluate(&self) -> Result<Option<Anomaly>, ClientError> {
        let (balance, token, threshold) = match self {
            Lookup::Native {
                account,
                client,
                threshold,
                ..
            } => {
                let amount = client.native_balance(account.address).await?;
                let balance = TokenBalance {
                    amount,
                    decimals: NATIVE_DECIMALS,
                };
                (balance, None, threshold)
            }
            Lookup::Token {
                account,
                token,
                client,
                threshold,
                ..
            } => {
                // No indexer record means the account holds none of the token
                let balance = client
                    .balance(account.address, *token)
                    .await?
                    .unwrap_or(TokenBalance {
                        amount: U256::ZERO,
                        decimals: NATIVE_DECIMALS,
                    });
                (balance, Some(*token), threshold)
            }
        };

        if !is_below(balance, threshold)? {
            return Ok(None);
        }

        let account = self.account();
        Ok(Some(Anomaly::LowBalance {
            description: account.description.clone(),
            address: account.address,
            role: account.role.clone(),
            network: self.network().clone(),
            token,
            balance: format_amount(balance.amount, balance.decimals),
            threshold: threshold.to_string(),
        }))
    }
}

/// Outcome of one lookup, tagged with its position in the plan
enum Outcome {
    Low(usize, Network, Anomaly),
    Failed,
}

/// Compares native and token balances of the account roster against role thresholds
#[derive(Debug)]
pub(crate) struct BalanceThresholdChecker {
    accounts: Arc<Vec<MonitoredAccount>>,
    thresholds: Arc<ThresholdTable>,
    chains: HashMap<Network, Arc<dyn ChainClient>>,
    /// Network on which token balances are evaluated
    primary: Network,
    tokens: Option<Arc<dyn TokenBalanceClient>>,
    /// Maximum number of balance queries in flight
    concurrency: usize,
}

impl BalanceThresholdChecker {
    pub(crate) fn new(
        accounts: Arc<Vec<MonitoredAccount>>,
        thresholds: Arc<ThresholdTable>,
        chains: HashMap<Network, Arc<dyn ChainClient>>,
        primary: Network,
        tokens: Option<Arc<dyn TokenBalanceClient>>,
        concurrency: usize,
    ) -> Self {
        Self {
            accounts,
            thresholds,
            chains,
            primary,
            tokens,
            concurrency: concurrency.max(1),
        }
    }

    /// Expand the roster into balance lookups, skipping combinations without
    /// a threshold or a client
    fn plan(&self) -> Vec<Lookup> {
        let mut lookups = Vec::new();

        for account in self.accounts.iter() {
            if account.is_token_account() {
                let Some(client) = &self.tokens else {
                    warn!(account = %account.address, "No token balance service configured, skipping");
                    continue;
                };
                let Some(threshold) = self.thresholds.get(&self.primary, &account.role) else {
                    warn!(
                        account = %account.address,
                        network = %self.primary,
                        role = %account.role,
                        "No threshold configured, skipping"
                    );
                    continue;
                };
                for token in &account.tokens {
                    lookups.push(Lookup::Token {
                        account: account.clone(),
                        network: self.primary.clone(),
                        token: *token,
                        client: Arc::clone(client),
                        threshold: threshold.clone(),
                    });
                }
                continue;
            }

            for network in &account.networks {
                let Some(client) = self.chains.get(network) else {
                    warn!(account = %account.address, %network, "Network is not configured, skipping");
                    continue;
                };
                let Some(threshold) = self.thresholds.get(network, &account.role) else {
                    warn!(
                        account = %account.address,
                        %network,
                        role = %account.role,
                        "No threshold configured, skipping"
                    );
                    continue;
                };
                lookups.push(Lookup::Native {
                    account: account.clone(),
                    network: network.clone(),
                    client: Arc::clone(client),
                    threshold: threshold.clone(),
                });
            }
        }

        lookups
    }

    /// Evaluate every planned lookup with at most `concurrency` in flight and
    /// group anomalies per network. Quiet networks produce no result; failed
    /// lookups are counted in one result on the general target.
    pub(crate) async fn check(&self) -> Vec<CheckResult> {
        let lookups = self.plan();
        let total = lookups.len();

        let outcomes: Vec<Option<Outcome>> = stream::iter(lookups.into_iter().enumerate())
            .map(|(seq, lookup)| async move {
                match lookup.evaluate().await {
                    Ok(anomaly) => anomaly.map(|a| Outcome::Low(seq, lookup.network().clone(), a)),
                    Err(e) => {
                        warn!(
                            account = %lookup.account().address,
                            network = %lookup.network(),
                            error = %e,
                            "Failed to evaluate balance"
                        );
                        Some(Outcome::Failed)
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut failed = 0;
        let mut findings = Vec::new();
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Outcome::Low(seq, network, anomaly) => findings.push((seq, network, anomaly)),
                Outcome::Failed => failed += 1,
            }
        }

        // Completion order varies; report in roster order
        findings.sort_by_key(|(seq, _, _)| *seq);

        let mut by_network: BTreeMap<Network, Vec<Anomaly>> = BTreeMap::new();
        for (_, network, anomaly) in findings {
            by_network.entry(network).or_default().push(anomaly);
        }

        info!(
            lookups = total,
            failed,
            networks_with_anomalies = by_network.len(),
            "Evaluated balances"
        );

        let mut results: Vec<CheckResult> = by_network
            .into_iter()
            .map(|(network, anomalies)| CheckResult::new(Target::Network(network), anomalies))
            .collect();

        if failed > 0 {
            results.push(CheckResult::new(
                Target::General,
                vec![Anomaly::CheckFailed {
                    check: self.name().to_string(),
                    network: None,
                    error: format!("{failed} of {total} balance lookups failed"),
                }],
            ));
        }
        results
    }
}

#[async_trait]
impl Check for BalanceThresholdChecker {
    fn name(&self) -> &'static str {
        "balance_threshold"
    }

    async fn run(&self) -> anyhow::Result<Vec<CheckResult>> {
        Ok(self.check().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::{addr, FakeChain, FakeTokenBalances};
    use alloy_primitives::utils::parse_ether;
    use std::{sync::atomic::Ordering, time::Duration};

    fn account(byte: u8, role: &str, networks: &[&str]) -> MonitoredAccount {
        MonitoredAccount {
            description: format!("account {byte}"),
            address: addr(byte),
            role: role.to_string(),
            networks: networks.iter().map(|n| Network::from(*n)).collect(),
            tokens: Vec::new(),
        }
    }

    fn token_account(byte: u8, role: &str, tokens: &[Address]) -> MonitoredAccount {
        MonitoredAccount {
            tokens: tokens.to_vec(),
            ..account(byte, role, &[])
        }
    }

    fn checker(
        accounts: Vec<MonitoredAccount>,
        thresholds: ThresholdTable,
        chains: Vec<(&str, Arc<FakeChain>)>,
        tokens: Option<Arc<FakeTokenBalances>>,
        concurrency: usize,
    ) -> BalanceThresholdChecker {
        let chains = chains
            .into_iter()
            .map(|(name, chain)| (Network::from(name), chain as Arc<dyn ChainClient>))
            .collect();
        BalanceThresholdChecker::new(
            Arc::new(accounts),
            Arc::new(thresholds),
            chains,
            Network::from("fuse"),
            tokens.map(|t| t as Arc<dyn TokenBalanceClient>),
            concurrency,
        )
    }

    #[tokio::test]
    async fn test_strictly_below_threshold_alerts() {
        let mut thresholds = ThresholdTable::default();
        thresholds.insert("fuse", "validator", "10");

        let chain = Arc::new(FakeChain::default().with_balance(addr(1), parse_ether("9.999").unwrap()));
        let result = checker(
            vec![account(1, "validator", &["fuse"])],
            thresholds.clone(),
            vec![("fuse", chain)],
            None,
            5,
        )
        .check()
        .await;

        assert_eq!(
            result,
            vec![CheckResult::new(
                Target::Network(Network::from("fuse")),
                vec![Anomaly::LowBalance {
                    description: "account 1".to_string(),
                    address: addr(1),
                    role: "validator".to_string(),
                    network: Network::from("fuse"),
                    token: None,
                    balance: "9.999".to_string(),
                    threshold: "10".to_string(),
                }]
            )]
        );

        let chain = Arc::new(FakeChain::default().with_balance(addr(1), parse_ether("10").unwrap()));
        let result = checker(
            vec![account(1, "validator", &["fuse"])],
            thresholds,
            vec![("fuse", chain)],
            None,
            5,
        )
        .check()
        .await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_results_are_grouped_per_network() {
        let mut thresholds = ThresholdTable::default();
        thresholds.insert("fuse", "bridge", "1");
        thresholds.insert("ethereum", "bridge", "0.5");

        let fuse = Arc::new(FakeChain::default().with_balance(addr(1), parse_ether("2").unwrap()));
        let ethereum = Arc::new(FakeChain::default().with_balance(addr(1), parse_ether("0.1").unwrap()));

        let result = checker(
            vec![account(1, "bridge", &["fuse", "ethereum"]), account(2, "bridge", &["ethereum"])],
            thresholds,
            vec![("fuse", fuse), ("ethereum", ethereum)],
            None,
            5,
        )
        .check()
        .await;

        // fuse is quiet, ethereum holds both low accounts in roster order
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].target, Target::Network(Network::from("ethereum")));
        let addresses: Vec<Address> = result[0]
            .anomalies
            .iter()
            .map(|a| match a {
                Anomaly::LowBalance { address, .. } => *address,
                other => panic!("unexpected anomaly {other:?}"),
            })
            .collect();
        assert_eq!(addresses, vec![addr(1), addr(2)]);
    }

    #[tokio::test]
    async fn test_missing_threshold_or_network_is_skipped() {
        let mut thresholds = ThresholdTable::default();
        thresholds.insert("fuse", "validator", "10");

        let chain = Arc::new(FakeChain::default());
        let result = checker(
            vec![
                account(1, "operator", &["fuse"]),
                account(2, "validator", &["ropsten"]),
            ],
            thresholds,
            vec![("fuse", chain.clone())],
            None,
            5,
        )
        .check()
        .await;

        assert!(result.is_empty());
        assert_eq!(chain.max_in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_does_not_abort_others() {
        let mut thresholds = ThresholdTable::default();
        thresholds.insert("fuse", "validator", "10");

        let mut chain = FakeChain::default();
        chain.failing_balances.push(addr(1));

        let result = checker(
            vec![account(1, "validator", &["fuse"]), account(2, "validator", &["fuse"])],
            thresholds,
            vec![("fuse", Arc::new(chain))],
            None,
            5,
        )
        .check()
        .await;

        assert_eq!(result.len(), 2);
        assert!(matches!(
            result[0].anomalies.as_slice(),
            [Anomaly::LowBalance { address, .. }] if *address == addr(2)
        ));
        assert_eq!(
            result[1],
            CheckResult::new(
                Target::General,
                vec![Anomaly::CheckFailed {
                    check: "balance_threshold".to_string(),
                    network: None,
                    error: "1 of 2 balance lookups failed".to_string(),
                }]
            )
        );
    }

    #[tokio::test]
    async fn test_all_lookups_failing_is_not_silent() {
        let mut thresholds = ThresholdTable::default();
        thresholds.insert("fuse", "validator", "10");

        let mut chain = FakeChain::default();
        chain.failing_balances.extend([addr(1), addr(2)]);

        let result = checker(
            vec![account(1, "validator", &["fuse"]), account(2, "validator", &["fuse"])],
            thresholds,
            vec![("fuse", Arc::new(chain))],
            None,
            5,
        )
        .check()
        .await;

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].target, Target::General);
    }

    #[tokio::test]
    async fn test_token_balances() {
        let token_a = addr(0xa0);
        let token_b = addr(0xb0);
        let token_c = addr(0xc0);

        let mut thresholds = ThresholdTable::default();
        thresholds.insert("fuse", "funder", "100");

        let mut tokens = FakeTokenBalances::default();
        tokens.balances.insert(
            (addr(1), token_a),
            TokenBalance {
                amount: U256::from(150_000_000u64),
                decimals: 6,
            },
        );
        tokens.failing.push((addr(1), token_c));

        let result = checker(
            vec![token_account(1, "funder", &[token_a, token_b, token_c])],
            thresholds,
            Vec::new(),
            Some(Arc::new(tokens)),
            5,
        )
        .check()
        .await;

        // token_a is above threshold, token_b has no record and counts as zero,
        // token_c failed and is only counted
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].target, Target::General);
        assert_eq!(
            result[0],
            CheckResult::new(
                Target::Network(Network::from("fuse")),
                vec![Anomaly::LowBalance {
                    description: "account 1".to_string(),
                    address: addr(1),
                    role: "funder".to_string(),
                    network: Network::from("fuse"),
                    token: Some(token_b),
                    balance: "0".to_string(),
                    threshold: "100".to_string(),
                }]
            )
        );
    }

    #[tokio::test]
    async fn test_threshold_finer_than_token_unit() {
        let coarse = addr(0xd0);

        let mut thresholds = ThresholdTable::default();
        thresholds.insert("fuse", "funder", "0.5");

        let mut tokens = FakeTokenBalances::default();
        tokens.balances.insert(
            (addr(1), coarse),
            TokenBalance {
                amount: U256::ZERO,
                decimals: 0,
            },
        );
        tokens.balances.insert(
            (addr(2), coarse),
            TokenBalance {
                amount: U256::from(1u64),
                decimals: 0,
            },
        );

        let result = checker(
            vec![
                token_account(1, "funder", &[coarse]),
                token_account(2, "funder", &[coarse]),
            ],
            thresholds,
            Vec::new(),
            Some(Arc::new(tokens)),
            5,
        )
        .check()
        .await;

        // 0 < 0.5 alerts, 1 >= 0.5 does not
        assert_eq!(result.len(), 1);
        assert!(matches!(
            result[0].anomalies.as_slice(),
            [Anomaly::LowBalance { address, balance, threshold, .. }]
                if *address == addr(1) && balance == "0" && threshold == "0.5"
        ));
    }

    #[test]
    fn test_is_below_scales_both_sides() {
        let threshold: DecimalAmount = "1.5".parse().unwrap();
        let six = |amount: u64| TokenBalance {
            amount: U256::from(amount),
            decimals: 6,
        };
        assert!(is_below(six(1_499_999), &threshold).unwrap());
        assert!(!is_below(six(1_500_000), &threshold).unwrap());

        let wide = TokenBalance {
            amount: U256::from(10u64).pow(U256::from(24u64)),
            decimals: 24,
        };
        assert!(is_below(wide, &threshold).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_is_bounded() {
        let mut thresholds = ThresholdTable::default();
        thresholds.insert("fuse", "user", "1");
        thresholds.insert("ethereum", "user", "1");

        // one fake behind both networks so the peak covers every lookup
        let chain = Arc::new(FakeChain {
            balance_delay: Duration::from_millis(10),
            ..Default::default()
        });
        let accounts: Vec<MonitoredAccount> = (1..=25)
            .map(|i| account(i, "user", &["fuse", "ethereum"]))
            .collect();

        let result = checker(
            accounts,
            thresholds,
            vec![("fuse", chain.clone()), ("ethereum", chain.clone())],
            None,
            5,
        )
        .check()
        .await;

        assert_eq!(result.len(), 2);
        let total: usize = result.iter().map(|r| r.anomalies.len()).sum();
        assert_eq!(total, 50);
        assert_eq!(chain.max_in_flight.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let mut thresholds = ThresholdTable::default();
        thresholds.insert("fuse", "user", "1");

        let chain = Arc::new(FakeChain::default());
        let checker = checker(
            (1..=10).map(|i| account(i, "user", &["fuse"])).collect(),
            thresholds,
            vec![("fuse", chain)],
            None,
            3,
        );

        assert_eq!(checker.check().await, checker.check().await);
    }
}
