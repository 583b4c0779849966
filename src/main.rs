mod alerts;
mod checks;
mod clients;
mod config;
mod scheduler;
mod types;
mod utils;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    alerts::{
        dispatcher::AlertDispatcher,
        notifier::{LogNotifier, Notifier, WebhookNotifier},
    },
    checks::{
        balances::BalanceThresholdChecker, bridge_mint::BridgeMintChecker, report::ChainReport,
        index_lag::IndexLagChecker,
        types::{Anomaly, Check, CheckResult, Target},
        validators::ValidatorLivenessChecker,
    },
    clients::{
        explorer::ExplorerClient,
        graphql::{GraphQlIndexStatusClient, GraphQlTokenBalanceClient},
        rpc::RpcChainClient,
        traits::{ChainClient, IndexStatusClient, TokenBalanceClient},
    },
    config::{MonitorConfig, MonitorSettings},
    scheduler::Scheduler,
    types::network::Network,
    utils::rpc_client::create_http_client,
};

/// Health monitor for validator, bridge, balance and indexer state
#[derive(Debug, Parser)]
#[command(name = "network-monitor", version)]
struct Args {
    /// Path of the JSON file describing networks, contracts and accounts
    #[arg(long, env = "MONITOR_CONFIG", default_value = "monitor.json")]
    config: PathBuf,
}

/// Run a check once and dispatch whatever it found. A failed run is alerted
/// on the general target before the error is handed back to the scheduler.
async fn run_check(check: Arc<dyn Check>, dispatcher: Arc<AlertDispatcher>) -> anyhow::Result<()> {
    match check.run().await {
        Ok(results) => {
            dispatcher.dispatch(check.name(), &results).await;
            Ok(())
        }
        Err(e) => {
            let failure = CheckResult::new(
                Target::General,
                vec![Anomaly::CheckFailed {
                    check: check.name().to_string(),
                    network: None,
                    error: format!("{e:#}"),
                }],
            );
            dispatcher.dispatch(check.name(), &[failure]).await;
            Err(e)
        }
    }
}

async fn run_status_report(report: Arc<ChainReport>, dispatcher: Arc<AlertDispatcher>) -> anyhow::Result<()> {
    let status = report.collect().await;
    if !dispatcher.report("status_report", "report", &status).await {
        anyhow::bail!("status report was not delivered");
    }
    Ok(())
}

fn register_check(
    scheduler: &mut Scheduler,
    interval: Duration,
    check: Arc<dyn Check>,
    dispatcher: &Arc<AlertDispatcher>,
) {
    let dispatcher = Arc::clone(dispatcher);
    let name = check.name();
    scheduler.register(name, interval, move || {
        run_check(Arc::clone(&check), Arc::clone(&dispatcher))
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    dotenv().ok();

    let args = Args::parse();
    let settings = MonitorSettings::from_env();
    let config = MonitorConfig::load(&args.config)?;

    let mut chains: HashMap<Network, Arc<dyn ChainClient>> = HashMap::new();
    for network in config.network_names() {
        let endpoint = &config.networks[&network];
        let client = RpcChainClient::new(&endpoint.rpc_url, settings.rpc_timeout())
            .with_context(|| format!("failed to create RPC client for {network}"))?;
        chains.insert(network, Arc::new(client));
    }
    let chain = |network: &Network| -> anyhow::Result<Arc<dyn ChainClient>> {
        chains
            .get(network)
            .cloned()
            .with_context(|| format!("no RPC client for {network}"))
    };

    let http = create_http_client(settings.rpc_timeout())?;

    let notifier: Arc<dyn Notifier> = match settings.alert_webhook_url() {
        Some(url) => Arc::new(WebhookNotifier::new(http.clone(), url.to_string())),
        None => {
            warn!("ALERT_WEBHOOK_URL not set, alerts are written to the log");
            Arc::new(LogNotifier)
        }
    };
    let dispatcher = Arc::new(AlertDispatcher::new(
        notifier,
        settings.alert_subject().to_string(),
    ));

    let mut scheduler = Scheduler::new();

    // validator liveness on the primary network
    let validators = ValidatorLivenessChecker::new(
        config.primary_network.clone(),
        chain(&config.primary_network)?,
        config.consensus_address,
        settings.stale_block_threshold_s(),
        settings.validator_window_multiplier(),
    );
    register_check(
        &mut scheduler,
        settings.validator_check_interval(),
        Arc::new(validators),
        &dispatcher,
    );

    // bridge mints on the secondary network
    match settings.explorer_api_url() {
        Some(url) => {
            let explorer = ExplorerClient::new(
                http.clone(),
                url.to_string(),
                settings.explorer_api_key().map(str::to_string),
            );
            let bridge = BridgeMintChecker::new(
                config.secondary_network.clone(),
                chain(&config.secondary_network)?,
                Arc::new(explorer),
                config.bridge_address,
                settings.bridge_mint_window_blocks(),
            );
            register_check(
                &mut scheduler,
                settings.bridge_check_interval(),
                Arc::new(bridge),
                &dispatcher,
            );
        }
        None => warn!("EXPLORER_API_URL not set, bridge mint check disabled"),
    }

    // account balances
    let tokens: Option<Arc<dyn TokenBalanceClient>> = settings.token_balance_url().map(|url| {
        Arc::new(GraphQlTokenBalanceClient::new(http.clone(), url.to_string()))
            as Arc<dyn TokenBalanceClient>
    });
    let balances = BalanceThresholdChecker::new(
        Arc::new(config.accounts.clone()),
        Arc::new(config.thresholds.clone()),
        chains.clone(),
        config.primary_network.clone(),
        tokens,
        settings.balance_check_concurrency(),
    );
    register_check(
        &mut scheduler,
        settings.balance_check_interval(),
        Arc::new(balances),
        &dispatcher,
    );

    let ordered_chains: Vec<(Network, Arc<dyn ChainClient>)> = config
        .network_names()
        .into_iter()
        .filter_map(|network| chains.get(&network).cloned().map(|client| (network, client)))
        .collect();

    // indexer lag
    match settings.index_status_url() {
        Some(url) => {
            let status: Arc<dyn IndexStatusClient> = Arc::new(GraphQlIndexStatusClient::new(
                http.clone(),
                url.to_string(),
                config.subgraphs.clone(),
            ));
            let index_lag = IndexLagChecker::new(
                ordered_chains.clone(),
                status,
                settings.index_lag_threshold_blocks(),
            );
            register_check(
                &mut scheduler,
                settings.index_lag_check_interval(),
                Arc::new(index_lag),
                &dispatcher,
            );
        }
        None => warn!("INDEX_STATUS_URL not set, index lag check disabled"),
    }

    if let Some(interval) = settings.status_report_interval() {
        let report = Arc::new(ChainReport::new(
            ordered_chains,
            Arc::new(config.accounts.clone()),
            settings.balance_check_concurrency(),
        ));
        let dispatcher = Arc::clone(&dispatcher);
        scheduler.register("status_report", interval, move || {
            run_status_report(Arc::clone(&report), Arc::clone(&dispatcher))
        });
    }

    info!(checks = ?scheduler.checks().collect::<Vec<_>>(), "Monitor running");
    scheduler.run().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::testing::RecordingNotifier;
    use async_trait::async_trait;
    use serde_json::Value;

    #[derive(Debug)]
    struct FixedCheck {
        outcome: Result<Vec<CheckResult>, String>,
    }

    #[async_trait]
    impl Check for FixedCheck {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn run(&self) -> anyhow::Result<Vec<CheckResult>> {
            self.outcome.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn dispatcher(notifier: &Arc<RecordingNotifier>) -> Arc<AlertDispatcher> {
        Arc::new(AlertDispatcher::new(
            Arc::clone(notifier) as Arc<dyn Notifier>,
            "Network Monitor".to_string(),
        ))
    }

    #[tokio::test]
    async fn test_run_check_delivers_anomalies() {
        let notifier = Arc::new(RecordingNotifier::default());
        let check = FixedCheck {
            outcome: Ok(vec![
                CheckResult::new(Target::Network(Network::from("fuse")), Vec::new()),
                CheckResult::new(
                    Target::Network(Network::from("ethereum")),
                    vec![Anomaly::FallingBehind {
                        network: Network::from("ethereum"),
                        chain_head: 100,
                        indexed_block: 90,
                        lag: 10,
                    }],
                ),
            ]),
        };

        run_check(Arc::new(check), dispatcher(&notifier)).await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, "ethereum");
        assert_eq!(sent[0].subject, "Network Monitor: fixed");
    }

    #[tokio::test]
    async fn test_run_check_alerts_failed_run() {
        let notifier = Arc::new(RecordingNotifier::default());
        let check = FixedCheck {
            outcome: Err("node unavailable".to_string()),
        };

        assert!(run_check(Arc::new(check), dispatcher(&notifier)).await.is_err());

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, "general");
        let body: Value = serde_json::from_str(&sent[0].message).unwrap();
        assert_eq!(body["anomalies"][0]["kind"], "check_failed");
        assert_eq!(body["anomalies"][0]["error"], "node unavailable");
    }

    #[tokio::test]
    async fn test_validator_rpc_failure_reaches_notifier() {
        use crate::checks::testing::FakeChain;

        let notifier = Arc::new(RecordingNotifier::default());
        let checker = ValidatorLivenessChecker::new(
            Network::from("fuse"),
            Arc::new(FakeChain::default()),
            alloy_primitives::Address::ZERO,
            5,
            2,
        );

        run_check(Arc::new(checker), dispatcher(&notifier)).await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Network Monitor: validator_liveness");
        assert_eq!(sent[0].target, "general");
    }
}
