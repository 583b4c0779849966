use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::clients::{
    errors::ClientError,
    traits::{IndexStatusClient, TokenBalanceClient},
    types::TokenBalance,
};
use crate::types::network::Network;

const INDEXING_STATUS_QUERY: &str = r#"
query IndexingStatus($subgraph: String!) {
  indexingStatusForCurrentVersion(subgraphName: $subgraph) {
    chains {
      network
      latestBlock { number }
    }
  }
}"#;

const ACCOUNT_TOKEN_QUERY: &str = r#"
query AccountToken($account: String!, $token: String!) {
  accountTokens(first: 1, where: { account: $account, token: $token }) {
    balance
    token { decimals }
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

/// Minimal GraphQL-over-HTTP client
#[derive(Debug, Clone)]
struct GraphQlClient {
    http: reqwest::Client,
    url: String,
}

impl GraphQlClient {
    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, ClientError> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?
            .error_for_status()?
            .json::<GraphQlResponse<T>>()
            .await?;

        if !response.errors.is_empty() {
            let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
            return Err(ClientError::GraphQl(messages.join("; ")));
        }

        response
            .data
            .ok_or_else(|| ClientError::GraphQl("response carries no data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexingStatusData {
    indexing_status_for_current_version: Option<IndexingStatus>,
}

#[derive(Debug, Deserialize)]
struct IndexingStatus {
    chains: Vec<ChainIndexingStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainIndexingStatus {
    latest_block: Option<BlockPointer>,
}

#[derive(Debug, Deserialize)]
struct BlockPointer {
    number: String,
}

/// [`IndexStatusClient`] querying a graph-node index status endpoint
#[derive(Debug, Clone)]
pub(crate) struct GraphQlIndexStatusClient {
    client: GraphQlClient,
    /// Subgraph indexing each network
    subgraphs: HashMap<Network, String>,
}

impl GraphQlIndexStatusClient {
    pub(crate) fn new(http: reqwest::Client, url: String, subgraphs: HashMap<Network, String>) -> Self {
        Self {
            client: GraphQlClient { http, url },
            subgraphs,
        }
    }
}

#[async_trait]
impl IndexStatusClient for GraphQlIndexStatusClient {
    async fn synced_block(&self, network: &Network) -> Result<u64, ClientError> {
        let subgraph = self
            .subgraphs
            .get(network)
            .ok_or_else(|| ClientError::Config(format!("no subgraph configured for {network}")))?;

        let data: IndexingStatusData = self
            .client
            .query(INDEXING_STATUS_QUERY, json!({ "subgraph": subgraph }))
            .await?;

        let number = data
            .indexing_status_for_current_version
            .and_then(|status| status.chains.into_iter().next())
            .and_then(|chain| chain.latest_block)
            .map(|block| block.number)
            .ok_or_else(|| ClientError::Malformed(format!("no indexing status for {subgraph}")))?;

        number
            .parse::<u64>()
            .map_err(|e| ClientError::Malformed(format!("invalid block number '{number}': {e}")))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountTokensData {
    account_tokens: Vec<AccountToken>,
}

#[derive(Debug, Deserialize)]
struct AccountToken {
    balance: String,
    token: TokenInfo,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    /// Subgraphs expose decimals either as Int or as BigInt string
    decimals: Value,
}

impl TryFrom<AccountToken> for TokenBalance {
    type Error = ClientError;

    fn try_from(record: AccountToken) -> Result<Self, Self::Error> {
        let amount = record
            .balance
            .parse::<U256>()
            .map_err(|e| ClientError::Malformed(format!("invalid balance '{}': {e}", record.balance)))?;

        let decimals = match &record.token.decimals {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse::<u64>().ok(),
            _ => None,
        }
        .and_then(|d| u8::try_from(d).ok())
        .ok_or_else(|| ClientError::Malformed(format!("invalid decimals {}", record.token.decimals)))?;

        Ok(TokenBalance { amount, decimals })
    }
}

/// [`TokenBalanceClient`] querying a token balances subgraph
#[derive(Debug, Clone)]
pub(crate) struct GraphQlTokenBalanceClient {
    client: GraphQlClient,
}

impl GraphQlTokenBalanceClient {
    pub(crate) fn new(http: reqwest::Client, url: String) -> Self {
        Self {
            client: GraphQlClient { http, url },
        }
    }
}

#[async_trait]
impl TokenBalanceClient for GraphQlTokenBalanceClient {
    async fn balance(
        &self,
        account: Address,
        token: Address,
    ) -> Result<Option<TokenBalance>, ClientError> {
        // Subgraph ids are lower-case hex
        let variables = json!({
            "account": format!("{account:#x}"),
            "token": format!("{token:#x}"),
        });

        let data: AccountTokensData = self.client.query(ACCOUNT_TOKEN_QUERY, variables).await?;

        data.account_tokens
            .into_iter()
            .next()
            .map(TokenBalance::try_from)
            .transpose()
    }
}
