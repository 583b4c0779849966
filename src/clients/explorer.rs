use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::clients::{
    errors::ClientError,
    traits::BridgeHistoryClient,
    types::{Transfer, TransferHistory},
};

/// Envelope of an etherscan-compatible API response
#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

/// Token transfer entry of `action=tokentx`
#[derive(Debug, Deserialize)]
struct ExplorerTransfer {
    #[serde(rename = "blockNumber")]
    block_number: String,
    from: Address,
    to: Address,
    value: String,
}

impl TryFrom<ExplorerTransfer> for Transfer {
    type Error = ClientError;

    fn try_from(entry: ExplorerTransfer) -> Result<Self, Self::Error> {
        let block_number = entry.block_number.parse::<u64>().map_err(|e| {
            ClientError::Malformed(format!("invalid block number '{}': {e}", entry.block_number))
        })?;
        let value = entry
            .value
            .parse::<U256>()
            .map_err(|e| ClientError::Malformed(format!("invalid value '{}': {e}", entry.value)))?;

        Ok(Transfer {
            block_number,
            from: entry.from,
            to: entry.to,
            value,
        })
    }
}

/// [`BridgeHistoryClient`] backed by an etherscan-compatible block explorer API
#[derive(Debug, Clone)]
pub(crate) struct ExplorerClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl ExplorerClient {
    pub(crate) fn new(http: reqwest::Client, api_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            api_url,
            api_key,
        }
    }
}

/// Map the explorer envelope to a [`TransferHistory`].
///
/// Explorers answer an empty range with `status: "0"` and a "No ... found"
/// message; that is a successful query with no transfers.
fn parse_transfer_history(response: ExplorerResponse) -> Result<TransferHistory, ClientError> {
    if response.status != "1" {
        let empty = response.result.as_array().is_some_and(|r| r.is_empty());
        if empty && response.message.starts_with("No ") {
            return Ok(TransferHistory::Ok(Vec::new()));
        }

        let reason = match &response.result {
            Value::String(detail) => format!("{}: {detail}", response.message),
            _ => response.message.clone(),
        };
        return Ok(TransferHistory::Failed(reason));
    }

    let entries: Vec<ExplorerTransfer> = serde_json::from_value(response.result)?;
    let transfers = entries
        .into_iter()
        .map(Transfer::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TransferHistory::Ok(transfers))
}

#[async_trait]
impl BridgeHistoryClient for ExplorerClient {
    async fn transfers(
        &self,
        address: Address,
        start_block: u64,
        end_block: u64,
    ) -> Result<TransferHistory, ClientError> {
        let mut query_params: HashMap<&str, String> = HashMap::new();
        query_params.insert("module", "account".to_string());
        query_params.insert("action", "tokentx".to_string());
        query_params.insert("address", address.to_string());
        query_params.insert("startblock", start_block.to_string());
        query_params.insert("endblock", end_block.to_string());
        query_params.insert("sort", "desc".to_string());
        if let Some(key) = &self.api_key {
            query_params.insert("apikey", key.clone());
        }

        debug!(%address, start_block, end_block, "Fetching transfer history");

        let response = self
            .http
            .get(&self.api_url)
            .query(&query_params)
            .send()
            .await?
            .error_for_status()?
            .json::<ExplorerResponse>()
            .await?;

        parse_transfer_history(response)
    }
}
