use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use jsonrpsee::{core::client::ClientT, http_client::HttpClient, rpc_params};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::clients::{errors::ClientError, traits::ChainClient, types::Block};
use crate::utils::rpc_client::{create_rpc_client, parse_hex_u64};

/// Block fields as returned by `eth_getBlockByNumber`
#[derive(Debug, Deserialize)]
struct RpcBlock {
    number: String,
    timestamp: String,
    miner: Address,
}

/// [`ChainClient`] backed by an Ethereum-style JSON-RPC node
#[derive(Debug, Clone)]
pub(crate) struct RpcChainClient {
    client: HttpClient,
}

impl RpcChainClient {
    pub(crate) fn new(rpc_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: create_rpc_client(rpc_url, timeout)?,
        })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn current_block_number(&self) -> Result<u64, ClientError> {
        let number: String = self.client.request("eth_blockNumber", rpc_params![]).await?;
        parse_hex_u64(&number)
    }

    async fn block(&self, number: u64) -> Result<Block, ClientError> {
        let block: Option<RpcBlock> = self
            .client
            .request(
                "eth_getBlockByNumber",
                rpc_params![format!("{number:#x}"), false],
            )
            .await?;

        let block = block.ok_or_else(|| ClientError::Malformed(format!("block {number} not found")))?;

        Ok(Block {
            number: parse_hex_u64(&block.number)?,
            timestamp: parse_hex_u64(&block.timestamp)?,
            author: block.miner,
        })
    }

    async fn native_balance(&self, address: Address) -> Result<U256, ClientError> {
        let balance: U256 = self
            .client
            .request("eth_getBalance", rpc_params![address, "latest"])
            .await?;
        Ok(balance)
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ClientError> {
        let output: Bytes = self
            .client
            .request(
                "eth_call",
                rpc_params![json!({ "to": to, "data": input }), "latest"],
            )
            .await?;
        Ok(output)
    }
}
