use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use std::fmt::Debug;

use crate::clients::{
    errors::ClientError,
    types::{Block, TokenBalance, TransferHistory},
};
use crate::types::network::Network;

/// Read-only access to one chain
#[async_trait]
pub(crate) trait ChainClient: Send + Sync + Debug {
    /// Current head block number
    async fn current_block_number(&self) -> Result<u64, ClientError>;

    /// Block by number
    async fn block(&self, number: u64) -> Result<Block, ClientError>;

    /// Native coin balance in base units (wei)
    async fn native_balance(&self, address: Address) -> Result<U256, ClientError>;

    /// Read-only contract call with ABI-encoded input, returning the raw output
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ClientError>;
}

/// Token transfer history of an address
#[async_trait]
pub(crate) trait BridgeHistoryClient: Send + Sync + Debug {
    async fn transfers(
        &self,
        address: Address,
        start_block: u64,
        end_block: u64,
    ) -> Result<TransferHistory, ClientError>;
}

/// Sync status of the off-chain indexer
#[async_trait]
pub(crate) trait IndexStatusClient: Send + Sync + Debug {
    /// Last block of `network` processed by the indexer
    async fn synced_block(&self, network: &Network) -> Result<u64, ClientError>;
}

/// Token balances served by the indexer
#[async_trait]
pub(crate) trait TokenBalanceClient: Send + Sync + Debug {
    /// Balance of `token` held by `account`; `None` when the indexer has no record
    async fn balance(
        &self,
        account: Address,
        token: Address,
    ) -> Result<Option<TokenBalance>, ClientError>;
}
