//! In-memory collaborators for check tests

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use crate::checks::validators::getValidatorsCall;
use crate::clients::{
    errors::ClientError,
    traits::{BridgeHistoryClient, ChainClient, IndexStatusClient, TokenBalanceClient},
    types::{Block, TokenBalance, TransferHistory},
};
use crate::types::network::Network;

/// Address with every byte set to `byte`
pub(crate) fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

#[derive(Debug, Default)]
pub(crate) struct FakeChain {
    pub(crate) head: Option<u64>,
    pub(crate) blocks: HashMap<u64, Block>,
    pub(crate) validators: Vec<Address>,
    pub(crate) balances: HashMap<Address, U256>,
    /// Delay applied to every balance query
    pub(crate) balance_delay: Duration,
    pub(crate) failing_balances: Vec<Address>,
    pub(crate) block_requests: AtomicUsize,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl FakeChain {
    pub(crate) fn with_head(head: u64) -> Self {
        Self {
            head: Some(head),
            ..Default::default()
        }
    }

    /// Adds blocks `first..=last` authored round-robin by `authors`
    pub(crate) fn with_blocks(mut self, first: u64, last: u64, timestamp: u64, authors: &[Address]) -> Self {
        for (i, number) in (first..=last).enumerate() {
            let block = Block {
                number,
                timestamp,
                author: authors[i % authors.len()],
            };
            self.blocks.insert(number, block);
        }
        self
    }

    pub(crate) fn with_validators(mut self, validators: Vec<Address>) -> Self {
        self.validators = validators;
        self
    }

    pub(crate) fn with_balance(mut self, address: Address, balance: U256) -> Self {
        self.balances.insert(address, balance);
        self
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn current_block_number(&self) -> Result<u64, ClientError> {
        self.head
            .ok_or_else(|| ClientError::Malformed("node unavailable".to_string()))
    }

    async fn block(&self, number: u64) -> Result<Block, ClientError> {
        self.block_requests.fetch_add(1, Ordering::SeqCst);
        self.blocks
            .get(&number)
            .cloned()
            .ok_or_else(|| ClientError::Malformed(format!("block {number} not found")))
    }

    async fn native_balance(&self, address: Address) -> Result<U256, ClientError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.balance_delay.is_zero() {
            tokio::time::sleep(self.balance_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_balances.contains(&address) {
            return Err(ClientError::Malformed("balance unavailable".to_string()));
        }
        Ok(self.balances.get(&address).copied().unwrap_or(U256::ZERO))
    }

    async fn call(&self, _to: Address, _input: Bytes) -> Result<Bytes, ClientError> {
        Ok(getValidatorsCall::abi_encode_returns(&(self.validators.clone(),)).into())
    }
}

#[derive(Debug)]
pub(crate) struct FakeHistory {
    pub(crate) response: Result<TransferHistory, String>,
    pub(crate) requests: Mutex<Vec<(Address, u64, u64)>>,
}

impl FakeHistory {
    pub(crate) fn new(response: Result<TransferHistory, String>) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BridgeHistoryClient for FakeHistory {
    async fn transfers(
        &self,
        address: Address,
        start_block: u64,
        end_block: u64,
    ) -> Result<TransferHistory, ClientError> {
        self.requests
            .lock()
            .unwrap()
            .push((address, start_block, end_block));
        self.response.clone().map_err(ClientError::Malformed)
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeIndexStatus {
    pub(crate) synced: HashMap<Network, u64>,
}

#[async_trait]
impl IndexStatusClient for FakeIndexStatus {
    async fn synced_block(&self, network: &Network) -> Result<u64, ClientError> {
        self.synced
            .get(network)
            .copied()
            .ok_or_else(|| ClientError::GraphQl(format!("no status for {network}")))
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeTokenBalances {
    pub(crate) balances: HashMap<(Address, Address), TokenBalance>,
    pub(crate) failing: Vec<(Address, Address)>,
}

#[async_trait]
impl TokenBalanceClient for FakeTokenBalances {
    async fn balance(
        &self,
        account: Address,
        token: Address,
    ) -> Result<Option<TokenBalance>, ClientError> {
        if self.failing.contains(&(account, token)) {
            return Err(ClientError::GraphQl("indexer unavailable".to_string()));
        }
        Ok(self.balances.get(&(account, token)).copied())
    }
}
