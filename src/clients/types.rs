use alloy_primitives::{Address, U256};

/// Block header fields used by the liveness checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Block {
    pub(crate) number: u64,
    /// Unix timestamp in seconds
    pub(crate) timestamp: u64,
    pub(crate) author: Address,
}

/// Single token transfer returned by the transfer history API
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Transfer {
    pub(crate) block_number: u64,
    pub(crate) from: Address,
    pub(crate) to: Address,
    pub(crate) value: U256,
}

/// Outcome of a transfer history query as reported by the upstream API
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransferHistory {
    /// Query succeeded; the list may be empty
    Ok(Vec<Transfer>),
    /// Upstream reported a failed query
    Failed(String),
}

/// Token balance in base units together with the token decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TokenBalance {
    pub(crate) amount: U256,
    pub(crate) decimals: u8,
}
