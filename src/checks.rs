pub(crate) mod balances;
pub(crate) mod bridge_mint;
pub(crate) mod index_lag;
pub(crate) mod report;
#[cfg(test)]
pub(crate) mod testing;
pub(crate) mod types;
pub(crate) mod validators;
