pub(crate) mod account;
pub(crate) mod amount;
pub(crate) mod network;
pub(crate) mod thresholds;
