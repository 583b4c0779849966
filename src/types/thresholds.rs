use serde::Deserialize;
use std::collections::HashMap;

use crate::types::{amount::DecimalAmount, network::Network};

/// Minimum acceptable balance per (network, role).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub(crate) struct ThresholdTable(HashMap<Network, HashMap<String, DecimalAmount>>);

impl ThresholdTable {
    /// Threshold for `role` on `network`, if one is configured.
    pub(crate) fn get(&self, network: &Network, role: &str) -> Option<&DecimalAmount> {
        self.0.get(network).and_then(|roles| roles.get(role))
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, network: &str, role: &str, amount: &str) {
        self.0
            .entry(Network::from(network))
            .or_default()
            .insert(role.to_string(), amount.parse().expect("valid amount"));
    }
}
