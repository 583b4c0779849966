use alloy_primitives::{
    utils::{format_units, parse_units, UnitsError},
    U256,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

/// Decimals of the native coin on every monitored network.
pub(crate) const NATIVE_DECIMALS: u8 = 18;

/// Non-negative decimal amount in human units (e.g. `"10"` or `"0.25"`).
///
/// Kept in its textual form so it can be scaled exactly to the base units of
/// whatever it is compared against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub(crate) struct DecimalAmount(String);

impl DecimalAmount {
    /// Scale this amount to base units with the given number of decimals.
    pub(crate) fn to_base_units(&self, decimals: u8) -> Result<U256, UnitsError> {
        Ok(parse_units(&self.0, decimals)?.get_absolute())
    }
}

impl FromStr for DecimalAmount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.starts_with('-') {
            return Err(format!("expected a non-negative decimal amount, got '{s}'"));
        }
        parse_units(s, NATIVE_DECIMALS).map_err(|e| format!("invalid amount '{s}': {e}"))?;
        Ok(Self(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for DecimalAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Accept both `"10.5"` and `10.5` in the config file
        let value: serde_json::Value = Deserialize::deserialize(deserializer)?;
        let text = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(de::Error::custom(format!("invalid amount: {other}"))),
        };
        DecimalAmount::from_str(&text).map_err(de::Error::custom)
    }
}

impl fmt::Display for DecimalAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render a base-unit amount as a human decimal, without trailing zeros.
pub(crate) fn format_amount(value: U256, decimals: u8) -> String {
    match format_units(value, decimals) {
        Ok(s) if s.contains('.') => s.trim_end_matches('0').trim_end_matches('.').to_string(),
        Ok(s) => s,
        Err(_) => value.to_string(),
    }
}
