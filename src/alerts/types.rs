use serde::Serialize;

/// Rendered alert handed to a notifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Alert {
    /// Subject line, e.g. `Network Monitor: balance_threshold`
    pub(crate) subject: String,
    /// Target label, a network name or `general`
    pub(crate) target: String,
    /// Pretty-printed message body
    pub(crate) message: String,
}
