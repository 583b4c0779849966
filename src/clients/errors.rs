use thiserror::Error;

/// Error types for collaborator queries
#[derive(Debug, Error)]
pub(crate) enum ClientError {
    #[error("JSON-RPC request failed: {0}")]
    Rpc(#[from] jsonrpsee::core::ClientError),

    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("GraphQL query failed: {0}")]
    GraphQl(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
