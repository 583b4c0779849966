use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use std::time::Duration;

use crate::clients::errors::ClientError;

/// Creates a JSON-RPC HTTP client with connection pooling and timeout configuration
///
/// The client is configured with:
///
/// - the given request timeout, so a hanging node surfaces as an error
/// - 10MB max request size limit
/// - Internal connection pooling (managed by hyper)
///
/// # Arguments
///
/// * `rpc_url` - Base URL of the JSON-RPC server
/// * `timeout` - Per-request timeout
///
/// # Example
///
/// ```ignore
/// let client = create_rpc_client("http://localhost:8545", Duration::from_secs(30))?;
/// let result: String = client.request("eth_blockNumber", rpc_params![]).await?;
/// ```
pub(crate) fn create_rpc_client(rpc_url: &str, timeout: Duration) -> Result<HttpClient, ClientError> {
    HttpClientBuilder::default()
        .request_timeout(timeout)
        .max_request_size(10 * 1024 * 1024) // 10MB
        .build(rpc_url)
        .map_err(|e| ClientError::Config(format!("invalid RPC url {rpc_url}: {e}")))
}

/// Creates an HTTP client for REST and GraphQL collaborators with a request timeout
pub(crate) fn create_http_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Parses a `0x`-prefixed hex quantity
pub(crate) fn parse_hex_u64(value: &str) -> Result<u64, ClientError> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| ClientError::Malformed(format!("invalid hex quantity '{value}': {e}")))
}
