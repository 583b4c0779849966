pub(crate) mod errors;
pub(crate) mod explorer;
pub(crate) mod graphql;
pub(crate) mod rpc;
pub(crate) mod traits;
pub(crate) mod types;
