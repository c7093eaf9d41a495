//! Client side of osquery's extension manager API
//!
//! - `types`: the response structures the relay consumes
//! - `trait_def`: the calls the relay makes, as a mockable trait
//! - `thrift_client`: Thrift binary protocol over osquery's Unix socket

pub mod thrift_client;
pub mod trait_def;
pub mod types;

pub use thrift_client::ThriftClient;
pub use trait_def::OsqueryClient;
pub use types::{ExtensionResponse, ExtensionStatus};

#[cfg(test)]
pub use trait_def::MockOsqueryClient;
