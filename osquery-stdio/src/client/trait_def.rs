/// Trait definitions for osquery client communication
use crate::client::types::{ExtensionResponse, ExtensionStatus};

/// Calls the relay makes against the osquery extension manager.
///
/// Implementing this trait lets the relay run against a mock instead of a
/// live osquery socket.
#[cfg_attr(test, mockall::automock)]
pub trait OsqueryClient: Send {
    /// Execute a SQL query against osquery.
    fn query(&mut self, sql: String) -> thrift::Result<ExtensionResponse>;

    /// Check that the extension manager is still answering.
    fn ping(&mut self) -> thrift::Result<ExtensionStatus>;
}
