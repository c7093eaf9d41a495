//! Error taxonomy shared by the session, the query channel and the relay.

use std::io;

/// Errors surfaced by this crate.
///
/// Lines that do not carry a result are never reported through this type:
/// discarding them is the normal steady state of a query channel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A subprocess could not be spawned or the terminal could not be put in raw mode.
    #[error("failed to start {what}: {reason}")]
    Startup { what: String, reason: String },

    /// Writing a query failed, or reading failed for a reason other than the peer detaching.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// A query or result could not be serialized into a line.
    #[error("failed to encode line: {0}")]
    Encode(#[source] serde_json::Error),

    /// A line carrying the result marker could not be decoded.
    #[error("malformed result line: {0}")]
    Decode(#[source] serde_json::Error),

    /// The query engine answered with a non-zero status.
    #[error("query failed with status {code}: {message}")]
    QueryFailed { code: i32, message: String },

    /// The session is stopped, or its stream is owned by another reader.
    #[error("invalid session state: {0}")]
    InvalidState(&'static str),

    /// The RPC connection to the query engine failed.
    #[error("osquery rpc error: {0}")]
    Rpc(#[from] thrift::Error),
}

impl Error {
    pub(crate) fn startup(what: impl Into<String>, reason: impl ToString) -> Self {
        Error::Startup {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
