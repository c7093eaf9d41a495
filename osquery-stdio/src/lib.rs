#![forbid(unsafe_code)]

//! Synchronous JSON queries against osquery through a pseudo-terminal or a
//! remote shell.
//!
//! A [`Session`] starts the processes behind a duplex stream and owns their
//! teardown; its [`QueryChannel`] writes one query line at a time and picks the
//! single result line out of whatever else the stream carries. The [`Relay`]
//! is the other end of the stream, answering queries through osquery's
//! extension socket.

pub mod channel;
pub mod client;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod session;
pub mod stream;
pub mod terminal;
mod util;

pub use crate::channel::QueryChannel;
pub use crate::error::{Error, Result};
pub use crate::protocol::{Query, QueryResult, EXIT_QUERY};
pub use crate::relay::{Relay, RelayExit};
pub use crate::session::{Session, SessionConfig, SessionState, StopHandle};

///
/// Expose everything a query client or relay binary needs
///
/// ```
/// use osquery_stdio::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::{OsqueryClient, ThriftClient};
    pub use crate::session::SignalHandler;
    pub use crate::stream::{CommandSpec, Launcher, PtyLauncher, RemoteLauncher};
    pub use crate::{
        Error, QueryResult, Relay, RelayExit, Session, SessionConfig, SessionState, StopHandle,
        EXIT_QUERY,
    };
}
