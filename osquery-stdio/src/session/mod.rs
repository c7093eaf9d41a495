//! Session lifecycle for a query stream
//!
//! - `core`: start/stop of the subprocesses, terminal mode and query channel
//! - `stop_handle`: clonable cancellation flag shared with other threads
//! - `signal_handler`: wires SIGINT/SIGTERM to that flag
//! - `passthrough`: hands the stream to an interactive stdin/stdout relay

pub mod core;
pub mod passthrough;
pub mod signal_handler;
pub mod stop_handle;

pub use self::core::{Session, SessionConfig, SessionState};
pub use signal_handler::SignalHandler;
pub use stop_handle::StopHandle;
