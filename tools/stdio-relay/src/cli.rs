use std::path::PathBuf;
use std::time::Duration;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the extensions UNIX domain socket.
    #[arg(long, value_name = "PATH_TO_SOCKET", env = "OSQUERY_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Seconds to wait for the socket to accept connections, also used as the RPC timeout.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Seconds between connection attempts while waiting for the socket.
    #[arg(long, default_value_t = 1)]
    pub interval: u64,

    /// Enable verbose informational messages.
    #[arg(long)]
    pub verbose: bool,
}

impl Args {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }
}
