use osquery_stdio::prelude::*;
use std::path::PathBuf;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Extension socket the relay attaches to.
    #[arg(long, value_name = "PATH_TO_SOCKET", env = "OSQUERY_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Relay command line; --socket, --timeout and --interval are appended.
    #[arg(long, default_value = "stdio-relay")]
    pub relay: String,

    /// Seconds the relay waits for the socket to accept connections.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Seconds between the relay's connection attempts.
    #[arg(long, default_value_t = 1)]
    pub interval: u64,

    /// Don't start an osqueryi shell; the socket is already served.
    #[arg(long)]
    pub no_bootstrap: bool,

    /// Run the relay on this ssh destination instead of locally.
    #[arg(long, value_name = "USER@HOST")]
    pub remote: Option<String>,

    /// ssh port for --remote.
    #[arg(long, requires = "remote")]
    pub port: Option<u16>,

    /// ssh identity file for --remote.
    #[arg(long, requires = "remote")]
    pub identity: Option<PathBuf>,

    /// Put the controlling terminal in raw mode while the session runs.
    #[arg(long)]
    pub raw: bool,

    /// After the queries, attach this terminal to the relay instead of exiting.
    #[arg(long)]
    pub interactive: bool,

    /// Enable verbose informational messages.
    #[arg(long)]
    pub verbose: bool,

    /// Queries to run. Read one per line from stdin when none are given.
    pub queries: Vec<String>,
}

impl Args {
    /// Command line for the relay process.
    pub fn relay_command(&self) -> Result<CommandSpec, Error> {
        let mut command = CommandSpec::parse(&self.relay)?;
        if let Some(socket) = &self.socket {
            command = command.arg("--socket").arg(socket.display().to_string());
        }
        Ok(command
            .arg("--timeout")
            .arg(self.timeout.to_string())
            .arg("--interval")
            .arg(self.interval.to_string()))
    }

    /// Session options. Local sessions need a socket for osqueryi to expose.
    pub fn session_config(&self) -> Option<SessionConfig> {
        let config = match (&self.remote, &self.socket) {
            (Some(_), _) => SessionConfig::remote(),
            (None, Some(socket)) if self.no_bootstrap => SessionConfig::local(socket).bootstrap(None),
            (None, Some(socket)) => SessionConfig::local(socket),
            (None, None) => return None,
        };
        Some(config.raw_terminal(self.raw))
    }

    pub fn remote_launcher(&self) -> Option<RemoteLauncher> {
        let mut launcher = RemoteLauncher::new(self.remote.as_ref()?);
        if let Some(port) = self.port {
            launcher = launcher.port(port);
        }
        if let Some(identity) = &self.identity {
            launcher = launcher.identity(identity);
        }
        Some(launcher)
    }
}
