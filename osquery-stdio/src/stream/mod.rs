//! Duplex byte streams and the launchers that produce them.
//!
//! - `pty`: a local process attached to a pseudo-terminal
//! - `remote`: a command executed on another host through `ssh`
//!
//! Neither the session nor the query channel care which one backs a stream.

pub mod pty;
pub mod remote;

use crate::error::{Error, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub use pty::PtyLauncher;
pub use remote::RemoteLauncher;

/// Both halves of a bidirectional byte channel.
pub struct DuplexStream {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
}

impl DuplexStream {
    pub fn new(reader: Box<dyn Read + Send>, writer: Box<dyn Write + Send>) -> Self {
        Self { reader, writer }
    }
}

/// Program plus arguments for a stream-backed subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Split a command line on whitespace. No quoting rules apply.
    pub fn parse(command: &str) -> Result<Self> {
        let mut words = command.split_whitespace();
        let Some(program) = words.next() else {
            return Err(Error::startup("command", "empty command line"));
        };
        Ok(Self::new(program).args(words))
    }

    /// osqueryi instance that exposes its extension socket at `socket_path`.
    pub fn osqueryi(socket_path: &Path) -> Self {
        Self::new("osqueryi")
            .arg("--nodisable_extensions")
            .arg(format!("--extensions_socket={}", socket_path.display()))
    }

    /// The command as a single shell line, for logging and remote execution.
    /// Words are quoted so a POSIX shell splits the line back into the same
    /// program and arguments.
    pub fn command_line(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(&self.args))
    }
}

/// A running subprocess behind a stream.
pub trait ProcessHandle: Send {
    /// OS process id, when known.
    fn id(&self) -> Option<u32>;

    /// Stop the process and release its handles. Safe to call repeatedly;
    /// failures are logged, never returned.
    fn terminate(&mut self);
}

/// A freshly started subprocess and the stream attached to it.
pub struct Launched {
    pub stream: DuplexStream,
    pub process: Box<dyn ProcessHandle>,
}

/// Factory for stream-backed subprocesses.
#[cfg_attr(test, mockall::automock)]
pub trait Launcher: Send {
    fn launch(&mut self, command: &CommandSpec) -> Result<Launched>;
}
