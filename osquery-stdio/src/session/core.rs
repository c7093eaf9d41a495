/// Session lifecycle: subprocesses, terminal mode and the query channel
use crate::channel::QueryChannel;
use crate::error::{Error, Result};
use crate::protocol::QueryResult;
use crate::session::signal_handler::SignalHandler;
use crate::session::stop_handle::StopHandle;
use crate::stream::{CommandSpec, DuplexStream, Launched, Launcher, ProcessHandle};
use crate::terminal::{ConsoleTerminal, RawModeGuard, Terminal};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

pub(crate) type StreamChannel = QueryChannel<Box<dyn Read + Send>, Box<dyn Write + Send>>;

/// Options recognised by [`Session::start`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Put the controlling terminal in raw input mode for the session's lifetime.
    pub raw_terminal: bool,
    /// Extension socket the bootstrap process exposes for the relay.
    pub socket_path: Option<PathBuf>,
    /// Process started before the query process, e.g. an osqueryi shell.
    pub bootstrap: Option<CommandSpec>,
}

impl SessionConfig {
    /// Local variant: an osqueryi bootstrap exposing `socket_path`.
    pub fn local(socket_path: impl Into<PathBuf>) -> Self {
        let socket_path = socket_path.into();
        Self {
            raw_terminal: false,
            bootstrap: Some(CommandSpec::osqueryi(&socket_path)),
            socket_path: Some(socket_path),
        }
    }

    /// Remote variant: the query process reaches an engine on its own host.
    pub fn remote() -> Self {
        Self::default()
    }

    pub fn raw_terminal(mut self, raw_terminal: bool) -> Self {
        self.raw_terminal = raw_terminal;
        self
    }

    pub fn bootstrap(mut self, bootstrap: Option<CommandSpec>) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn socket_path(&self) -> Option<&Path> {
        self.socket_path.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Started,
    /// The stream belongs to the interactive relay; queries are refused.
    PassThrough,
    Stopped,
}

/// Owns everything a query stream needs and releases it in [`Session::stop`].
///
/// Built once by the composition root and handed to whoever issues queries.
/// A stopped session is not restarted; start a new one instead.
pub struct Session {
    state: SessionState,
    processes: Vec<Box<dyn ProcessHandle>>,
    channel: Option<StreamChannel>,
    bootstrap_input: Option<Box<dyn Write + Send>>,
    raw_mode: Option<RawModeGuard>,
    signals: Option<SignalHandler>,
    stop_handle: StopHandle,
}

impl Session {
    /// Start the bootstrap (if configured), then `command`, then raw mode.
    ///
    /// On failure everything acquired so far has been released by the time
    /// the error is returned.
    pub fn start<L>(launcher: &mut L, command: &CommandSpec, config: &SessionConfig) -> Result<Self>
    where
        L: Launcher + ?Sized,
    {
        Self::start_on(launcher, command, config, Box::new(ConsoleTerminal))
    }

    /// Like [`Session::start`], switching `terminal` to raw mode when configured.
    pub fn start_on<L>(
        launcher: &mut L,
        command: &CommandSpec,
        config: &SessionConfig,
        terminal: Box<dyn Terminal>,
    ) -> Result<Self>
    where
        L: Launcher + ?Sized,
    {
        let mut session = Session {
            state: SessionState::Started,
            processes: Vec::new(),
            channel: None,
            bootstrap_input: None,
            raw_mode: None,
            signals: None,
            stop_handle: StopHandle::new(Arc::new(AtomicBool::new(false))),
        };

        if let Err(e) = session.acquire(launcher, command, config, terminal) {
            log::warn!("Session startup failed: {e}");
            session.stop();
            return Err(e);
        }

        log::info!("Session started for {}", command.command_line());
        Ok(session)
    }

    fn acquire<L>(
        &mut self,
        launcher: &mut L,
        command: &CommandSpec,
        config: &SessionConfig,
        terminal: Box<dyn Terminal>,
    ) -> Result<()>
    where
        L: Launcher + ?Sized,
    {
        if let Some(bootstrap) = &config.bootstrap {
            let Launched { stream, process } = launcher.launch(bootstrap)?;
            self.processes.push(process);
            self.bootstrap_input = Some(drain_output(&bootstrap.program, stream));
        }

        let Launched { stream, process } = launcher.launch(command)?;
        self.processes.push(process);
        self.channel = Some(QueryChannel::new(stream.reader, stream.writer));

        if config.raw_terminal {
            self.raw_mode = Some(RawModeGuard::acquire_on(terminal)?);
        }
        Ok(())
    }

    /// Run one query and wait for its result.
    ///
    /// `Ok(None)` means the query process has gone away; no further results
    /// will arrive on this session.
    pub fn send_query(&mut self, sql: &str) -> Result<Option<QueryResult>> {
        self.channel_mut()?.send(sql)
    }

    /// Ask the query process to exit without waiting for an answer.
    pub fn send_exit(&mut self) -> Result<()> {
        self.channel_mut()?.send_exit()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    /// Let SIGINT/SIGTERM raise this session's stop handle until [`Session::stop`].
    pub fn handle_signals(&mut self) {
        if self.state == SessionState::Stopped || self.signals.is_some() {
            return;
        }
        self.signals = Some(SignalHandler::register_handlers(&self.stop_handle));
    }

    /// Process ids of the running subprocesses, in start order.
    pub fn process_ids(&self) -> Vec<Option<u32>> {
        self.processes.iter().map(|p| p.id()).collect()
    }

    /// Release every acquired resource. Idempotent and infallible.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.stop_handle.stop();

        if let Some(mut signals) = self.signals.take() {
            signals.unregister();
        }

        self.channel.take();
        self.bootstrap_input.take();

        while let Some(mut process) = self.processes.pop() {
            process.terminate();
        }

        if let Some(mut raw_mode) = self.raw_mode.take() {
            raw_mode.restore();
        }

        self.state = SessionState::Stopped;
        log::info!("Session stopped");
    }

    fn channel_mut(&mut self) -> Result<&mut StreamChannel> {
        match self.state {
            SessionState::Stopped => return Err(Error::InvalidState("session stopped")),
            SessionState::PassThrough => {
                return Err(Error::InvalidState("stream owned by pass-through relay"))
            }
            SessionState::Started => {}
        }
        self.channel
            .as_mut()
            .ok_or(Error::InvalidState("session has no query stream"))
    }

    pub(crate) fn take_channel(&mut self) -> Result<StreamChannel> {
        self.channel_mut()?;
        let channel = self
            .channel
            .take()
            .ok_or(Error::InvalidState("session has no query stream"))?;
        self.state = SessionState::PassThrough;
        Ok(channel)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keep reading a stream nobody queries so its process never blocks on a full
/// terminal buffer. Returns the write half, which keeps the stream open.
fn drain_output(name: &str, stream: DuplexStream) -> Box<dyn Write + Send> {
    let DuplexStream { mut reader, writer } = stream;
    let name = name.to_string();
    let spawned = thread::Builder::new()
        .name(format!("{name}-drain"))
        .spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => log::trace!(
                        "{name}: {}",
                        String::from_utf8_lossy(buf.get(..n).unwrap_or_default())
                    ),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            log::debug!("{name} output closed");
        });
    if let Err(e) = spawned {
        log::warn!("Failed to start output drain: {e}");
    }
    writer
}
