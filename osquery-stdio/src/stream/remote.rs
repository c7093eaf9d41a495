//! Commands executed on a remote host through the system `ssh` client.
//!
//! Authentication, host keys and dialing stay with `ssh`; this side only sees
//! the remote command's stdin and stdout.

use super::{CommandSpec, DuplexStream, Launched, Launcher, ProcessHandle};
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

#[derive(Debug, Clone)]
pub struct RemoteLauncher {
    destination: String,
    port: Option<u16>,
    identity: Option<PathBuf>,
    ssh_program: String,
}

impl RemoteLauncher {
    /// `destination` is anything `ssh` accepts, e.g. `user@host`.
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            port: None,
            identity: None,
            ssh_program: "ssh".to_string(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn identity(mut self, identity: impl Into<PathBuf>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Use another ssh-compatible client binary.
    pub fn ssh_program(mut self, program: impl Into<String>) -> Self {
        self.ssh_program = program.into();
        self
    }

    /// Full local command line that runs `command` remotely.
    pub fn ssh_command(&self, command: &CommandSpec) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.ssh_program).arg("-T");
        if let Some(port) = self.port {
            spec = spec.arg("-p").arg(port.to_string());
        }
        if let Some(identity) = &self.identity {
            spec = spec.arg("-i").arg(identity.display().to_string());
        }
        let remote = match &command.cwd {
            Some(cwd) => format!(
                "cd {} && {}",
                shell_words::quote(&cwd.display().to_string()),
                command.command_line()
            ),
            None => command.command_line(),
        };
        spec.arg(&self.destination).arg("--").arg(remote)
    }
}

impl Launcher for RemoteLauncher {
    fn launch(&mut self, command: &CommandSpec) -> Result<Launched> {
        let ssh = self.ssh_command(command);
        let mut child = Command::new(&ssh.program)
            .args(&ssh.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::startup(&ssh.program, e))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::startup(&ssh.program, "stdio pipes unavailable"));
        };

        log::info!(
            "started {} on {} (pid {})",
            command.command_line(),
            self.destination,
            child.id()
        );

        Ok(Launched {
            stream: DuplexStream::new(Box::new(stdout), Box::new(stdin)),
            process: Box::new(RemoteProcess {
                destination: self.destination.clone(),
                child,
                terminated: false,
            }),
        })
    }
}

struct RemoteProcess {
    destination: String,
    child: Child,
    terminated: bool,
}

impl ProcessHandle for RemoteProcess {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        match self.child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("ssh session to {} already ended: {status}", self.destination);
                return;
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to poll ssh session to {}: {e}", self.destination),
        }

        if let Err(e) = self.child.kill() {
            log::warn!("Failed to kill ssh session to {}: {e}", self.destination);
        }
        if let Err(e) = self.child.wait() {
            log::warn!("Failed to reap ssh session to {}: {e}", self.destination);
        }
    }
}

impl Drop for RemoteProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}
