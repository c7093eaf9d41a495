//! Local processes attached to a pseudo-terminal.

use super::{CommandSpec, DuplexStream, Launched, Launcher, ProcessHandle};
use crate::error::{Error, Result};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

/// Spawns each command on its own pty pair.
#[derive(Debug, Clone, Default)]
pub struct PtyLauncher {
    size: PtySize,
}

impl PtyLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(rows: u16, cols: u16) -> Self {
        Self {
            size: PtySize {
                rows: rows.max(1),
                cols: cols.max(1),
                pixel_width: 0,
                pixel_height: 0,
            },
        }
    }
}

impl Launcher for PtyLauncher {
    fn launch(&mut self, command: &CommandSpec) -> Result<Launched> {
        let what = command.program.clone();
        let pair = native_pty_system()
            .openpty(self.size)
            .map_err(|e| Error::startup(&what, e))?;
        disable_line_editing(pair.master.as_ref()).map_err(|e| Error::startup(&what, e))?;

        let mut cmd = CommandBuilder::new(&command.program);
        cmd.args(&command.args);
        if let Some(cwd) = &command.cwd {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| Error::startup(&what, e))?;
        // The master only reports EIO once no slave handle is left open.
        drop(pair.slave);

        let mut process = PtyProcess {
            name: what.clone(),
            master: Some(pair.master),
            child,
            terminated: false,
        };

        let stream = match process.open_stream() {
            Ok(stream) => stream,
            Err(e) => {
                process.terminate();
                return Err(Error::startup(&what, e));
            }
        };

        log::info!(
            "started {} on a pty (pid {:?})",
            command.command_line(),
            process.id()
        );

        Ok(Launched {
            stream,
            process: Box::new(process),
        })
    }
}

/// Switch the pty to non-canonical input so request lines reach the child
/// byte for byte: no line length limit, no erase or kill characters. Echo
/// stays on.
#[cfg(unix)]
fn disable_line_editing(master: &(dyn MasterPty + Send)) -> std::result::Result<(), String> {
    use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg, SpecialCharacterIndices};

    let fd = master.as_raw_fd().ok_or("pty has no file descriptor")?;
    let mut attrs = tcgetattr(fd).map_err(|e| e.to_string())?;
    attrs.local_flags.remove(LocalFlags::ICANON | LocalFlags::IEXTEN);
    if let Some(vmin) = attrs
        .control_chars
        .get_mut(SpecialCharacterIndices::VMIN as usize)
    {
        *vmin = 1;
    }
    if let Some(vtime) = attrs
        .control_chars
        .get_mut(SpecialCharacterIndices::VTIME as usize)
    {
        *vtime = 0;
    }
    tcsetattr(fd, SetArg::TCSANOW, &attrs).map_err(|e| e.to_string())
}

#[cfg(not(unix))]
fn disable_line_editing(_master: &(dyn MasterPty + Send)) -> std::result::Result<(), String> {
    Ok(())
}

struct PtyProcess {
    name: String,
    master: Option<Box<dyn MasterPty + Send>>,
    child: Box<dyn Child + Send + Sync>,
    terminated: bool,
}

impl PtyProcess {
    fn open_stream(&mut self) -> std::result::Result<DuplexStream, String> {
        let master = self.master.as_ref().ok_or("pty already closed")?;
        let reader = master.try_clone_reader().map_err(|e| e.to_string())?;
        let writer = master.take_writer().map_err(|e| e.to_string())?;
        Ok(DuplexStream::new(reader, writer))
    }
}

impl ProcessHandle for PtyProcess {
    fn id(&self) -> Option<u32> {
        self.child.process_id()
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        // Closing the master hangs up the child's terminal.
        self.master.take();

        match self.child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("{} already exited: {status:?}", self.name);
                return;
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to poll {}: {e}", self.name),
        }

        if let Err(e) = self.child.kill() {
            log::warn!("Failed to kill {}: {e}", self.name);
        }
        if let Err(e) = self.child.wait() {
            log::warn!("Failed to reap {}: {e}", self.name);
        }
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}
