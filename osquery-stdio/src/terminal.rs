//! Scoped raw mode for the controlling terminal.

use crate::error::{Error, Result};
use std::io;

/// Switches the controlling terminal between raw and cooked input.
#[cfg_attr(test, mockall::automock)]
pub trait Terminal: Send {
    fn is_raw_mode_enabled(&self) -> io::Result<bool>;
    fn enable_raw_mode(&mut self) -> io::Result<()>;
    fn disable_raw_mode(&mut self) -> io::Result<()>;
}

/// The process's own terminal, through crossterm.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleTerminal;

impl Terminal for ConsoleTerminal {
    fn is_raw_mode_enabled(&self) -> io::Result<bool> {
        crossterm::terminal::is_raw_mode_enabled()
    }

    fn enable_raw_mode(&mut self) -> io::Result<()> {
        crossterm::terminal::enable_raw_mode()
    }

    fn disable_raw_mode(&mut self) -> io::Result<()> {
        crossterm::terminal::disable_raw_mode()
    }
}

/// Holds the controlling terminal in raw mode until restored or dropped.
///
/// Only a guard that actually switched the terminal into raw mode switches it
/// back, so nesting inside an already-raw terminal leaves it raw.
pub struct RawModeGuard {
    terminal: Box<dyn Terminal>,
    enabled_here: bool,
    restored: bool,
}

impl RawModeGuard {
    pub fn acquire() -> Result<Self> {
        Self::acquire_on(Box::new(ConsoleTerminal))
    }

    pub fn acquire_on(mut terminal: Box<dyn Terminal>) -> Result<Self> {
        let was_raw = terminal
            .is_raw_mode_enabled()
            .map_err(|e| Error::startup("raw terminal", e))?;
        if !was_raw {
            terminal
                .enable_raw_mode()
                .map_err(|e| Error::startup("raw terminal", e))?;
            log::debug!("terminal switched to raw mode");
        }
        Ok(Self {
            terminal,
            enabled_here: !was_raw,
            restored: false,
        })
    }

    /// Put the terminal back the way `acquire` found it. Idempotent.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        if !self.enabled_here {
            return;
        }
        match self.terminal.disable_raw_mode() {
            Ok(()) => log::debug!("terminal restored"),
            Err(e) => log::warn!("Failed to restore terminal mode: {e}"),
        }
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        self.restore();
    }
}
