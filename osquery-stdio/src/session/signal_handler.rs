/// Signal handling for Unix platforms
use super::StopHandle;
use crate::terminal::Terminal;
use std::thread::JoinHandle;

/// Exit status after a second termination signal.
const FORCED_EXIT_CODE: i32 = 1;

/// Watches SIGTERM and SIGINT on a background thread until unregistered.
///
/// The first signal raises the session's [`StopHandle`]. A second one restores
/// the terminal and exits the process, so a query blocked on a silent peer can
/// still be interrupted.
pub struct SignalHandler {
    #[cfg(unix)]
    handle: Option<signal_hook::iterator::Handle>,
    thread: Option<JoinHandle<()>>,
}

impl SignalHandler {
    #[cfg(unix)]
    pub fn register_handlers(stop: &StopHandle) -> Self {
        Self::register_with_terminal(stop, Box::new(crate::terminal::ConsoleTerminal))
    }

    /// Like [`SignalHandler::register_handlers`], restoring `terminal` before a forced exit.
    #[cfg(unix)]
    pub fn register_with_terminal(stop: &StopHandle, mut terminal: Box<dyn Terminal>) -> Self {
        use signal_hook::consts::TERM_SIGNALS;
        use signal_hook::iterator::Signals;

        // Registration failure only means signals won't cancel the session.
        let mut signals = match Signals::new(TERM_SIGNALS) {
            Ok(signals) => signals,
            Err(e) => {
                log::warn!("Failed to register signal handlers: {e}");
                return Self {
                    handle: None,
                    thread: None,
                };
            }
        };
        let handle = signals.handle();
        let stop = stop.clone();

        let spawned = std::thread::Builder::new()
            .name("signal-handler".to_string())
            .spawn(move || {
                let mut signalled = false;
                for signal in signals.forever() {
                    if !signalled {
                        log::info!("Received signal {signal}, stopping session");
                        signalled = true;
                        stop.stop();
                        continue;
                    }
                    log::warn!("Received signal {signal} again, exiting");
                    if let Err(e) = terminal.disable_raw_mode() {
                        log::warn!("Failed to restore terminal mode: {e}");
                    }
                    std::process::exit(FORCED_EXIT_CODE);
                }
                // Dropping `signals` here removes the handlers.
            });

        match spawned {
            Ok(thread) => Self {
                handle: Some(handle),
                thread: Some(thread),
            },
            Err(e) => {
                log::warn!("Failed to start signal handler thread: {e}");
                handle.close();
                Self {
                    handle: None,
                    thread: None,
                }
            }
        }
    }

    /// No-op on non-Unix platforms
    #[cfg(not(unix))]
    pub fn register_handlers(_stop: &StopHandle) -> Self {
        Self { thread: None }
    }

    /// No-op on non-Unix platforms
    #[cfg(not(unix))]
    pub fn register_with_terminal(_stop: &StopHandle, _terminal: Box<dyn Terminal>) -> Self {
        Self { thread: None }
    }

    /// Remove the handlers and wait for the watcher thread. Idempotent.
    pub fn unregister(&mut self) {
        #[cfg(unix)]
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("Signal handler thread panicked");
            }
        }
    }

    pub fn is_registered(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        self.unregister();
    }
}
