mod cli;

use clap::Parser;
use log::{info, warn};
use osquery_stdio::prelude::*;
use std::io::{self, BufRead, Error, ErrorKind, Write};

use crate::cli::Args;

fn main() -> io::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    let Some(config) = args.session_config() else {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Missing required --socket argument",
        ));
    };
    let command = args.relay_command().map_err(Error::other)?;

    // Read stdin up front: once the session is running the terminal may be raw.
    let queries = if args.queries.is_empty() && !args.interactive {
        io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<Vec<_>>>()?
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect()
    } else {
        args.queries.clone()
    };

    let mut session = match args.remote_launcher() {
        Some(mut launcher) => Session::start(&mut launcher, &command, &config),
        None => Session::start(&mut PtyLauncher::new(), &command, &config),
    }
    .map_err(Error::other)?;

    let handle = session.stop_handle();
    session.handle_signals();

    let mut printer = Printer::new(io::stdout(), config.raw_terminal);
    for sql in &queries {
        if !handle.is_running() {
            warn!("Interrupted, skipping remaining queries");
            break;
        }
        match session.send_query(sql) {
            Ok(Some(result)) => printer.result(&result)?,
            Ok(None) => {
                warn!("relay terminated before answering {sql:?}");
                break;
            }
            Err(e) => printer.error(sql, &e)?,
        }
    }

    if args.interactive && handle.is_running() {
        session.passthrough(io::stdin(), io::stdout()).map_err(Error::other)?;
    } else if session.state() == SessionState::Started {
        // The relay exits instead of answering; the channel sees it detach.
        match session.send_query(EXIT_QUERY) {
            Ok(_) => info!("relay exited"),
            Err(e) => warn!("Error while closing the relay: {e}"),
        }
    }

    session.stop();
    Ok(())
}

/// Writes results to stdout, with `\r\n` line ends while the terminal is raw.
struct Printer<W: Write> {
    out: W,
    line_end: &'static str,
}

impl<W: Write> Printer<W> {
    fn new(out: W, raw_terminal: bool) -> Self {
        Self {
            out,
            line_end: if raw_terminal { "\r\n" } else { "\n" },
        }
    }

    fn result(&mut self, result: &QueryResult) -> io::Result<()> {
        let rendered = serde_json::to_string(&result.data).map_err(Error::other)?;
        write!(self.out, "{rendered}{}", self.line_end)?;
        self.out.flush()
    }

    fn error(&mut self, sql: &str, error: &osquery_stdio::Error) -> io::Result<()> {
        // Reported against the query only; the session carries on.
        let mut stderr = io::stderr();
        write!(stderr, "Error: {sql}: {error}{}", self.line_end)?;
        stderr.flush()
    }
}
