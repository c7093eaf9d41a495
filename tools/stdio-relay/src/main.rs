mod cli;

use clap::Parser;
use log::{info, warn};
use osquery_stdio::prelude::*;
use std::io::{self, Error, ErrorKind};

use crate::cli::Args;

fn main() -> io::Result<()> {
    let args = Args::parse();

    // stdout carries the protocol; logs go to stderr.
    let default_level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    let Some(socket) = args.socket.as_ref() else {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Missing required --socket argument",
        ));
    };

    let mut client = ThriftClient::connect_with_retry(socket, args.timeout(), args.interval())
        .map_err(|e| Error::new(e.kind(), format!("Error creating extension client: {e}")))?;

    match client.ping() {
        Ok(status) => info!("connected to osquery at {}: {status:?}", socket.display()),
        Err(e) => warn!("osquery did not answer ping: {e}"),
    }

    let mut relay = Relay::new(client);
    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();

    let exit = relay.run(stdin, stdout).map_err(Error::other)?;
    info!("relay finished: {exit:?}");

    Ok(())
}
