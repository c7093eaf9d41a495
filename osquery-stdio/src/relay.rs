//! Extension side of the line protocol: reads queries, answers with results.

use crate::channel::is_detached;
use crate::client::{ExtensionResponse, OsqueryClient};
use crate::error::{Error, Result};
use crate::protocol::{self, QueryResult, LINE_DELIMITER};
use serde_json::{Map, Value};
use std::io::{self, BufRead, Write};

/// Status code sent back for a request line that is not a query.
pub const MALFORMED_QUERY_CODE: i32 = 1;

/// Why [`Relay::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// The input stream ended.
    Disconnected,
    /// The exit query arrived.
    ExitRequested,
}

/// Executes each query line through an [`OsqueryClient`] and writes exactly
/// one result line per query.
pub struct Relay<C: OsqueryClient> {
    client: C,
}

impl<C: OsqueryClient> Relay<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Serve queries from `input` until it closes or the exit query arrives.
    ///
    /// Engine failures are answered, not fatal. A broken RPC connection is.
    pub fn run<I: BufRead, O: Write>(&mut self, mut input: I, mut output: O) -> Result<RelayExit> {
        let mut line = Vec::new();
        loop {
            line.clear();
            match input.read_until(LINE_DELIMITER, &mut line) {
                Ok(0) => {
                    log::info!("client has disconnected");
                    return Ok(RelayExit::Disconnected);
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_detached(&e) => {
                    log::info!("client has disconnected: {e}");
                    return Ok(RelayExit::Disconnected);
                }
                Err(e) => return Err(Error::Transport(e)),
            }

            if protocol::trim_line(&line).iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let result = match protocol::decode_query(&line) {
                Ok(query) if query.is_exit() => {
                    log::info!("Exit command received, terminating");
                    return Ok(RelayExit::ExitRequested);
                }
                Ok(query) => self.execute(&query.sql)?,
                Err(e) => {
                    log::warn!("Malformed query line: {e}");
                    QueryResult::failed(
                        Value::Null,
                        MALFORMED_QUERY_CODE,
                        format!("malformed query: {e}"),
                    )
                }
            };

            output
                .write_all(&protocol::encode_result(&result)?)
                .and_then(|()| output.flush())
                .map_err(Error::Transport)?;
        }
    }

    fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        log::debug!("executing {sql}");
        let response = self.client.query(sql.to_string())?;
        let data = rows_to_json(&response);

        match response.status {
            Some(status) if !status.is_ok() => {
                let message = status.message.unwrap_or_default();
                log::warn!("osquery returned error: {message}");
                Ok(QueryResult::failed(data, status.code.unwrap_or_default(), message))
            }
            _ => Ok(QueryResult::new(data)),
        }
    }

    pub fn into_client(self) -> C {
        self.client
    }
}

/// Rows as a JSON array of objects with string values.
pub fn rows_to_json(response: &ExtensionResponse) -> Value {
    Value::Array(
        response
            .rows()
            .iter()
            .map(|row| {
                Value::Object(
                    row.iter()
                        .map(|(column, value)| (column.clone(), Value::String(value.clone())))
                        .collect::<Map<String, Value>>(),
                )
            })
            .collect(),
    )
}
