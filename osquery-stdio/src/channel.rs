//! Request/response exchange over an already-open duplex stream.

use crate::error::{Error, Result};
use crate::protocol::{self, QueryResult, EXIT_QUERY, LINE_DELIMITER};
use std::io::{self, BufRead, BufReader, Read, Write};

/// errno reported by a pty master once every slave handle is closed.
const EIO: i32 = 5;

/// Runs one query at a time over a stream and picks out its result line.
///
/// Correlation is positional: the first result line read after a query was
/// written answers that query. Callers must not interleave `send` calls from
/// several threads on the same channel.
pub struct QueryChannel<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R: Read, W: Write> QueryChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Send `sql` and wait for its result.
    ///
    /// Returns `Ok(None)` when the peer went away before answering, which is
    /// how a session ends after the exit query.
    pub fn send(&mut self, sql: &str) -> Result<Option<QueryResult>> {
        self.write_query(sql)?;

        let mut line = Vec::new();
        loop {
            line.clear();
            match self.reader.read_until(LINE_DELIMITER, &mut line) {
                Ok(0) => {
                    log::debug!("stream closed before a result arrived");
                    return Ok(None);
                }
                Ok(_) => {
                    if !protocol::is_result_line(&line) {
                        log::trace!("discarding {:?}", String::from_utf8_lossy(&line));
                        continue;
                    }
                    let result = protocol::decode_result(&line)?;
                    return result.into_checked().map(Some);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_detached(&e) => {
                    log::debug!("peer detached: {e}");
                    // read_until keeps what it read before failing
                    if protocol::is_result_line(&line) {
                        return protocol::decode_result(&line)?.into_checked().map(Some);
                    }
                    return Ok(None);
                }
                Err(e) => return Err(Error::Transport(e)),
            }
        }
    }

    /// Ask the peer to terminate without waiting for anything in return.
    pub fn send_exit(&mut self) -> Result<()> {
        self.write_query(EXIT_QUERY)
    }

    /// Hand the underlying halves to another owner. Bytes already buffered
    /// from the reader are returned alongside it.
    pub fn into_inner(self) -> (Vec<u8>, R, W) {
        let buffered = self.reader.buffer().to_vec();
        (buffered, self.reader.into_inner(), self.writer)
    }

    fn write_query(&mut self, sql: &str) -> Result<()> {
        let line = protocol::encode_query(sql)?;
        self.writer.write_all(&line).map_err(Error::Transport)?;
        self.writer.flush().map_err(Error::Transport)
    }
}

/// Whether a read error means the process behind the stream is gone.
pub fn is_detached(err: &io::Error) -> bool {
    err.raw_os_error() == Some(EIO)
        || err
            .to_string()
            .to_ascii_lowercase()
            .contains("input/output error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Reader replaying canned chunks, then an optional terminal error.
    struct Script {
        chunks: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Script {
        fn new(chunks: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                chunks: chunks.into(),
            }
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(mut chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.chunks.push_front(Ok(chunk.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }
    }

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn line(s: &str) -> io::Result<Vec<u8>> {
        Ok(s.as_bytes().to_vec())
    }

    fn eio() -> io::Result<Vec<u8>> {
        Err(io::Error::from_raw_os_error(EIO))
    }

    #[test]
    fn test_send_skips_echo_and_prompt() {
        let sink = Sink::default();
        let script = Script::new(vec![
            line("{\"query\":\"select 1\"}\r\n"),
            line("prompt> \r\n"),
            line("{\"data\":[{\"1\":\"1\"}]}\r\n"),
        ]);
        let mut channel = QueryChannel::new(script, sink.clone());

        let result = channel.send("select 1").unwrap().unwrap();

        assert_eq!(result.data, json!([{"1": "1"}]));
        assert_eq!(
            sink.0.lock().unwrap().as_slice(),
            b"{\"query\":\"select 1\"}\n"
        );
    }

    #[test]
    fn test_send_result_split_across_reads() {
        let script = Script::new(vec![
            line("banner\n{\"da"),
            line("ta\":[1,"),
            line("2]}\n"),
        ]);
        let mut channel = QueryChannel::new(script, Sink::default());

        let result = channel.send("select 1").unwrap().unwrap();
        assert_eq!(result.data, json!([1, 2]));
    }

    #[test]
    fn test_send_stops_at_first_result() {
        let script = Script::new(vec![
            line("{\"data\":\"first\"}\n{\"data\":\"second\"}\n"),
        ]);
        let mut channel = QueryChannel::new(script, Sink::default());

        let first = channel.send("a").unwrap().unwrap();
        let second = channel.send("b").unwrap().unwrap();
        assert_eq!(first.data, json!("first"));
        assert_eq!(second.data, json!("second"));
    }

    #[test]
    fn test_send_many_noise_lines() {
        let mut chunks: Vec<_> = (0..500).map(|i| line(&format!("noise {i}\n"))).collect();
        chunks.push(line("{\"data\":{\"k\":\"v\"}}\n"));
        let mut channel = QueryChannel::new(Script::new(chunks), Sink::default());

        let result = channel.send("select k").unwrap().unwrap();
        assert_eq!(result.data, json!({"k": "v"}));
    }

    #[test]
    fn test_send_detached_is_graceful() {
        let script = Script::new(vec![line("{\"query\":\"exit\"}\r\n"), eio()]);
        let mut channel = QueryChannel::new(script, Sink::default());

        assert!(channel.send("exit").unwrap().is_none());
    }

    #[test]
    fn test_send_detached_by_message() {
        let script = Script::new(vec![Err(io::Error::other("read /dev/ptmx: input/output error"))]);
        let mut channel = QueryChannel::new(script, Sink::default());

        assert!(channel.send("select 1").unwrap().is_none());
    }

    #[test]
    fn test_send_end_of_stream_is_graceful() {
        let script = Script::new(vec![line("bye\n")]);
        let mut channel = QueryChannel::new(script, Sink::default());

        assert!(channel.send("select 1").unwrap().is_none());
    }

    #[test]
    fn test_send_unterminated_result_at_end_of_stream() {
        let script = Script::new(vec![line("{\"data\":true}")]);
        let mut channel = QueryChannel::new(script, Sink::default());

        let result = channel.send("select 1").unwrap().unwrap();
        assert_eq!(result.data, json!(true));
    }

    #[test]
    fn test_send_connection_reset_is_transport_error() {
        let script = Script::new(vec![
            line("prompt> \n"),
            Err(io::Error::from(io::ErrorKind::ConnectionReset)),
        ]);
        let mut channel = QueryChannel::new(script, Sink::default());

        let err = channel.send("select 1").unwrap_err();
        assert!(matches!(err, Error::Transport(e) if e.kind() == io::ErrorKind::ConnectionReset));
    }

    #[test]
    fn test_send_malformed_result_is_decode_error() {
        let script = Script::new(vec![line("{\"data\":[{\"1\":\n")]);
        let mut channel = QueryChannel::new(script, Sink::default());

        let err = channel.send("select 1").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_send_engine_failure_is_surfaced() {
        let script = Script::new(vec![line(
            "{\"data\":[],\"status\":{\"code\":1,\"message\":\"no such table: nope\"}}\n",
        )]);
        let mut channel = QueryChannel::new(script, Sink::default());

        let err = channel.send("select * from nope").unwrap_err();
        assert!(matches!(err, Error::QueryFailed { code: 1, ref message } if message == "no such table: nope"));
    }

    #[test]
    fn test_send_write_failure_is_transport_error() {
        let mut channel = QueryChannel::new(Script::new(vec![]), BrokenWriter);

        let err = channel.send("select 1").unwrap_err();
        assert!(matches!(err, Error::Transport(e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn test_send_exit_does_not_read() {
        let sink = Sink::default();
        let script = Script::new(vec![Err(io::Error::from(io::ErrorKind::ConnectionReset))]);
        let mut channel = QueryChannel::new(script, sink.clone());

        channel.send_exit().unwrap();
        assert_eq!(sink.0.lock().unwrap().as_slice(), b"{\"query\":\"exit\"}\n");
    }

    #[test]
    fn test_into_inner_returns_buffered_bytes() {
        let script = Script::new(vec![line("{\"data\":1}\nleftover\n")]);
        let mut channel = QueryChannel::new(script, Sink::default());
        channel.send("select 1").unwrap();

        let (buffered, _reader, _writer) = channel.into_inner();
        assert_eq!(buffered, b"leftover\n");
    }

    #[test]
    fn test_is_detached() {
        assert!(is_detached(&io::Error::from_raw_os_error(EIO)));
        assert!(is_detached(&io::Error::other("Input/output error")));
        assert!(!is_detached(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(!is_detached(&io::Error::from(io::ErrorKind::BrokenPipe)));
    }
}
