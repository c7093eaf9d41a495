/// Interactive relay between the process's own stdio and a session stream
use crate::channel::is_detached;
use crate::error::{Error, Result};
use crate::session::core::Session;
use crate::session::stop_handle::StopHandle;
use std::io::{self, Read, Write};
use std::thread;

impl Session {
    /// Hand the query stream to an interactive relay until the peer closes it.
    ///
    /// Bytes from `input` are forwarded to the stream on a background thread;
    /// the stream is copied to `output` on the calling thread. Afterwards the
    /// session refuses queries: a stream has a single reader for its lifetime.
    ///
    /// The input thread is not joined. It notices cancellation after its next
    /// read returns, so a blocking stdin read is simply abandoned.
    pub fn passthrough<I, O>(&mut self, input: I, mut output: O) -> Result<()>
    where
        I: Read + Send + 'static,
        O: Write,
    {
        let (buffered, mut reader, writer) = self.take_channel()?.into_inner();
        let handle = self.stop_handle();

        let input_handle = handle.clone();
        thread::Builder::new()
            .name("passthrough-input".to_string())
            .spawn(move || forward_input(input, writer, &input_handle))
            .map_err(Error::Transport)?;

        output.write_all(&buffered).map_err(Error::Transport)?;
        output.flush().map_err(Error::Transport)?;

        let result = copy_output(&mut reader, &mut output, &handle);
        handle.stop();
        result
    }
}

fn forward_input<I: Read, W: Write>(mut input: I, mut writer: W, handle: &StopHandle) {
    let mut buf = [0u8; 1024];
    while handle.is_running() {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("pass-through input closed: {e}");
                break;
            }
        };
        if !handle.is_running() {
            break;
        }
        let chunk = buf.get(..n).unwrap_or_default();
        if let Err(e) = writer.write_all(chunk).and_then(|()| writer.flush()) {
            log::debug!("pass-through stream closed for writing: {e}");
            break;
        }
    }
}

fn copy_output<R: Read, O: Write>(reader: &mut R, output: &mut O, handle: &StopHandle) -> Result<()> {
    let mut buf = [0u8; 4096];
    while handle.is_running() {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_detached(&e) => break,
            Err(e) => return Err(Error::Transport(e)),
        };
        let chunk = buf.get(..n).unwrap_or_default();
        output
            .write_all(chunk)
            .and_then(|()| output.flush())
            .map_err(Error::Transport)?;
    }
    Ok(())
}
