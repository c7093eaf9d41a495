/// Thrift client implementation for osquery communication
use crate::client::trait_def::OsqueryClient;
use crate::client::types::{ExtensionResponse, ExtensionStatus, Row};
use crate::util::OptionToThriftResult;
use std::io::{Error, ErrorKind};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use thrift::protocol::{
    verify_expected_message_type, verify_expected_sequence_number, verify_expected_service_call,
    TBinaryInputProtocol, TBinaryOutputProtocol, TFieldIdentifier, TInputProtocol,
    TMessageIdentifier, TMessageType, TOutputProtocol, TStructIdentifier, TType,
};
use thrift::transport::{TBufferedReadTransport, TBufferedWriteTransport};

/// Production implementation of [`OsqueryClient`] using Thrift over Unix sockets.
pub struct ThriftClient {
    i_prot: TBinaryInputProtocol<TBufferedReadTransport<UnixStream>>,
    o_prot: TBinaryOutputProtocol<TBufferedWriteTransport<UnixStream>>,
    sequence_number: i32,
}

impl ThriftClient {
    /// Connect to osquery's extension socket. `timeout` bounds every socket
    /// read and write; a zero timeout blocks indefinitely.
    pub fn new(socket_path: impl AsRef<Path>, timeout: Duration) -> Result<Self, Error> {
        let socket_tx = UnixStream::connect(socket_path)?;
        let timeout = (!timeout.is_zero()).then_some(timeout);
        socket_tx.set_read_timeout(timeout)?;
        socket_tx.set_write_timeout(timeout)?;
        let socket_rx = socket_tx.try_clone()?;

        Ok(ThriftClient {
            i_prot: TBinaryInputProtocol::new(TBufferedReadTransport::new(socket_rx), true),
            o_prot: TBinaryOutputProtocol::new(TBufferedWriteTransport::new(socket_tx), true),
            sequence_number: 0,
        })
    }

    /// Connect once the socket accepts connections, polling every `interval`
    /// until `timeout` has passed.
    pub fn connect_with_retry(
        socket_path: impl AsRef<Path>,
        timeout: Duration,
        interval: Duration,
    ) -> Result<Self, Error> {
        let socket_path = socket_path.as_ref();
        let deadline = Instant::now() + timeout;
        loop {
            match Self::new(socket_path, timeout) {
                Ok(client) => return Ok(client),
                Err(e)
                    if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused)
                        && Instant::now() < deadline =>
                {
                    log::debug!("waiting for {}: {e}", socket_path.display());
                    thread::sleep(interval);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn send_call<F>(&mut self, name: &str, write_args: F) -> thrift::Result<()>
    where
        F: FnOnce(&mut dyn TOutputProtocol) -> thrift::Result<()>,
    {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        let message_ident = TMessageIdentifier::new(name, TMessageType::Call, self.sequence_number);
        self.o_prot.write_message_begin(&message_ident)?;
        self.o_prot
            .write_struct_begin(&TStructIdentifier::new(format!("{name}_args")))?;
        write_args(&mut self.o_prot)?;
        self.o_prot.write_field_stop()?;
        self.o_prot.write_struct_end()?;
        self.o_prot.write_message_end()?;
        self.o_prot.flush()
    }

    fn recv_reply<T, F>(&mut self, name: &str, read_success: F) -> thrift::Result<T>
    where
        F: FnOnce(&mut dyn TInputProtocol) -> thrift::Result<T>,
    {
        let message_ident = self.i_prot.read_message_begin()?;
        verify_expected_sequence_number(self.sequence_number, message_ident.sequence_number)?;
        verify_expected_service_call(name, &message_ident.name)?;
        if message_ident.message_type == TMessageType::Exception {
            let remote_error =
                thrift::Error::read_application_error_from_in_protocol(&mut self.i_prot)?;
            self.i_prot.read_message_end()?;
            return Err(thrift::Error::Application(remote_error));
        }
        verify_expected_message_type(TMessageType::Reply, message_ident.message_type)?;

        let mut read_success = Some(read_success);
        let mut success = None;
        self.i_prot.read_struct_begin()?;
        loop {
            let field_ident = self.i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match (field_ident.id, read_success.take()) {
                (Some(0), Some(read)) => success = Some(read(&mut self.i_prot)?),
                (_, read) => {
                    read_success = read;
                    self.i_prot.skip(field_ident.field_type)?;
                }
            }
            self.i_prot.read_field_end()?;
        }
        self.i_prot.read_struct_end()?;
        self.i_prot.read_message_end()?;

        success.ok_or_missing_result(|| format!("no result received for {name}"))
    }
}

impl OsqueryClient for ThriftClient {
    fn query(&mut self, sql: String) -> thrift::Result<ExtensionResponse> {
        self.send_call("query", |o| {
            o.write_field_begin(&TFieldIdentifier::new("sql", TType::String, 1))?;
            o.write_string(&sql)?;
            o.write_field_end()
        })?;
        self.recv_reply("query", read_extension_response)
    }

    fn ping(&mut self) -> thrift::Result<ExtensionStatus> {
        self.send_call("ping", |_| Ok(()))?;
        self.recv_reply("ping", read_extension_status)
    }
}

fn read_extension_status(i: &mut dyn TInputProtocol) -> thrift::Result<ExtensionStatus> {
    let mut status = ExtensionStatus::default();
    i.read_struct_begin()?;
    loop {
        let field_ident = i.read_field_begin()?;
        match (field_ident.id, field_ident.field_type) {
            (_, TType::Stop) => break,
            (Some(1), TType::I32) => status.code = Some(i.read_i32()?),
            (Some(2), TType::String) => status.message = Some(i.read_string()?),
            (Some(3), TType::I64) => status.uuid = Some(i.read_i64()?),
            (_, field_type) => i.skip(field_type)?,
        }
        i.read_field_end()?;
    }
    i.read_struct_end()?;
    Ok(status)
}

fn read_extension_response(i: &mut dyn TInputProtocol) -> thrift::Result<ExtensionResponse> {
    let mut response = ExtensionResponse::default();
    i.read_struct_begin()?;
    loop {
        let field_ident = i.read_field_begin()?;
        match (field_ident.id, field_ident.field_type) {
            (_, TType::Stop) => break,
            (Some(1), TType::Struct) => response.status = Some(read_extension_status(i)?),
            (Some(2), TType::List) => response.response = Some(read_rows(i)?),
            (_, field_type) => i.skip(field_type)?,
        }
        i.read_field_end()?;
    }
    i.read_struct_end()?;
    Ok(response)
}

fn read_rows(i: &mut dyn TInputProtocol) -> thrift::Result<Vec<Row>> {
    let list_ident = i.read_list_begin()?;
    let mut rows = Vec::with_capacity(usize::try_from(list_ident.size).unwrap_or_default());
    for _ in 0..list_ident.size {
        let map_ident = i.read_map_begin()?;
        let mut row = Row::new();
        for _ in 0..map_ident.size {
            let column = i.read_string()?;
            let value = i.read_string()?;
            row.insert(column, value);
        }
        i.read_map_end()?;
        rows.push(row);
    }
    i.read_list_end()?;
    Ok(rows)
}
