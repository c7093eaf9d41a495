//! Line-framed JSON codec spoken over a duplex stream.
//!
//! A request is one `{"query":"<sql>"}` object per line. A response is one
//! object per line that starts with `{"data"`; everything else on the stream
//! (terminal echo, prompts, banners) is noise.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Byte sequence every result line starts with.
pub const RESULT_MARKER: &[u8] = b"{\"data\"";

/// Query text asking the relay to terminate.
pub const EXIT_QUERY: &str = "exit";

pub const LINE_DELIMITER: u8 = b'\n';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    #[serde(rename = "query")]
    pub sql: String,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn is_exit(&self) -> bool {
        self.sql == EXIT_QUERY
    }
}

/// Status reported by the query engine alongside a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// One answered query.
///
/// `data` is whatever the engine produced for the query; this layer never
/// looks inside it. `status` follows `data` on the wire so result lines keep
/// their marker prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EngineStatus>,
}

impl QueryResult {
    pub fn new(data: Value) -> Self {
        Self { data, status: None }
    }

    pub fn failed(data: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            data,
            status: Some(EngineStatus {
                code,
                message: message.into(),
            }),
        }
    }

    /// Turn an engine-reported failure into an error.
    pub fn into_checked(self) -> Result<Self> {
        match self.status {
            Some(EngineStatus { code, message }) if code != 0 => {
                Err(Error::QueryFailed { code, message })
            }
            _ => Ok(self),
        }
    }
}

/// Encode `sql` as a single request line, delimiter included.
pub fn encode_query(sql: &str) -> Result<Vec<u8>> {
    encode_line(&Query::new(sql))
}

pub fn encode_result(result: &QueryResult) -> Result<Vec<u8>> {
    encode_line(result)
}

fn encode_line<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(value).map_err(Error::Encode)?;
    line.push(LINE_DELIMITER);
    Ok(line)
}

/// Strip the line terminator a terminal line discipline leaves behind (`\n` or `\r\n`).
pub fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

pub fn is_result_line(line: &[u8]) -> bool {
    trim_line(line).starts_with(RESULT_MARKER)
}

pub fn decode_result(line: &[u8]) -> Result<QueryResult> {
    serde_json::from_slice(trim_line(line)).map_err(Error::Decode)
}

pub fn decode_query(line: &[u8]) -> Result<Query> {
    serde_json::from_slice(trim_line(line)).map_err(Error::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_query_is_single_line() {
        let line = encode_query("select 1").unwrap();
        assert_eq!(line, b"{\"query\":\"select 1\"}\n");
    }

    #[test]
    fn test_encode_query_escapes_newlines() {
        let line = encode_query("select\n1").unwrap();
        assert_eq!(line.iter().filter(|b| **b == LINE_DELIMITER).count(), 1);
        assert_eq!(line.last(), Some(&LINE_DELIMITER));
    }

    #[test]
    fn test_is_result_line() {
        assert!(is_result_line(b"{\"data\":[]}\r\n"));
        assert!(is_result_line(b"{\"data\":null}"));
        assert!(!is_result_line(b"{\"query\":\"select 1\"}\r\n"));
        assert!(!is_result_line(b"prompt> "));
        assert!(!is_result_line(b" {\"data\":[]}"));
        assert!(!is_result_line(b""));
    }

    #[test]
    fn test_decode_result_keeps_payload_opaque() {
        let result = decode_result(b"{\"data\":[{\"1\":\"1\"}]}\r\n").unwrap();
        assert_eq!(result.data, json!([{"1": "1"}]));
        assert_eq!(result.status, None);

        let result = decode_result(b"{\"data\":42}").unwrap();
        assert_eq!(result.data, json!(42));

        let result = decode_result(b"{\"data\":null}\n").unwrap();
        assert_eq!(result.data, Value::Null);
    }

    #[test]
    fn test_decode_result_string_payload_resembling_marker() {
        // The payload itself looks like a result line once rendered.
        let line = encode_result(&QueryResult::new(json!("{\"data\":1}"))).unwrap();
        assert!(is_result_line(&line));
        let result = decode_result(&line).unwrap();
        assert_eq!(result.data, json!("{\"data\":1}"));
    }

    #[test]
    fn test_decode_result_rejects_garbage_after_marker() {
        let err = decode_result(b"{\"data\":[{\"1\":").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_encode_failure_is_not_a_decode_error() {
        // JSON object keys must be strings.
        let mut unencodable = std::collections::BTreeMap::new();
        unencodable.insert(vec![1u8], 1u8);

        let err = encode_line(&unencodable).unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
        assert!(err.to_string().starts_with("failed to encode line"));
    }

    #[test]
    fn test_encode_result_omits_missing_status() {
        let line = encode_result(&QueryResult::new(json!([]))).unwrap();
        assert_eq!(line, b"{\"data\":[]}\n");
    }

    #[test]
    fn test_encode_result_with_status_keeps_marker() {
        let line = encode_result(&QueryResult::failed(json!([]), 1, "no such table")).unwrap();
        assert!(line.starts_with(RESULT_MARKER));
    }

    #[test]
    fn test_into_checked() {
        assert!(QueryResult::new(json!([])).into_checked().is_ok());
        assert!(QueryResult::failed(json!([]), 0, "OK").into_checked().is_ok());

        let err = QueryResult::failed(json!([]), 1, "no such table")
            .into_checked()
            .unwrap_err();
        assert!(matches!(err, Error::QueryFailed { code: 1, .. }));
    }

    #[test]
    fn test_decode_query() {
        let query = decode_query(b"{\"query\":\"exit\"}\r\n").unwrap();
        assert!(query.is_exit());
        assert!(decode_query(b"select 1").is_err());
    }
}
