use std::collections::BTreeMap;

/// One result row: column name to rendered value.
pub type Row = BTreeMap<String, String>;

/// Status block osquery attaches to every reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionStatus {
    pub code: Option<i32>,
    pub message: Option<String>,
    pub uuid: Option<i64>,
}

impl ExtensionStatus {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: Some(message.into()),
            uuid: None,
        }
    }

    /// A missing code counts as success.
    pub fn is_ok(&self) -> bool {
        self.code.unwrap_or(0) == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionResponse {
    pub status: Option<ExtensionStatus>,
    pub response: Option<Vec<Row>>,
}

impl ExtensionResponse {
    pub fn new(status: ExtensionStatus, response: Vec<Row>) -> Self {
        Self {
            status: Some(status),
            response: Some(response),
        }
    }

    pub fn rows(&self) -> &[Row] {
        self.response.as_deref().unwrap_or_default()
    }
}
