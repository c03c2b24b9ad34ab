use serde::{Deserialize, Serialize};

/// Frame sent by a client over the socket
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundFrame {
    pub content: String,
}

/// Codes carried by [`ErrorFrame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MessageNotPersisted,
    MessageTooLong,
    BacklogFull,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// `{"error": {"code": .., "message": ..}}`, sent only to the client whose
/// frame could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: ErrorBody,
}

impl ErrorFrame {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn to_json(&self) -> String {
        // A struct of strings and unit variants cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}
