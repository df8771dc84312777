use serde::Serialize;
use serde_json::Value;

/// Status marker sent after every final result
pub const STATUS_COMPLETED: &str = "completed";

/// JSON envelopes sent to the client.
///
/// Upstream result frames are forwarded untouched as `Transcript`; the
/// other variants are synthesized by the relay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientMessage {
    Status { status: String, message: String },
    Completed { status: String, text: String },
    Warning { warning: String },
    Error { error: String },
    Transcript(Value),
}

impl ClientMessage {
    pub fn connected() -> Self {
        Self::Status {
            status: "connected".to_string(),
            message: "test connection established".to_string(),
        }
    }

    pub fn echo(text: &str) -> Self {
        Self::Status {
            status: "echo".to_string(),
            message: format!("echo: {}", text),
        }
    }

    pub fn processing() -> Self {
        Self::Status {
            status: "processing".to_string(),
            message: "processing audio file".to_string(),
        }
    }

    pub fn completed(text: impl Into<String>) -> Self {
        Self::Completed {
            status: STATUS_COMPLETED.to_string(),
            text: text.into(),
        }
    }

    pub fn warning(warning: impl Into<String>) -> Self {
        Self::Warning {
            warning: warning.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
