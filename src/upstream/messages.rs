use crate::error::{RelayError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Literal text frame that ends the audio upload
pub const EOS_MARKER: &str = "EOS";

#[derive(Debug, Deserialize)]
struct Alternative {
    text: String,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(rename = "final")]
    is_final: bool,
    alternatives: Vec<Alternative>,
}

/// A recognition event, decoded from one upstream frame
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    /// Interim hypothesis; `metadata` is the upstream frame as received
    Partial { text: String, metadata: Value },
    /// Settled transcript for one utterance segment
    Final { text: String, metadata: Value },
    /// Terminal failure, produced once per failed session
    Error { reason: String },
}

impl TranscriptEvent {
    /// Decode an upstream text frame.
    ///
    /// Frames carrying an `error` field become `Error`. Anything that is not
    /// `{final: bool, alternatives: [{text}, ...]}` is a protocol error, as is
    /// a final result with no alternatives.
    pub fn parse(frame: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(frame)
            .map_err(|e| RelayError::protocol(format!("upstream frame is not JSON: {}", e)))?;

        if let Some(error) = value.get("error") {
            let reason = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(TranscriptEvent::Error { reason });
        }

        let result = RecognitionResult::deserialize(&value)
            .map_err(|e| RelayError::protocol(format!("unrecognized upstream frame: {}", e)))?;

        let text = result.alternatives.into_iter().next().map(|alt| alt.text);

        if result.is_final {
            let text = text.ok_or_else(|| {
                RelayError::protocol("final result without alternatives")
            })?;
            Ok(TranscriptEvent::Final {
                text,
                metadata: value,
            })
        } else {
            Ok(TranscriptEvent::Partial {
                text: text.unwrap_or_default(),
                metadata: value,
            })
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, TranscriptEvent::Final { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TranscriptEvent::Error { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            TranscriptEvent::Partial { text, .. } | TranscriptEvent::Final { text, .. } => {
                Some(text)
            }
            TranscriptEvent::Error { .. } => None,
        }
    }
}
