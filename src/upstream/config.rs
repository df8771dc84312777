use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};

/// Path of the streaming recognition socket relative to the API host
pub const STREAMING_PATH: &str = "/v1/transcribe:streaming";

/// Recognition parameters sent as query parameters when the socket opens.
///
/// Fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub sample_rate: u32,
    pub encoding: String,
    pub use_itn: bool,
    pub use_disfluency_filter: bool,
    pub use_profanity_filter: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            encoding: "LINEAR16".to_string(),
            use_itn: true,
            use_disfluency_filter: false,
            use_profanity_filter: false,
        }
    }
}

impl StreamConfig {
    /// `key=value` pairs joined by `&`, in a stable order.
    pub fn to_query(&self) -> String {
        [
            ("sample_rate", self.sample_rate.to_string()),
            ("encoding", self.encoding.clone()),
            ("use_itn", self.use_itn.to_string()),
            ("use_disfluency_filter", self.use_disfluency_filter.to_string()),
            ("use_profanity_filter", self.use_profanity_filter.to_string()),
        ]
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
    }

    /// Socket URL for `api_base`: `https` maps to `wss`, `http` to `ws`.
    pub fn streaming_url(&self, api_base: &str) -> Result<String> {
        let base = api_base.trim_end_matches('/');
        let (scheme, host) = base
            .split_once("://")
            .ok_or_else(|| RelayError::connect(format!("invalid upstream base URL: {}", api_base)))?;

        let ws_scheme = match scheme {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(RelayError::connect(format!(
                    "unsupported upstream scheme: {}",
                    other
                )))
            }
        };

        Ok(format!(
            "{}://{}{}?{}",
            ws_scheme,
            host,
            STREAMING_PATH,
            self.to_query()
        ))
    }
}
