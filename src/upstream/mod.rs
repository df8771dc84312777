//! Upstream streaming recognition
//!
//! - `StreamConfig`: recognition parameters and socket URL
//! - `TranscriptEvent`: typed decoding of inbound result frames
//! - `TranscriptionSession`: send pump + receive loop over one socket

mod config;
mod messages;
mod session;

pub use config::{StreamConfig, STREAMING_PATH};
pub use messages::{TranscriptEvent, EOS_MARKER};
pub use session::{SessionSettings, SessionState, TranscriptionSession};
