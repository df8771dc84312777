//! Client-facing relay
//!
//! - `Relay`: per-connection orchestration and artifact cleanup
//! - `ClientChannel`: the duplex channel abstraction (websocket in production)
//! - `ConnectionManager`: registry of live connections
//! - `ClientMessage`: JSON envelopes sent to clients

mod channel;
mod endpoint;
mod manager;
mod messages;

pub use channel::ClientChannel;
pub use endpoint::{Relay, ECHO_CLIENT_ID};
pub use manager::{ConnectionInfo, ConnectionManager, ConnectionMode, UploadClaim};
pub use messages::{ClientMessage, STATUS_COMPLETED};
