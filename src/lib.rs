pub mod audio;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod relay;
pub mod upstream;

pub use audio::{AudioArtifact, AudioNormalizer, ChunkSource, Decoder, FfmpegDecoder, Pacing};
pub use auth::{Authenticator, Credential, HttpAuthenticator, TokenCache};
pub use config::Config;
pub use error::RelayError;
pub use http::{create_router, AppState};
pub use relay::{ClientChannel, ClientMessage, ConnectionManager, Relay};
pub use upstream::{SessionSettings, SessionState, StreamConfig, TranscriptEvent, TranscriptionSession};
