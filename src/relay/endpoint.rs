use super::channel::ClientChannel;
use super::manager::{ConnectionManager, ConnectionMode, UploadClaim};
use super::messages::ClientMessage;
use crate::audio::{AudioArtifact, AudioNormalizer, ChunkSource, FfmpegDecoder};
use crate::auth::{HttpAuthenticator, TokenCache};
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::upstream::{SessionSettings, TranscriptEvent, TranscriptionSession};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Client id that selects the echo health-check mode
pub const ECHO_CLIENT_ID: &str = "test";

/// Per-connection orchestration: source → normalizer → session → client.
///
/// Shared across connections; only the token cache holds mutable state.
pub struct Relay {
    tokens: Arc<TokenCache>,
    normalizer: Arc<AudioNormalizer>,
    settings: SessionSettings,
    upload_dir: PathBuf,
    connections: ConnectionManager,
}

impl Relay {
    pub fn new(
        tokens: Arc<TokenCache>,
        normalizer: Arc<AudioNormalizer>,
        settings: SessionSettings,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tokens,
            normalizer,
            settings,
            upload_dir: upload_dir.into(),
            connections: ConnectionManager::new(),
        }
    }

    /// Wire the production collaborators: HTTP authentication and ffmpeg.
    pub fn from_config(config: &Config) -> Result<Self> {
        let authenticator = HttpAuthenticator::new(
            &config.upstream.api_base,
            config.upstream.client_id.clone(),
            config.upstream.client_secret.clone(),
            config.upstream.auth_timeout(),
        )?;
        let tokens = Arc::new(TokenCache::new(Arc::new(authenticator)));
        let decoder = Arc::new(FfmpegDecoder::new(config.audio.decoder.clone()));
        let normalizer = Arc::new(AudioNormalizer::new(decoder, config.audio.work_dir.clone()));

        Ok(Self::new(
            tokens,
            normalizer,
            config.session_settings(),
            config.audio.upload_dir.clone(),
        ))
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Serve one client connection until it completes, fails, or disconnects.
    ///
    /// Every artifact created here is released before this returns.
    pub async fn handle<C: ClientChannel>(&self, client_id: &str, mut channel: C) {
        let mode = if client_id == ECHO_CLIENT_ID {
            ConnectionMode::Echo
        } else {
            ConnectionMode::Transcribe
        };
        let connection = self.connections.connect(client_id, mode).await;
        info!("Client {} connected ({:?})", client_id, mode);

        match mode {
            ConnectionMode::Echo => echo(&mut channel).await,
            ConnectionMode::Transcribe => match self.transcribe(&mut channel).await {
                Ok(()) => info!("Transcription finished for client {}", client_id),
                Err(RelayError::Disconnected) => {
                    info!("Client {} disconnected, cleaning up", client_id)
                }
                Err(e) => {
                    error!("Transcription failed for client {}: {}", client_id, e);
                    if e.is_surfaced() {
                        let _ = channel.send_message(&ClientMessage::error(e.to_string())).await;
                    }
                }
            },
        }

        channel.shutdown().await;
        self.connections.disconnect(connection.id).await;
    }

    async fn transcribe<C: ClientChannel>(&self, channel: &mut C) -> Result<()> {
        let reference = channel.recv_text().await.ok_or(RelayError::Disconnected)?;
        let source_path = PathBuf::from(reference.trim());
        info!("Audio source: {}", source_path.display());

        if !tokio::fs::try_exists(&source_path).await.unwrap_or(false) {
            return Err(RelayError::SourceNotFound { path: source_path });
        }
        let claim = self.claim_upload(&source_path).await;

        channel.send_message(&ClientMessage::processing()).await?;

        let sample_rate = self.settings.stream.sample_rate;
        let normalized = until_disconnect(
            channel,
            self.normalizer.normalize(&source_path, sample_rate),
        )
        .await?;
        let stream_artifact = match normalized {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("Conversion failed, streaming original file: {}", e);
                channel
                    .send_message(&ClientMessage::warning(format!(
                        "{}; continuing with the original file",
                        e
                    )))
                    .await?;
                AudioArtifact::borrowed(&source_path)
            }
        };

        let chunks = ChunkSource::open(stream_artifact, self.settings.pacing).await?;
        let mut session =
            TranscriptionSession::start(self.settings.clone(), Arc::clone(&self.tokens), chunks);

        loop {
            tokio::select! {
                event = session.next_event() => {
                    let Some(event) = event else { break };
                    if let Err(e) = forward(channel, event).await {
                        session.shutdown().await;
                        return Err(e);
                    }
                }
                incoming = channel.recv_text() => match incoming {
                    Some(text) => debug!("Ignoring client message during streaming: {}", text),
                    None => {
                        session.shutdown().await;
                        return Err(RelayError::Disconnected);
                    }
                },
            }
        }

        let state = session.state();
        session.join().await;
        debug!("Session ended in state {:?}", state);

        if let Some(claim) = claim {
            if let Err(e) = claim.release() {
                warn!("Failed to delete uploaded source: {}", e);
            }
        }

        Ok(())
    }

    /// Sources inside the upload directory were written by this service, so
    /// the connections streaming them share responsibility for deleting them.
    /// Anything else is only borrowed.
    async fn claim_upload(&self, path: &Path) -> Option<UploadClaim> {
        let source = tokio::fs::canonicalize(path).await.ok()?;
        let uploads = tokio::fs::canonicalize(&self.upload_dir).await.ok()?;
        if !source.starts_with(&uploads) {
            return None;
        }

        debug!("Connection claims upload {}", source.display());
        Some(self.connections.claim_upload(source))
    }
}

async fn echo<C: ClientChannel>(channel: &mut C) {
    if channel.send_message(&ClientMessage::connected()).await.is_err() {
        return;
    }

    while let Some(text) = channel.recv_text().await {
        info!("Echo client message: {}", text);
        if channel.send_message(&ClientMessage::echo(&text)).await.is_err() {
            break;
        }
    }

    info!("Echo connection closed");
}

async fn forward<C: ClientChannel>(channel: &mut C, event: TranscriptEvent) -> Result<()> {
    match event {
        TranscriptEvent::Partial { metadata, .. } => {
            channel
                .send_message(&ClientMessage::Transcript(metadata))
                .await
        }
        TranscriptEvent::Final { text, metadata } => {
            channel
                .send_message(&ClientMessage::Transcript(metadata))
                .await?;
            channel.send_message(&ClientMessage::completed(text)).await
        }
        TranscriptEvent::Error { reason } => {
            channel.send_message(&ClientMessage::error(reason)).await
        }
    }
}

/// Drive `work` to completion unless the client goes away first.
async fn until_disconnect<C, F>(channel: &mut C, work: F) -> Result<F::Output>
where
    C: ClientChannel,
    F: Future,
{
    tokio::pin!(work);
    loop {
        tokio::select! {
            output = &mut work => return Ok(output),
            incoming = channel.recv_text() => match incoming {
                Some(text) => debug!("Ignoring client message during conversion: {}", text),
                None => return Err(RelayError::Disconnected),
            },
        }
    }
}
