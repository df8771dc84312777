// Shared fixtures for the integration tests: WAV files, fake collaborators,
// an in-process upstream recognition server and an in-memory client channel.

#![allow(dead_code)]

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use vito_relay::audio::{AudioNormalizer, Decoder, Pacing, WavFormat};
use vito_relay::auth::{Authenticator, Credential, TokenCache};
use vito_relay::error::{RelayError, Result};
use vito_relay::relay::{ClientChannel, ClientMessage, Relay};
use vito_relay::upstream::{SessionSettings, StreamConfig};

// ============================================================================
// Audio fixtures
// ============================================================================

/// Write a 16-bit WAV tone of `seconds` length.
pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f64) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (sample_rate as f64 * seconds) as usize;
    for i in 0..frames {
        let sample = ((i % 64) as i16 - 32) * 256;
        for _ in 0..channels {
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

// ============================================================================
// Fake collaborators
// ============================================================================

/// Issues `token-N` credentials valid for `ttl`
pub struct StaticAuthenticator {
    pub calls: AtomicUsize,
    pub ttl: chrono::Duration,
    pub delay: Duration,
}

impl StaticAuthenticator {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            ttl,
            delay: Duration::ZERO,
        }
    }

    pub fn long_lived() -> Self {
        Self::new(chrono::Duration::hours(6))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self) -> Result<Credential> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Credential::new(format!("token-{}", n), Utc::now() + self.ttl))
    }
}

pub struct FailingAuthenticator;

#[async_trait::async_trait]
impl Authenticator for FailingAuthenticator {
    async fn authenticate(&self) -> Result<Credential> {
        Err(RelayError::auth("invalid client secret"))
    }
}

/// Writes a mono LINEAR16 WAV of the input's duration (1s for non-WAV input)
#[derive(Default)]
pub struct WavDecoder {
    pub calls: AtomicUsize,
}

impl WavDecoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Decoder for WavDecoder {
    async fn decode(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let seconds = WavFormat::probe(input)
            .map(|format| format.duration_seconds)
            .unwrap_or(1.0);
        write_wav(output, sample_rate, 1, seconds);
        Ok(())
    }

    fn name(&self) -> &str {
        "wav-decoder"
    }
}

/// Leaves a partial output file behind and then fails
#[derive(Default)]
pub struct FailingDecoder {
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Decoder for FailingDecoder {
    async fn decode(&self, _input: &Path, output: &Path, _sample_rate: u32) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(output, b"partial").unwrap();
        Err(RelayError::conversion("decoder exited with status 1"))
    }

    fn name(&self) -> &str {
        "failing-decoder"
    }
}

/// Fails after the input disappeared from under it
pub struct VanishingInputDecoder;

#[async_trait::async_trait]
impl Decoder for VanishingInputDecoder {
    async fn decode(&self, input: &Path, _output: &Path, _sample_rate: u32) -> Result<()> {
        std::fs::remove_file(input).unwrap();
        Err(RelayError::conversion("input vanished"))
    }

    fn name(&self) -> &str {
        "vanishing-input-decoder"
    }
}

/// Produces output in the wrong format
pub struct StereoDecoder;

#[async_trait::async_trait]
impl Decoder for StereoDecoder {
    async fn decode(&self, _input: &Path, output: &Path, _sample_rate: u32) -> Result<()> {
        write_wav(output, 16000, 2, 0.5);
        Ok(())
    }

    fn name(&self) -> &str {
        "stereo-decoder"
    }
}

// ============================================================================
// Mock upstream recognition server
// ============================================================================

pub fn final_frame(text: &str) -> String {
    format!(r#"{{"final":true,"alternatives":[{{"text":"{}"}}]}}"#, text)
}

pub fn partial_frame(seq: u32, text: &str) -> String {
    format!(
        r#"{{"seq":{},"final":false,"alternatives":[{{"text":"{}"}}]}}"#,
        seq, text
    )
}

/// What the mock upstream does with a connection
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    /// Sent right after the first audio frame arrives
    pub before_eos: Vec<String>,
    /// Sent after the EOS marker, followed by a close
    pub after_eos: Vec<String>,
    /// Never answer after EOS, keep the socket open
    pub hang_after_eos: bool,
    /// Close the socket as soon as the first audio frame arrives
    pub close_on_first_chunk: bool,
}

impl MockScript {
    pub fn final_after_eos(text: &str) -> Self {
        Self {
            after_eos: vec![final_frame(text)],
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub connections: usize,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub binary_frames: usize,
    pub binary_bytes: usize,
    pub eos_received: bool,
    pub client_closed: bool,
}

pub struct MockUpstream {
    pub addr: std::net::SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockUpstream {
    pub async fn start(script: MockScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        let shared = Arc::clone(&recorded);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let script = script.clone();
                let recorded = Arc::clone(&shared);
                tokio::spawn(async move {
                    let _ = serve_connection(stream, script, recorded).await;
                });
            }
        });

        Self { addr, recorded }
    }

    pub fn api_base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn recorded(&self) -> Recorded {
        self.recorded.lock().unwrap().clone()
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    script: MockScript,
    recorded: Arc<Mutex<Recorded>>,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handshake = Arc::clone(&recorded);
    let ws = tokio_tungstenite::accept_hdr_async(stream, move |req: &Request, resp: Response| {
        let mut rec = handshake.lock().unwrap();
        rec.connections += 1;
        rec.path = req.uri().path().to_string();
        rec.query = req.uri().query().map(str::to_string);
        rec.authorization = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(resp)
    })
    .await?;

    let (mut tx, mut rx) = ws.split();
    let mut answered_first_chunk = false;

    while let Some(message) = rx.next().await {
        match message? {
            Message::Binary(data) => {
                {
                    let mut rec = recorded.lock().unwrap();
                    rec.binary_frames += 1;
                    rec.binary_bytes += data.len();
                }
                if !answered_first_chunk {
                    answered_first_chunk = true;
                    if script.close_on_first_chunk {
                        tx.close().await?;
                        return Ok(());
                    }
                    for frame in &script.before_eos {
                        tx.send(Message::Text(frame.clone())).await?;
                    }
                }
            }
            Message::Text(text) if text == "EOS" => {
                recorded.lock().unwrap().eos_received = true;
                if script.hang_after_eos {
                    // Keep reading so a client close is still observed.
                    continue;
                }
                for frame in &script.after_eos {
                    tx.send(Message::Text(frame.clone())).await?;
                }
                tx.close().await?;
                return Ok(());
            }
            Message::Close(_) => {
                recorded.lock().unwrap().client_closed = true;
                return Ok(());
            }
            _ => {}
        }
    }

    recorded.lock().unwrap().client_closed = true;
    Ok(())
}

/// An address with nothing listening on it
pub async fn closed_port_base() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

// ============================================================================
// In-memory client channel
// ============================================================================

pub struct MockClient {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
}

/// The test's end of a `MockClient`
pub struct ClientHandle {
    /// Dropping this disconnects the client
    pub to_relay: Option<mpsc::UnboundedSender<String>>,
    pub from_relay: mpsc::UnboundedReceiver<String>,
}

impl ClientHandle {
    pub fn send(&self, text: &str) {
        self.to_relay
            .as_ref()
            .expect("client already disconnected")
            .send(text.to_string())
            .unwrap();
    }

    pub fn disconnect(&mut self) {
        self.to_relay.take();
    }

    pub async fn next_json(&mut self) -> Option<serde_json::Value> {
        let text = tokio::time::timeout(Duration::from_secs(10), self.from_relay.recv())
            .await
            .expect("timed out waiting for relay message")?;
        Some(serde_json::from_str(&text).unwrap())
    }

    /// Everything the relay sent until it dropped its side of the channel.
    pub async fn drain(&mut self) -> Vec<serde_json::Value> {
        let mut messages = Vec::new();
        while let Some(message) = self.next_json().await {
            messages.push(message);
        }
        messages
    }
}

pub fn mock_client() -> (MockClient, ClientHandle) {
    let (to_relay, incoming) = mpsc::unbounded_channel();
    let (outgoing, from_relay) = mpsc::unbounded_channel();
    (
        MockClient { incoming, outgoing },
        ClientHandle {
            to_relay: Some(to_relay),
            from_relay,
        },
    )
}

#[async_trait::async_trait]
impl ClientChannel for MockClient {
    async fn recv_text(&mut self) -> Option<String> {
        self.incoming.recv().await
    }

    async fn send_message(&mut self, message: &ClientMessage) -> Result<()> {
        self.outgoing
            .send(message.to_text())
            .map_err(|_| RelayError::Disconnected)
    }

    async fn shutdown(&mut self) {}
}

// ============================================================================
// Relay wiring
// ============================================================================

pub fn session_settings(api_base: &str) -> SessionSettings {
    SessionSettings {
        api_base: api_base.to_string(),
        stream: StreamConfig::default(),
        chunk_size: 8192,
        pacing: Pacing::Unpaced,
        connect_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(2),
        write_timeout: Duration::from_secs(2),
    }
}

/// Scratch directories for one relay test
pub struct Workspace {
    pub root: tempfile::TempDir,
    pub uploads: PathBuf,
    pub work: PathBuf,
    pub elsewhere: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::TempDir::new().unwrap();
        let uploads = root.path().join("uploads");
        let work = root.path().join("work");
        let elsewhere = root.path().join("elsewhere");
        for dir in [&uploads, &work, &elsewhere] {
            std::fs::create_dir_all(dir).unwrap();
        }
        Self {
            root,
            uploads,
            work,
            elsewhere,
        }
    }
}

pub fn build_relay(
    workspace: &Workspace,
    settings: SessionSettings,
    authenticator: Arc<dyn Authenticator>,
    decoder: Arc<dyn Decoder>,
) -> Relay {
    let tokens = Arc::new(TokenCache::new(authenticator));
    let normalizer = Arc::new(AudioNormalizer::new(decoder, workspace.work.clone()));
    Relay::new(tokens, normalizer, settings, workspace.uploads.clone())
}
