use super::config::StreamConfig;
use super::messages::{TranscriptEvent, EOS_MARKER};
use crate::audio::{ChunkSource, Pacing};
use crate::auth::{Credential, TokenCache};
use crate::error::{RelayError, Result};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

/// Events buffered between the receive loop and the consumer
const EVENT_BUFFER: usize = 64;

/// Lifecycle of one upstream recognition session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Streaming,
    Draining,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

/// Everything a session needs besides the audio and the credential
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub api_base: String,
    pub stream: StreamConfig,
    pub chunk_size: usize,
    pub pacing: Pacing,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Bound on each outbound frame; an upstream that stops reading fails the session
    pub write_timeout: Duration,
}

#[derive(Debug, Clone)]
struct StateCell(Arc<Mutex<SessionState>>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(SessionState::Connecting)))
    }

    fn get(&self) -> SessionState {
        match self.0.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Move to `next` unless the session already ended.
    fn advance(&self, next: SessionState) {
        let mut guard = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_terminal() {
            return;
        }
        debug!("Session state {:?} -> {:?}", *guard, next);
        *guard = next;
    }
}

/// One upstream streaming recognition session.
///
/// `start` spawns a single driver task that authenticates, opens the socket,
/// and then runs the send pump and the receive loop concurrently on it.
/// Events come out of `next_event` in upstream order; the stream ends after
/// the terminal event. Dropping the session aborts the driver.
pub struct TranscriptionSession {
    events: mpsc::Receiver<TranscriptEvent>,
    state: StateCell,
    driver: Option<JoinHandle<()>>,
}

impl TranscriptionSession {
    pub fn start(settings: SessionSettings, tokens: Arc<TokenCache>, source: ChunkSource) -> Self {
        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let state = StateCell::new();

        let driver = tokio::spawn(drive(settings, tokens, source, state.clone(), tx));

        Self {
            events,
            state,
            driver: Some(driver),
        }
    }

    /// Next event in upstream order, or `None` once the session has ended.
    pub async fn next_event(&mut self) -> Option<TranscriptEvent> {
        self.events.recv().await
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Wait for the driver to finish after the event stream has ended.
    pub async fn join(mut self) {
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                if e.is_panic() {
                    error!("Transcription session task panicked: {}", e);
                }
            }
        }
    }

    /// Cancel both activities and wait until their resources are released.
    pub async fn shutdown(mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
            let _ = driver.await;
        }
        self.state.advance(SessionState::Failed);
        info!("Transcription session cancelled");
    }
}

impl Drop for TranscriptionSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

async fn drive(
    settings: SessionSettings,
    tokens: Arc<TokenCache>,
    source: ChunkSource,
    state: StateCell,
    events: mpsc::Sender<TranscriptEvent>,
) {
    match run(&settings, &tokens, source, &state, &events).await {
        Ok(()) => {
            state.advance(SessionState::Closed);
            info!("Transcription session closed");
        }
        Err(RelayError::Disconnected) => {
            state.advance(SessionState::Failed);
            debug!("Event consumer went away, session abandoned");
        }
        Err(e) => {
            state.advance(SessionState::Failed);
            warn!("Transcription session failed: {}", e);
            let _ = events
                .send(TranscriptEvent::Error {
                    reason: e.to_string(),
                })
                .await;
        }
    }
}

async fn run(
    settings: &SessionSettings,
    tokens: &TokenCache,
    source: ChunkSource,
    state: &StateCell,
    events: &mpsc::Sender<TranscriptEvent>,
) -> Result<()> {
    let credential = tokens.get().await?;
    let url = settings.stream.streaming_url(&settings.api_base)?;
    let request = build_request(&url, &credential)?;

    info!("Connecting to upstream {}", url);
    let connect_secs = settings.connect_timeout.as_secs();
    let (socket, _response) =
        tokio::time::timeout(settings.connect_timeout, tokio_tungstenite::connect_async(request))
            .await
            .map_err(|_| RelayError::timeout("upstream handshake", connect_secs))?
            .map_err(|e| RelayError::connect(e.to_string()))?;

    state.advance(SessionState::Streaming);
    info!("Upstream socket open, streaming {}", source.path().display());

    let (sink, stream) = socket.split();
    let pump = send_pump(sink, source, settings.chunk_size, settings.write_timeout, state);
    let receive = receive_loop(stream, settings.read_timeout, state, events);
    tokio::pin!(pump, receive);

    // Results may arrive mid-upload, so both sides run from the start.
    tokio::select! {
        outcome = &mut receive => outcome,
        pumped = &mut pump => {
            let mut sink = pumped?;
            let outcome = receive.await;
            match tokio::time::timeout(settings.write_timeout, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Closing upstream socket: {}", e),
                Err(_) => debug!("Upstream did not accept the close frame in time"),
            }
            outcome
        }
    }
}

fn build_request(url: &str, credential: &Credential) -> Result<Request> {
    let mut request = url
        .into_client_request()
        .map_err(|e| RelayError::connect(format!("invalid upstream URL {}: {}", url, e)))?;

    let value = HeaderValue::from_str(&credential.bearer())
        .map_err(|_| RelayError::auth("access token is not a valid header value"))?;
    request.headers_mut().insert(AUTHORIZATION, value);

    Ok(request)
}

/// Drain the chunk source into binary frames, then send the EOS marker.
///
/// Returns the sink so the caller can close the socket once receiving is done.
async fn send_pump<S>(
    mut sink: S,
    mut source: ChunkSource,
    chunk_size: usize,
    write_timeout: Duration,
    state: &StateCell,
) -> Result<S>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let mut frames = 0usize;

    loop {
        let chunk = source.read(chunk_size).await?;
        if chunk.is_end {
            break;
        }
        send_frame(&mut sink, Message::Binary(chunk.data), write_timeout).await?;
        frames += 1;
    }

    // Draining before the marker goes out, so a reply to EOS is never
    // mistaken for a mid-upload result.
    state.advance(SessionState::Draining);
    send_frame(&mut sink, Message::Text(EOS_MARKER.to_string()), write_timeout).await?;

    info!(
        "Upload complete: {} frames, {} bytes, EOS sent",
        frames,
        source.bytes_read()
    );

    if let Err(e) = source.close() {
        warn!("Failed to release streamed audio: {}", e);
    }

    Ok(sink)
}

async fn send_frame<S>(sink: &mut S, message: Message, write_timeout: Duration) -> Result<()>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    tokio::time::timeout(write_timeout, sink.send(message))
        .await
        .map_err(|_| RelayError::timeout("upstream send", write_timeout.as_secs()))?
        .map_err(|e| RelayError::connect(format!("upstream send failed: {}", e)))
}

/// Decode inbound frames and forward them in order until the session ends.
async fn receive_loop<S>(
    mut stream: S,
    read_timeout: Duration,
    state: &StateCell,
    events: &mpsc::Sender<TranscriptEvent>,
) -> Result<()>
where
    S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let next = match tokio::time::timeout(read_timeout, stream.next()).await {
            Ok(next) => next,
            // Silence is fine while audio is still going up.
            Err(_) if state.get() == SessionState::Streaming => continue,
            Err(_) => {
                return Err(RelayError::timeout(
                    "upstream read",
                    read_timeout.as_secs(),
                ))
            }
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                return Err(RelayError::connect(format!("upstream socket error: {}", e)))
            }
            None => return closed_by_upstream(state),
        };

        match message {
            Message::Text(frame) => {
                let event = TranscriptEvent::parse(&frame)?;
                if let TranscriptEvent::Error { reason } = event {
                    return Err(RelayError::protocol(format!("upstream reported error: {}", reason)));
                }

                let is_final = event.is_final();
                if is_final {
                    info!("Final result: {}", event.text().unwrap_or_default());
                } else {
                    debug!("Partial result: {}", event.text().unwrap_or_default());
                }

                events
                    .send(event)
                    .await
                    .map_err(|_| RelayError::Disconnected)?;

                if is_final && state.get() == SessionState::Draining {
                    return Ok(());
                }
            }
            Message::Close(frame) => {
                debug!("Upstream close frame: {:?}", frame);
                return closed_by_upstream(state);
            }
            Message::Binary(data) => {
                return Err(RelayError::protocol(format!(
                    "unexpected binary frame ({} bytes)",
                    data.len()
                )));
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        }
    }
}

fn closed_by_upstream(state: &StateCell) -> Result<()> {
    if state.get() == SessionState::Draining {
        info!("Upstream closed the socket after end of stream");
        Ok(())
    } else {
        Err(RelayError::protocol("upstream closed before end of stream"))
    }
}
