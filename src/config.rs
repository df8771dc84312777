use crate::audio::Pacing;
use crate::upstream::{SessionSettings, StreamConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment prefix for layered overrides, e.g. `RELAY__SERVICE__HTTP__PORT`.
pub const ENV_PREFIX: &str = "RELAY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub upstream: UpstreamConfig,
    pub stream: StreamConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the recognition service; the streaming socket URL is derived from it.
    pub api_base: String,
    pub client_id: String,
    pub client_secret: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub auth_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// External decoder executable (ffmpeg-compatible command line)
    pub decoder: String,
    /// Where normalized WAV files are written
    pub work_dir: PathBuf,
    /// Where uploads land; files here are owned by the connection that streams them
    pub upload_dir: PathBuf,
    /// Bytes requested per chunk read
    pub chunk_size: usize,
    /// Sleep between reads so uploads match real-time capture speed
    pub realtime_pacing: bool,
    pub max_upload_mb: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "vito-relay".to_string(),
            http: HttpConfig {
                bind: "0.0.0.0".to_string(),
                port: 8000,
            },
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: "https://openapi.vito.ai".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            auth_timeout_secs: 10,
            write_timeout_secs: 10,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        let temp = std::env::temp_dir();
        Self {
            decoder: "ffmpeg".to_string(),
            upload_dir: temp.join("vito-relay-uploads"),
            work_dir: temp,
            chunk_size: 8192,
            realtime_pacing: true,
            max_upload_mb: 100,
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl AudioConfig {
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb * 1024 * 1024) as usize
    }
}

impl Config {
    /// Layer defaults, an optional config file, `RELAY__*` environment
    /// variables and the legacy `VITO_CLIENT_ID`/`VITO_CLIENT_SECRET` pair.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Config::try_from(&Config::default())
                    .context("Failed to build default configuration")?,
            )
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("upstream.client_id", std::env::var("VITO_CLIENT_ID").ok())?
            .set_override_option(
                "upstream.client_secret",
                std::env::var("VITO_CLIENT_SECRET").ok(),
            )?
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        let cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.validate()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.http.port == 0 {
            anyhow::bail!("service.http.port must be non-zero");
        }
        if self.upstream.api_base.trim().is_empty() {
            anyhow::bail!("upstream.api_base is not set");
        }
        if self.upstream.connect_timeout_secs == 0
            || self.upstream.read_timeout_secs == 0
            || self.upstream.auth_timeout_secs == 0
            || self.upstream.write_timeout_secs == 0
        {
            anyhow::bail!("upstream timeouts must be at least one second");
        }
        if self.stream.sample_rate == 0 {
            anyhow::bail!("stream.sample_rate must be non-zero");
        }
        if self.audio.chunk_size == 0 {
            anyhow::bail!("audio.chunk_size must be non-zero");
        }
        if self.audio.decoder.trim().is_empty() {
            anyhow::bail!("audio.decoder is not set");
        }

        Ok(())
    }

    /// Per-session settings derived from the upstream, stream and audio sections.
    pub fn session_settings(&self) -> SessionSettings {
        let pacing = if self.audio.realtime_pacing {
            Pacing::RealTime {
                sample_rate: self.stream.sample_rate,
            }
        } else {
            Pacing::Unpaced
        };

        SessionSettings {
            api_base: self.upstream.api_base.clone(),
            stream: self.stream.clone(),
            chunk_size: self.audio.chunk_size,
            pacing,
            connect_timeout: self.upstream.connect_timeout(),
            read_timeout: self.upstream.read_timeout(),
            write_timeout: self.upstream.write_timeout(),
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.service.http.bind, self.service.http.port)
    }
}
