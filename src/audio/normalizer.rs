use super::artifact::AudioArtifact;
use super::file::WavFormat;
use crate::error::{RelayError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{error, info, warn};

/// External decode capability: turn any audio file into mono 16-bit PCM WAV
#[async_trait::async_trait]
pub trait Decoder: Send + Sync {
    /// Decode `input` and write a WAV at `sample_rate` to `output`.
    async fn decode(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<()>;

    /// Decoder name for logging
    fn name(&self) -> &str;
}

/// Runs an ffmpeg-compatible executable as a subprocess
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    program: String,
}

impl FfmpegDecoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait::async_trait]
impl Decoder for FfmpegDecoder {
    async fn decode(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<()> {
        let result = Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-ar", &sample_rate.to_string()])
            .args(["-ac", "1"])
            .args(["-acodec", "pcm_s16le"])
            .args(["-f", "wav"])
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RelayError::conversion(format!("failed to run {}: {}", self.program, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let detail = stderr.lines().last().unwrap_or("").trim().to_string();
            error!("{} failed ({}): {}", self.program, result.status, detail);
            return Err(RelayError::conversion(format!(
                "{} exited with {}: {}",
                self.program, result.status, detail
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Adapts arbitrary input audio to the upstream wire format
pub struct AudioNormalizer {
    decoder: Arc<dyn Decoder>,
    work_dir: PathBuf,
}

impl AudioNormalizer {
    pub fn new(decoder: Arc<dyn Decoder>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            decoder,
            work_dir: work_dir.into(),
        }
    }

    /// Produce a mono LINEAR16 WAV at `target_sample_rate`.
    ///
    /// Conformant input comes back as a borrowed handle to the same path and
    /// the decoder is not invoked. Anything else is decoded into a fresh
    /// owned file under the work directory.
    pub async fn normalize(&self, input: &Path, target_sample_rate: u32) -> Result<AudioArtifact> {
        if let Ok(format) = WavFormat::probe(input) {
            if format.is_linear16_mono(target_sample_rate) {
                info!(
                    "{} already mono LINEAR16 at {}Hz, skipping conversion",
                    input.display(),
                    target_sample_rate
                );
                return Ok(AudioArtifact::borrowed(input));
            }
        }

        tokio::fs::create_dir_all(&self.work_dir).await.map_err(|e| {
            RelayError::conversion(format!(
                "cannot create work directory {}: {}",
                self.work_dir.display(),
                e
            ))
        })?;

        // Owned from the start so a failed decode cleans up its partial output.
        let output = AudioArtifact::owned(self.work_dir.join(format!(
            "{}_{}.wav",
            uuid::Uuid::new_v4(),
            target_sample_rate
        )));

        info!(
            "Converting {} to {}Hz mono with {}",
            input.display(),
            target_sample_rate,
            self.decoder.name()
        );
        self.decoder
            .decode(input, output.path(), target_sample_rate)
            .await?;

        let format = WavFormat::probe(output.path())?;
        if !format.is_linear16_mono(target_sample_rate) {
            warn!(
                "{} produced {}Hz/{}ch/{}bit output",
                self.decoder.name(),
                format.sample_rate,
                format.channels,
                format.bits_per_sample
            );
            return Err(RelayError::conversion(format!(
                "decoder output is not mono LINEAR16 at {}Hz",
                target_sample_rate
            )));
        }

        info!(
            "Converted {} -> {} ({:.1}s)",
            input.display(),
            output.path().display(),
            format.duration_seconds
        );

        Ok(output)
    }
}
