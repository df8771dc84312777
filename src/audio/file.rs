use crate::error::{RelayError, Result};
use hound::{SampleFormat, WavReader};
use std::path::Path;
use tracing::debug;

/// Header-level description of a WAV file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_format: SampleFormat,
    pub duration_seconds: f64,
}

impl WavFormat {
    /// Read the WAV header; fails with `Conversion` for anything that is not a WAV file.
    pub fn probe(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path).map_err(|e| {
            RelayError::conversion(format!("{} is not a readable WAV file: {}", path.display(), e))
        })?;

        let spec = reader.spec();
        let duration_seconds = if spec.sample_rate == 0 {
            0.0
        } else {
            reader.duration() as f64 / spec.sample_rate as f64
        };

        let format = Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            sample_format: spec.sample_format,
            duration_seconds,
        };

        debug!(
            "Probed {}: {}Hz, {} channels, {} bits, {:.1}s",
            path.display(),
            format.sample_rate,
            format.channels,
            format.bits_per_sample,
            format.duration_seconds
        );

        Ok(format)
    }

    /// Mono 16-bit integer PCM at exactly `sample_rate`.
    pub fn is_linear16_mono(&self, sample_rate: u32) -> bool {
        self.channels == 1
            && self.sample_rate == sample_rate
            && self.bits_per_sample == 16
            && self.sample_format == SampleFormat::Int
    }
}
