use super::artifact::AudioArtifact;
use crate::error::Result;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Upper bound for a single read, whatever the caller asks for
pub const MAX_READ_BYTES: usize = 1024 * 1024;

/// LINEAR16 sample width
pub const BYTES_PER_SAMPLE: u32 = 2;

/// How reads are spaced in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep `size / (sample_rate * BYTES_PER_SAMPLE)` seconds before each read
    RealTime { sample_rate: u32 },
    /// Read as fast as the disk allows
    Unpaced,
}

impl Pacing {
    pub fn delay_for(&self, size: usize) -> Duration {
        match self {
            Pacing::RealTime { sample_rate } if *sample_rate > 0 => Duration::from_secs_f64(
                size as f64 / (*sample_rate as f64 * BYTES_PER_SAMPLE as f64),
            ),
            _ => Duration::ZERO,
        }
    }
}

/// One read result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Vec<u8>,
    /// Set, with empty `data`, once the file is exhausted
    pub is_end: bool,
}

/// Paced, finite byte chunks over a PCM file.
///
/// Dropping the source closes the file and then releases the artifact,
/// deleting it if the artifact was owned.
pub struct ChunkSource {
    // Field order matters: the handle must close before the artifact is deleted.
    file: File,
    artifact: AudioArtifact,
    pacing: Pacing,
    bytes_read: u64,
    exhausted: bool,
}

impl ChunkSource {
    pub async fn open(artifact: AudioArtifact, pacing: Pacing) -> Result<Self> {
        let file = File::open(artifact.path()).await?;

        info!(
            "Chunk source opened: {} ({:?})",
            artifact.path().display(),
            pacing
        );

        Ok(Self {
            file,
            artifact,
            pacing,
            bytes_read: 0,
            exhausted: false,
        })
    }

    /// Read at most `min(max_size, MAX_READ_BYTES)` bytes.
    pub async fn read(&mut self, max_size: usize) -> Result<Chunk> {
        if self.exhausted {
            return Ok(Chunk {
                data: Vec::new(),
                is_end: true,
            });
        }

        let size = max_size.min(MAX_READ_BYTES);
        if size == 0 {
            return Ok(Chunk {
                data: Vec::new(),
                is_end: false,
            });
        }

        let delay = self.pacing.delay_for(size);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut data = vec![0u8; size];
        let mut filled = 0;
        while filled < size {
            let n = self.file.read(&mut data[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);

        if filled == 0 {
            self.exhausted = true;
            debug!(
                "Chunk source exhausted after {} bytes: {}",
                self.bytes_read,
                self.artifact.path().display()
            );
            return Ok(Chunk { data, is_end: true });
        }

        self.bytes_read += filled as u64;
        Ok(Chunk {
            data,
            is_end: false,
        })
    }

    pub fn path(&self) -> &Path {
        self.artifact.path()
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Close the file and release the artifact, reporting deletion errors.
    pub fn close(self) -> Result<()> {
        let Self { file, artifact, .. } = self;
        drop(file);
        artifact.release()
    }
}
