pub mod artifact;
pub mod chunk;
pub mod file;
pub mod normalizer;

pub use artifact::{AudioArtifact, Ownership};
pub use chunk::{Chunk, ChunkSource, Pacing, BYTES_PER_SAMPLE, MAX_READ_BYTES};
pub use file::WavFormat;
pub use normalizer::{AudioNormalizer, Decoder, FfmpegDecoder};
