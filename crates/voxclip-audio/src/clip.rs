//! Finalized recordings.
//!
//! ## Format notes
//!
//! A clip keeps exactly the bytes its capture stream delivered: interleaved
//! 16-bit little-endian PCM. Nothing is transcoded. [`Clip::to_wav`] only adds
//! RIFF framing so the bytes can be handed to anything expecting `audio/wav`.

use std::io::Cursor;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use hound::WavWriter;
use tracing::debug;
use voxclip_core::SessionId;

use crate::device::StreamFormat;

/// MIME type attached to every clip.
pub const CLIP_MIME_TYPE: &str = "audio/wav";

/// File name used when a clip leaves the process.
pub const CLIP_FILENAME: &str = "recording.wav";

/// Decoded samples of a clip, cheap to clone into an audio callback.
#[derive(Debug, Clone)]
pub struct PlayableAudio {
    pub samples: Arc<[i16]>,
    pub format: StreamFormat,
}

impl PlayableAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.format.channels.max(1))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.format.sample_rate.max(1)))
    }
}

/// Immutable audio produced by one completed take.
#[derive(Debug)]
pub struct Clip {
    session: SessionId,
    bytes: Vec<u8>,
    format: StreamFormat,
    elapsed_seconds: u64,
    playable: OnceLock<PlayableAudio>,
}

impl Clip {
    /// Joins fragments in the order given.
    pub fn from_chunks(
        session: SessionId,
        chunks: Vec<Vec<u8>>,
        format: StreamFormat,
        elapsed_seconds: u64,
    ) -> Self {
        let bytes = chunks.concat();
        Self {
            session,
            bytes,
            format,
            elapsed_seconds,
            playable: OnceLock::new(),
        }
    }

    /// The take that produced this clip.
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &'static str {
        CLIP_MIME_TYPE
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Recording time counted by the session when it was stopped.
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Length of the audio itself, from the byte count.
    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.bytes.len())
    }

    /// Decoded samples, created on first use and kept until
    /// [`Clip::discard_playable`].
    pub fn playable(&self) -> PlayableAudio {
        self.playable
            .get_or_init(|| {
                let samples: Arc<[i16]> = self
                    .bytes
                    .chunks_exact(StreamFormat::BYTES_PER_SAMPLE)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                debug!(session = %self.session, samples = samples.len(), "decoded clip");
                PlayableAudio {
                    samples,
                    format: self.format,
                }
            })
            .clone()
    }

    pub fn is_decoded(&self) -> bool {
        self.playable.get().is_some()
    }

    /// Drops the decoded samples. Returns whether there were any.
    pub fn discard_playable(&mut self) -> bool {
        self.playable.take().is_some()
    }

    /// The clip bytes with a WAV header in front.
    pub fn to_wav(&self) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: self.format.channels,
            sample_rate: self.format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut buffer = Cursor::new(Vec::with_capacity(44 + self.bytes.len()));
        let mut writer = WavWriter::new(&mut buffer, spec)?;
        for pair in self.bytes.chunks_exact(StreamFormat::BYTES_PER_SAMPLE) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        // Writes the final chunk sizes into the header.
        writer.finalize()?;

        Ok(buffer.into_inner())
    }
}

impl Drop for Clip {
    fn drop(&mut self) {
        if self.discard_playable() {
            debug!(session = %self.session, "released clip playback resource");
        }
    }
}
