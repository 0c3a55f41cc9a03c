//! Seams between the state machines and the platform audio APIs.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use voxclip_core::{EventSink, SessionId};

use crate::clip::PlayableAudio;

/// Errors raised while acquiring the microphone. This is the only
/// recoverable capture failure; the session stays idle when it happens.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// No recording device available
    #[error("no input device available")]
    NoInputDevice,
    /// The platform refused access to the device
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),
    /// The device could not report a usable stream configuration
    #[error("failed to query input config: {0}")]
    StreamConfig(#[from] cpal::DefaultStreamConfigError),
    /// Sample format not supported
    #[error("sample format not supported: {0}")]
    SampleFormatNotSupported(String),
    /// Build stream error
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),
    /// The stream was built but could not be started
    #[error("failed to start input stream: {0}")]
    Start(String),
}

/// Errors raised while opening the output device for playback.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no output device available")]
    NoOutputDevice,
    #[error("failed to query output config: {0}")]
    StreamConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("sample format not supported: {0}")]
    SampleFormatNotSupported(String),
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    Start(String),
}

/// Layout of the 16-bit PCM a capture stream produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    pub const BYTES_PER_SAMPLE: usize = 2;

    pub fn bytes_per_frame(&self) -> usize {
        Self::BYTES_PER_SAMPLE * usize::from(self.channels.max(1))
    }

    /// Number of bytes covering `duration` of audio, rounded down to a whole
    /// frame and never less than one frame.
    pub fn bytes_for(&self, duration: Duration) -> usize {
        let frames = (duration.as_secs_f64() * f64::from(self.sample_rate)) as usize;
        frames.max(1) * self.bytes_per_frame()
    }

    pub fn duration_of(&self, bytes: usize) -> Duration {
        let frames = bytes / self.bytes_per_frame();
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate.max(1)))
    }
}

/// Something that can hand out exclusive microphone streams.
pub trait AudioInput {
    /// Acquire the device for take `session`. The returned stream has not
    /// started producing audio yet. The stream posts
    /// [`voxclip_core::AudioEvent::ChunksReady`] to `sink` whenever fragments
    /// are waiting in [`InputStream::take_chunks`].
    fn open(
        &self,
        session: SessionId,
        sink: Arc<dyn EventSink>,
    ) -> Result<Box<dyn InputStream>, AcquisitionError>;
}

/// An acquired microphone stream, exclusively owned by a capture session.
pub trait InputStream {
    fn format(&self) -> StreamFormat;

    fn start(&mut self) -> Result<(), AcquisitionError>;

    /// Suspend capture. Audio buffered so far becomes a fragment.
    fn pause(&mut self);

    fn resume(&mut self);

    /// Fragments completed since the last call, in capture order.
    fn take_chunks(&mut self) -> Vec<Vec<u8>>;

    /// Halt capture and return every fragment not yet taken, including the
    /// partially filled one.
    fn stop(&mut self) -> Vec<Vec<u8>>;

    /// Stop all device tracks and give the microphone back.
    fn release(self: Box<Self>);
}

/// Something that can render a decoded clip.
pub trait AudioOutput {
    /// Open a paused output stream positioned at the start of `audio`. The
    /// stream posts [`voxclip_core::AudioEvent::PlaybackEnded`] to `sink` when
    /// it runs out of samples.
    fn open(
        &self,
        audio: PlayableAudio,
        session: SessionId,
        sink: Arc<dyn EventSink>,
    ) -> Result<Box<dyn OutputStream>, PlaybackError>;
}

/// A playback stream over one clip.
pub trait OutputStream {
    fn play(&mut self);

    fn pause(&mut self);

    /// Move the playhead. Every seek starts a new pass.
    fn seek(&mut self, position: Duration);

    fn position(&self) -> Duration;

    /// Current pass. End notifications carry the pass they belong to, so
    /// one queued before a seek can be told apart from a fresh one.
    fn pass(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_for_rounds_to_frames() {
        let format = StreamFormat {
            sample_rate: 48_000,
            channels: 2,
        };
        assert_eq!(format.bytes_per_frame(), 4);
        assert_eq!(format.bytes_for(Duration::from_secs(1)), 192_000);
        assert_eq!(format.bytes_for(Duration::ZERO), 4);
    }

    #[test]
    fn test_duration_of() {
        let format = StreamFormat {
            sample_rate: 16_000,
            channels: 1,
        };
        assert_eq!(format.duration_of(32_000), Duration::from_secs(1));
        assert_eq!(format.duration_of(1), Duration::ZERO);
    }

    #[test]
    fn test_config_query_errors_keep_their_cause() {
        let err = AcquisitionError::from(cpal::DefaultStreamConfigError::DeviceNotAvailable);
        assert!(matches!(
            err,
            AcquisitionError::StreamConfig(cpal::DefaultStreamConfigError::DeviceNotAvailable)
        ));
        assert!(err.to_string().starts_with("failed to query input config:"));

        let err = PlaybackError::from(cpal::DefaultStreamConfigError::StreamTypeNotSupported);
        assert!(matches!(
            err,
            PlaybackError::StreamConfig(cpal::DefaultStreamConfigError::StreamTypeNotSupported)
        ));
    }
}
