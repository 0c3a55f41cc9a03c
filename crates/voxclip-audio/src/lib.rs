//! Audio capture and playback for voxclip.
//!
//! A [`CaptureSession`] drives one microphone take at a time and finalizes it
//! into a [`Clip`]. A [`PlaybackController`] renders a clip. Both talk to the
//! platform only through the [`AudioInput`] and [`AudioOutput`] traits, with
//! `cpal` implementations in [`CpalInput`] and [`CpalOutput`].

mod clip;
mod device;
mod input;
mod output;
mod playback;
mod session;

pub use clip::{CLIP_FILENAME, CLIP_MIME_TYPE, Clip, PlayableAudio};
pub use device::{
    AcquisitionError, AudioInput, AudioOutput, InputStream, OutputStream, PlaybackError,
    StreamFormat,
};
pub use input::CpalInput;
pub use output::CpalOutput;
pub use playback::PlaybackController;
pub use session::{CaptureSession, TICK_INTERVAL};
