//! Event types for audio capture and playback.
//!
//! Device callbacks run on audio threads. They never touch recorder state
//! directly; they post one of these events and the owner of the state
//! machines handles it on its own thread.

use std::sync::mpsc;

use crate::SessionId;

/// Events emitted by capture and playback streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    /// One or more fragments are buffered on the capture stream of a take
    ChunksReady(SessionId),
    /// The capture stream of a take reported an error
    CaptureError { session: SessionId, message: String },
    /// Playback of the clip produced by a take reached its end. `pass`
    /// identifies the play-through, see `OutputStream::pass`.
    PlaybackEnded { clip: SessionId, pass: u64 },
}

/// Destination for [`AudioEvent`]s. Must be callable from audio threads.
pub trait EventSink: Send + Sync + 'static {
    fn send(&self, event: AudioEvent);
}

impl EventSink for mpsc::Sender<AudioEvent> {
    fn send(&self, event: AudioEvent) {
        // The receiver going away just means nobody is listening anymore.
        mpsc::Sender::send(self, event).ok();
    }
}
