//! Playback state machine over the current clip.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use voxclip_core::{EventSink, PlaybackStatus, SessionId, Transition};

use crate::clip::Clip;
use crate::device::{AudioOutput, OutputStream, PlaybackError};

/// Renders one clip. Replace the controller when the clip is replaced.
pub struct PlaybackController {
    clip: SessionId,
    duration: Duration,
    status: PlaybackStatus,
    position: Duration,
    // Opened on the first play, which is also when the clip gets decoded.
    stream: Option<Box<dyn OutputStream>>,
}

impl PlaybackController {
    pub fn new(clip: &Clip) -> Self {
        Self {
            clip: clip.session(),
            duration: clip.duration(),
            status: PlaybackStatus::Stopped,
            position: Duration::ZERO,
            stream: None,
        }
    }

    /// The take whose clip this controller renders.
    pub fn clip(&self) -> SessionId {
        self.clip
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn position(&self) -> Duration {
        match (&self.stream, self.status) {
            (Some(stream), PlaybackStatus::Playing) => stream.position(),
            _ => self.position,
        }
    }

    pub fn position_seconds(&self) -> f64 {
        self.position().as_secs_f64()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Start or resume rendering `clip` from the retained position. Ignored
    /// for any clip other than the one this controller was made for.
    pub fn play(
        &mut self,
        clip: &Clip,
        output: &dyn AudioOutput,
        sink: Arc<dyn EventSink>,
    ) -> Result<Transition, PlaybackError> {
        if self.status == PlaybackStatus::Playing || clip.session() != self.clip {
            return Ok(Transition::Ignored);
        }

        if self.stream.is_none() {
            self.stream = Some(output.open(clip.playable(), self.clip, sink)?);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(Transition::Ignored);
        };

        stream.seek(self.position);
        stream.play();
        self.status = PlaybackStatus::Playing;
        info!(clip = %self.clip, position = ?self.position, "playback started");
        Ok(Transition::Applied)
    }

    pub fn pause(&mut self) -> Transition {
        if self.status != PlaybackStatus::Playing {
            return Transition::Ignored;
        }
        let Some(stream) = self.stream.as_mut() else {
            return Transition::Ignored;
        };

        stream.pause();
        self.position = stream.position();
        self.status = PlaybackStatus::Paused;
        debug!(clip = %self.clip, position = ?self.position, "playback paused");
        Transition::Applied
    }

    pub fn stop(&mut self) -> Transition {
        if self.status == PlaybackStatus::Stopped {
            return Transition::Ignored;
        }
        self.rewind();
        debug!(clip = %self.clip, "playback stopped");
        Transition::Applied
    }

    /// The output ran out of samples. Ignored unless it is the current pass
    /// over this clip and it is playing.
    pub fn on_ended(&mut self, clip: SessionId, pass: u64) -> Transition {
        if clip != self.clip || self.status != PlaybackStatus::Playing {
            return Transition::Ignored;
        }
        if self.stream.as_ref().map(|s| s.pass()) != Some(pass) {
            debug!(clip = %self.clip, pass, "dropping end of an earlier pass");
            return Transition::Ignored;
        }
        self.rewind();
        debug!(clip = %self.clip, "playback ended");
        Transition::Applied
    }

    fn rewind(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            stream.pause();
            stream.seek(Duration::ZERO);
        }
        self.position = Duration::ZERO;
        self.status = PlaybackStatus::Stopped;
    }
}
