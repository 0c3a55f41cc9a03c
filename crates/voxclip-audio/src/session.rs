//! Module for managing a recording take. There can only be one live take at a
//! time; the session owns the microphone stream, the fragments delivered so
//! far and the deadline of the next elapsed-time tick.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use voxclip_core::{EventSink, SessionId, SessionStatus, Transition};

use crate::clip::Clip;
use crate::device::{AcquisitionError, AudioInput, InputStream, StreamFormat};

/// Spacing of elapsed-time ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Capture state machine: Idle -> Recording <-> Paused -> Stopped.
pub struct CaptureSession {
    status: SessionStatus,
    current: SessionId,
    elapsed_seconds: u64,
    chunks: Vec<Vec<u8>>,
    format: Option<StreamFormat>,
    // Presence of the stream is what "device held" means. It is only ever
    // taken out by `stop` or by drop.
    stream: Option<Box<dyn InputStream>>,
    next_tick: Option<Instant>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Idle,
            current: SessionId::default(),
            elapsed_seconds: 0,
            chunks: Vec::new(),
            format: None,
            stream: None,
            next_tick: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The live take, or the most recent one once stopped.
    pub fn current(&self) -> SessionId {
        self.current
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    pub fn holds_device(&self) -> bool {
        self.stream.is_some()
    }

    /// When the next tick is due. `None` unless recording.
    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Acquire the microphone and begin a new take.
    ///
    /// Ignored while a take is live. On failure nothing stays acquired and
    /// the session is left idle. Acquisition blocks, so the first tick is
    /// armed from the moment the stream is running.
    pub fn start(
        &mut self,
        input: &dyn AudioInput,
        sink: Arc<dyn EventSink>,
    ) -> Result<Transition, AcquisitionError> {
        if self.status.is_live() || self.stream.is_some() {
            debug!(status = ?self.status, "start requested while a take is live");
            return Ok(Transition::Ignored);
        }

        let session = SessionId(self.current.0 + 1);
        let mut stream = match input.open(session, sink) {
            Ok(stream) => stream,
            Err(e) => {
                self.status = SessionStatus::Idle;
                return Err(e);
            }
        };
        if let Err(e) = stream.start() {
            stream.release();
            self.status = SessionStatus::Idle;
            return Err(e);
        }
        let started_at = Instant::now();

        let format = stream.format();
        info!(
            %session,
            sample_rate = format.sample_rate,
            channels = format.channels,
            "recording started"
        );

        self.current = session;
        self.elapsed_seconds = 0;
        self.chunks.clear();
        self.format = Some(format);
        self.stream = Some(stream);
        self.next_tick = Some(started_at + TICK_INTERVAL);
        self.status = SessionStatus::Recording;
        Ok(Transition::Applied)
    }

    pub fn pause(&mut self) -> Transition {
        if self.status != SessionStatus::Recording {
            return Transition::Ignored;
        }
        let Some(stream) = self.stream.as_mut() else {
            return Transition::Ignored;
        };

        stream.pause();
        self.next_tick = None;
        self.status = SessionStatus::Paused;
        info!(session = %self.current, elapsed = self.elapsed_seconds, "recording paused");
        Transition::Applied
    }

    /// Continue a paused take. The next tick lands a full interval after
    /// `now`.
    pub fn resume(&mut self, now: Instant) -> Transition {
        if self.status != SessionStatus::Paused {
            return Transition::Ignored;
        }
        let Some(stream) = self.stream.as_mut() else {
            return Transition::Ignored;
        };

        stream.resume();
        self.next_tick = Some(now + TICK_INTERVAL);
        self.status = SessionStatus::Recording;
        info!(session = %self.current, elapsed = self.elapsed_seconds, "recording resumed");
        Transition::Applied
    }

    /// Finalize the live take into a clip and release the microphone.
    /// Returns `None` when there is no live take.
    pub fn stop(&mut self) -> Option<Clip> {
        if !self.status.is_live() {
            return None;
        }
        let mut stream = self.stream.take()?;

        for chunk in stream.stop() {
            self.append(chunk);
        }
        stream.release();

        self.next_tick = None;
        self.status = SessionStatus::Stopped;

        let chunks = mem::take(&mut self.chunks);
        let format = self.format.take().unwrap_or(StreamFormat {
            sample_rate: 0,
            channels: 1,
        });
        let clip = Clip::from_chunks(self.current, chunks, format, self.elapsed_seconds);
        info!(
            session = %self.current,
            elapsed = self.elapsed_seconds,
            bytes = clip.bytes().len(),
            "recording stopped"
        );
        Some(clip)
    }

    /// Drain fragments the stream of `session` has buffered. Notifications
    /// for another take, or arriving after stop, are ignored.
    pub fn on_chunks_ready(&mut self, session: SessionId) -> Transition {
        if session != self.current || !self.status.is_live() {
            debug!(%session, current = %self.current, "dropping late chunk notification");
            return Transition::Ignored;
        }
        let Some(stream) = self.stream.as_mut() else {
            return Transition::Ignored;
        };

        let chunks = stream.take_chunks();
        if chunks.is_empty() {
            return Transition::Ignored;
        }
        for chunk in chunks {
            self.append(chunk);
        }
        Transition::Applied
    }

    /// Count every tick whose deadline has passed by `now`.
    pub fn tick(&mut self, now: Instant) -> Transition {
        if self.status != SessionStatus::Recording {
            return Transition::Ignored;
        }
        let Some(mut deadline) = self.next_tick else {
            return Transition::Ignored;
        };
        if now < deadline {
            return Transition::Ignored;
        }

        while deadline <= now {
            self.elapsed_seconds += 1;
            deadline += TICK_INTERVAL;
        }
        self.next_tick = Some(deadline);
        Transition::Applied
    }

    fn append(&mut self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            warn!(session = %self.current, "releasing microphone of an unfinished take");
            stream.release();
        }
    }
}
