//! The recorder widget: one capture session, the clip it last produced and a
//! playback controller for that clip.
//!
//! Everything here runs on the event loop thread. Menu actions, tick
//! deadlines and [`AudioEvent`]s are fed in one at a time and the widget
//! answers with a [`View`] describing what the tray should show.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::{error, info, warn};
use voxclip_audio::{AudioInput, AudioOutput, CaptureSession, Clip, PlaybackController};
use voxclip_core::{
    AudioEvent, EventSink, PlaybackStatus, SessionId, SessionStatus, Transition, format_time,
};
use voxclip_upload::UploadReceipt;

pub const ACQUISITION_ERROR: &str =
    "Could not access the microphone. Please check your device and settings.";
pub const CAPTURE_ERROR: &str = "The microphone stopped delivering audio.";
pub const PLAYBACK_ERROR: &str = "Could not play the recording.";
pub const UPLOAD_ERROR: &str = "Failed to upload the audio file.";
pub const ENCODE_ERROR: &str = "Failed to prepare the audio file for upload.";
pub const NO_CLIP_ERROR: &str = "No audio file to upload.";

/// Something the user can ask the widget to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartRecording,
    StopRecording,
    PauseRecording,
    ResumeRecording,
    Upload,
    Play,
    PausePlayback,
    StopPlayback,
}

/// Which actions are currently enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub start: bool,
    pub stop: bool,
    pub pause: bool,
    pub resume: bool,
    pub upload: bool,
    pub play: bool,
    pub pause_playback: bool,
    pub stop_playback: bool,
}

impl Controls {
    pub fn enabled(&self, action: Action) -> bool {
        match action {
            Action::StartRecording => self.start,
            Action::StopRecording => self.stop,
            Action::PauseRecording => self.pause,
            Action::ResumeRecording => self.resume,
            Action::Upload => self.upload,
            Action::Play => self.play,
            Action::PausePlayback => self.pause_playback,
            Action::StopPlayback => self.stop_playback,
        }
    }
}

/// Snapshot of everything the UI renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub status: SessionStatus,
    pub controls: Controls,
    /// "Recording Time: m:ss", only while a take is live
    pub recording_time: Option<String>,
    pub playback: Option<PlaybackStatus>,
    pub error: Option<String>,
}

/// A clip packaged for the upload collaborator.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub session: SessionId,
    pub audio: Bytes,
    pub mime_type: &'static str,
    pub filename: &'static str,
}

/// Result of an upload, posted back to the event loop.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub session: SessionId,
    pub result: Result<UploadReceipt, String>,
}

pub struct Widget {
    input: Box<dyn AudioInput>,
    output: Box<dyn AudioOutput>,
    sink: Arc<dyn EventSink>,
    session: CaptureSession,
    // Playback is declared before the clip so it is dropped first.
    playback: Option<PlaybackController>,
    clip: Option<Clip>,
    uploading: Option<SessionId>,
    error: Option<String>,
}

impl Widget {
    pub fn new(
        input: Box<dyn AudioInput>,
        output: Box<dyn AudioOutput>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            input,
            output,
            sink,
            session: CaptureSession::new(),
            playback: None,
            clip: None,
            uploading: None,
            error: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn clip(&self) -> Option<&Clip> {
        self.clip.as_ref()
    }

    pub fn playback(&self) -> Option<&PlaybackController> {
        self.playback.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// When the event loop has to wake up next for a tick.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.next_tick()
    }

    /// Perform `action`. Returns a request for the upload collaborator when
    /// the action was an upload that can proceed.
    pub fn apply(&mut self, action: Action, now: Instant) -> Option<UploadRequest> {
        match action {
            Action::StartRecording => {
                self.start_recording();
            }
            Action::StopRecording => {
                self.stop_recording();
            }
            Action::PauseRecording => {
                self.session.pause();
            }
            Action::ResumeRecording => {
                self.session.resume(now);
            }
            Action::Upload => return self.upload(),
            Action::Play => {
                self.play();
            }
            Action::PausePlayback => {
                self.with_playback(PlaybackController::pause);
            }
            Action::StopPlayback => {
                self.with_playback(PlaybackController::stop);
            }
        }
        None
    }

    pub fn start_recording(&mut self) -> Transition {
        match self.session.start(self.input.as_ref(), self.sink.clone()) {
            Ok(Transition::Applied) => {
                self.error = None;
                Transition::Applied
            }
            Ok(Transition::Ignored) => Transition::Ignored,
            Err(e) => {
                error!("Error accessing microphone: {}", e);
                self.error = Some(ACQUISITION_ERROR.to_string());
                Transition::Ignored
            }
        }
    }

    /// Finalize the live take. The new clip replaces the previous one and
    /// playback starts over on it.
    pub fn stop_recording(&mut self) -> Transition {
        let Some(clip) = self.session.stop() else {
            return Transition::Ignored;
        };

        // Close the old output stream before the old clip goes away.
        self.playback = None;
        self.playback = Some(PlaybackController::new(&clip));
        self.clip = Some(clip);
        Transition::Applied
    }

    pub fn play(&mut self) -> Transition {
        let (Some(playback), Some(clip)) = (self.playback.as_mut(), self.clip.as_ref()) else {
            return Transition::Ignored;
        };
        match playback.play(clip, self.output.as_ref(), self.sink.clone()) {
            Ok(transition) => transition,
            Err(e) => {
                error!("Error opening output device: {}", e);
                self.error = Some(PLAYBACK_ERROR.to_string());
                Transition::Ignored
            }
        }
    }

    fn with_playback(&mut self, f: impl FnOnce(&mut PlaybackController) -> Transition) -> Transition {
        self.playback.as_mut().map(f).unwrap_or(Transition::Ignored)
    }

    /// Package the current clip for upload. One upload runs at a time; the
    /// clip stays around afterwards so a failed upload can be retried.
    pub fn upload(&mut self) -> Option<UploadRequest> {
        let Some(clip) = self.clip.as_ref() else {
            self.error = Some(NO_CLIP_ERROR.to_string());
            return None;
        };
        if let Some(session) = self.uploading {
            warn!(%session, "upload already in flight");
            return None;
        }

        let audio = match clip.to_wav() {
            Ok(audio) => audio,
            Err(e) => {
                error!("Error encoding recording: {}", e);
                self.error = Some(ENCODE_ERROR.to_string());
                return None;
            }
        };

        self.uploading = Some(clip.session());
        Some(UploadRequest {
            session: clip.session(),
            audio: Bytes::from(audio),
            mime_type: clip.mime_type(),
            filename: voxclip_audio::CLIP_FILENAME,
        })
    }

    pub fn on_upload_finished(&mut self, outcome: UploadOutcome) {
        if self.uploading == Some(outcome.session) {
            self.uploading = None;
        }
        match outcome.result {
            Ok(receipt) => {
                info!(session = %outcome.session, status = receipt.status, body = %receipt.body, "Upload successful");
            }
            Err(e) => {
                error!(session = %outcome.session, "Error uploading audio file: {}", e);
                self.error = Some(UPLOAD_ERROR.to_string());
            }
        }
    }

    pub fn handle_event(&mut self, event: AudioEvent) -> Transition {
        match event {
            AudioEvent::ChunksReady(session) => self.session.on_chunks_ready(session),
            AudioEvent::CaptureError { session, message } => {
                if session != self.session.current() || !self.session.status().is_live() {
                    return Transition::Ignored;
                }
                warn!(%session, "capture stream error: {}", message);
                self.error = Some(CAPTURE_ERROR.to_string());
                Transition::Applied
            }
            AudioEvent::PlaybackEnded { clip, pass } => {
                self.with_playback(|p| p.on_ended(clip, pass))
            }
        }
    }

    pub fn tick(&mut self, now: Instant) -> Transition {
        self.session.tick(now)
    }

    pub fn controls(&self) -> Controls {
        let status = self.session.status();
        let playback = self.playback.as_ref().map(PlaybackController::status);
        Controls {
            start: !status.is_live(),
            stop: status.is_live(),
            pause: status == SessionStatus::Recording,
            resume: status == SessionStatus::Paused,
            upload: self.clip.is_some() && self.uploading.is_none(),
            play: matches!(
                playback,
                Some(PlaybackStatus::Stopped | PlaybackStatus::Paused)
            ),
            pause_playback: playback == Some(PlaybackStatus::Playing),
            stop_playback: playback.is_some(),
        }
    }

    pub fn view(&self) -> View {
        let status = self.session.status();
        View {
            status,
            controls: self.controls(),
            recording_time: status.is_live().then(|| {
                format!(
                    "Recording Time: {}",
                    format_time(self.session.elapsed_seconds())
                )
            }),
            playback: self.playback.as_ref().map(PlaybackController::status),
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::mem;
    use std::rc::Rc;
    use std::sync::mpsc;
    use std::time::Duration;

    use voxclip_audio::{
        AcquisitionError, InputStream, OutputStream, PlayableAudio, PlaybackError, StreamFormat,
        TICK_INTERVAL,
    };

    use super::*;

    #[derive(Default)]
    struct Devices {
        deny_input: bool,
        deny_output: bool,
        mic_held: usize,
        mic_released: usize,
        pending: VecDeque<Vec<u8>>,
        speaker_open: usize,
        playing: bool,
        cursor: Duration,
        pass: u64,
    }

    #[derive(Clone, Default)]
    struct Fake(Rc<RefCell<Devices>>);

    impl AudioInput for Fake {
        fn open(
            &self,
            _session: SessionId,
            _sink: Arc<dyn EventSink>,
        ) -> Result<Box<dyn InputStream>, AcquisitionError> {
            if self.0.borrow().deny_input {
                return Err(AcquisitionError::PermissionDenied("not allowed".into()));
            }
            self.0.borrow_mut().mic_held += 1;
            Ok(Box::new(self.clone()))
        }
    }

    impl InputStream for Fake {
        fn format(&self) -> StreamFormat {
            StreamFormat {
                sample_rate: 8_000,
                channels: 1,
            }
        }

        fn start(&mut self) -> Result<(), AcquisitionError> {
            Ok(())
        }

        fn pause(&mut self) {}

        fn resume(&mut self) {}

        fn take_chunks(&mut self) -> Vec<Vec<u8>> {
            self.0.borrow_mut().pending.drain(..).collect()
        }

        fn stop(&mut self) -> Vec<Vec<u8>> {
            mem::take(&mut self.0.borrow_mut().pending).into()
        }

        fn release(self: Box<Self>) {
            self.0.borrow_mut().mic_released += 1;
        }
    }

    impl AudioOutput for Fake {
        fn open(
            &self,
            _audio: PlayableAudio,
            _session: SessionId,
            _sink: Arc<dyn EventSink>,
        ) -> Result<Box<dyn OutputStream>, PlaybackError> {
            if self.0.borrow().deny_output {
                return Err(PlaybackError::NoOutputDevice);
            }
            self.0.borrow_mut().speaker_open += 1;
            Ok(Box::new(self.clone()))
        }
    }

    impl OutputStream for Fake {
        fn play(&mut self) {
            self.0.borrow_mut().playing = true;
        }

        fn pause(&mut self) {
            self.0.borrow_mut().playing = false;
        }

        fn seek(&mut self, position: Duration) {
            let mut devices = self.0.borrow_mut();
            devices.cursor = position;
            devices.pass += 1;
        }

        fn position(&self) -> Duration {
            self.0.borrow().cursor
        }

        fn pass(&self) -> u64 {
            self.0.borrow().pass
        }
    }

    fn widget() -> (Widget, Fake, mpsc::Receiver<AudioEvent>) {
        let fake = Fake::default();
        let (tx, rx) = mpsc::channel();
        let widget = Widget::new(Box::new(fake.clone()), Box::new(fake.clone()), Arc::new(tx));
        (widget, fake, rx)
    }

    fn deliver(widget: &mut Widget, fake: &Fake, chunk: &[u8]) {
        fake.0.borrow_mut().pending.push_back(chunk.to_vec());
        widget.handle_event(AudioEvent::ChunksReady(widget.session().current()));
    }

    #[test]
    fn test_initial_view() {
        let (widget, _, _) = widget();
        let view = widget.view();

        assert_eq!(view.status, SessionStatus::Idle);
        assert_eq!(view.recording_time, None);
        assert_eq!(view.playback, None);
        assert_eq!(
            view.controls,
            Controls {
                start: true,
                ..Default::default()
            }
        );
        assert!(widget.clip().is_none());
    }

    #[test]
    fn test_record_scenario() {
        let (mut widget, fake, _) = widget();
        widget.apply(Action::StartRecording, Instant::now());
        let t0 = widget.next_deadline().unwrap() - TICK_INTERVAL;
        for chunk in [b"c1", b"c2", b"c3"] {
            deliver(&mut widget, &fake, chunk);
        }
        for n in 1..=5 {
            widget.tick(t0 + TICK_INTERVAL * n);
        }
        assert_eq!(
            widget.view().recording_time.as_deref(),
            Some("Recording Time: 0:05")
        );

        widget.apply(Action::StopRecording, t0 + TICK_INTERVAL * 5);

        let clip = widget.clip().unwrap();
        assert_eq!(clip.bytes(), b"c1c2c3");
        assert_eq!(clip.elapsed_seconds(), 5);
        assert_eq!(fake.0.borrow().mic_released, 1);
        assert_eq!(widget.playback().unwrap().status(), PlaybackStatus::Stopped);
        assert_eq!(widget.next_deadline(), None);

        let controls = widget.controls();
        assert!(controls.start && controls.upload && controls.play && controls.stop_playback);
        assert!(!controls.stop && !controls.pause && !controls.resume);
    }

    #[test]
    fn test_controls_follow_recording_state() {
        let (mut widget, _, _) = widget();
        let now = Instant::now();

        widget.apply(Action::StartRecording, now);
        let controls = widget.controls();
        assert!(!controls.start && controls.stop && controls.pause && !controls.resume);

        widget.apply(Action::PauseRecording, now);
        let controls = widget.controls();
        assert!(!controls.start && controls.stop && !controls.pause && controls.resume);
        assert_eq!(
            widget.view().recording_time.as_deref(),
            Some("Recording Time: 0:00")
        );
    }

    #[test]
    fn test_start_failure_reports_error() {
        let (mut widget, fake, _) = widget();
        fake.0.borrow_mut().deny_input = true;

        assert_eq!(widget.start_recording(), Transition::Ignored);
        assert_eq!(widget.status(), SessionStatus::Idle);
        assert_eq!(widget.error(), Some(ACQUISITION_ERROR));
        assert_eq!(widget.next_deadline(), None);
        assert_eq!(fake.0.borrow().mic_held, 0);

        fake.0.borrow_mut().deny_input = false;
        widget.start_recording();
        assert_eq!(widget.error(), None);
    }

    #[test]
    fn test_start_failure_keeps_previous_clip() {
        let (mut widget, fake, _) = widget();
        let now = Instant::now();

        widget.apply(Action::StartRecording, now);
        deliver(&mut widget, &fake, b"keep");
        widget.apply(Action::StopRecording, now);

        fake.0.borrow_mut().deny_input = true;
        widget.apply(Action::StartRecording, now);

        assert_eq!(widget.clip().unwrap().bytes(), b"keep");
        assert!(widget.controls().play);
    }

    #[test]
    fn test_play_then_ended() {
        let (mut widget, fake, _) = widget();
        let now = Instant::now();
        widget.apply(Action::StartRecording, now);
        widget.apply(Action::StopRecording, now);
        let clip = widget.clip().unwrap().session();
        assert!(!widget.clip().unwrap().is_decoded());

        widget.apply(Action::Play, now);
        assert!(widget.clip().unwrap().is_decoded());
        assert_eq!(widget.view().playback, Some(PlaybackStatus::Playing));
        assert!(widget.controls().pause_playback);
        assert!(fake.0.borrow().playing);

        let pass = fake.0.borrow().pass;
        widget.handle_event(AudioEvent::PlaybackEnded { clip, pass });
        let playback = widget.playback().unwrap();
        assert_eq!(playback.status(), PlaybackStatus::Stopped);
        assert_eq!(playback.position(), Duration::ZERO);
    }

    #[test]
    fn test_new_clip_resets_playback() {
        let (mut widget, fake, _) = widget();
        let now = Instant::now();
        widget.apply(Action::StartRecording, now);
        widget.apply(Action::StopRecording, now);
        let first = widget.clip().unwrap().session();
        widget.apply(Action::Play, now);
        fake.0.borrow_mut().cursor = Duration::from_millis(400);
        widget.apply(Action::PausePlayback, now);

        widget.apply(Action::StartRecording, now);
        deliver(&mut widget, &fake, b"second");
        widget.apply(Action::StopRecording, now);

        let playback = widget.playback().unwrap();
        assert_eq!(playback.status(), PlaybackStatus::Stopped);
        assert_eq!(playback.position(), Duration::ZERO);
        assert_ne!(playback.clip(), first);
        assert_eq!(widget.clip().unwrap().bytes(), b"second");

        // An ended notification from the old clip changes nothing.
        widget.apply(Action::Play, now);
        let pass = fake.0.borrow().pass;
        widget.handle_event(AudioEvent::PlaybackEnded { clip: first, pass });
        assert_eq!(widget.view().playback, Some(PlaybackStatus::Playing));
    }

    #[test]
    fn test_playback_open_failure_reports_error() {
        let (mut widget, fake, _) = widget();
        let now = Instant::now();
        widget.apply(Action::StartRecording, now);
        widget.apply(Action::StopRecording, now);
        fake.0.borrow_mut().deny_output = true;

        widget.apply(Action::Play, now);
        assert_eq!(widget.error(), Some(PLAYBACK_ERROR));
        assert_eq!(widget.view().playback, Some(PlaybackStatus::Stopped));
    }

    #[test]
    fn test_upload_without_clip() {
        let (mut widget, _, _) = widget();

        assert!(widget.apply(Action::Upload, Instant::now()).is_none());
        assert_eq!(widget.error(), Some(NO_CLIP_ERROR));
    }

    #[test]
    fn test_upload_request_and_retry_after_failure() {
        let (mut widget, fake, _) = widget();
        let now = Instant::now();
        widget.apply(Action::StartRecording, now);
        deliver(&mut widget, &fake, &[1, 0, 2, 0]);
        widget.apply(Action::StopRecording, now);

        let request = widget.apply(Action::Upload, now).unwrap();
        assert_eq!(request.mime_type, "audio/wav");
        assert_eq!(request.filename, "recording.wav");
        assert_eq!(&request.audio[0..4], b"RIFF");
        assert_eq!(&request.audio[44..], &[1u8, 0, 2, 0]);

        // One upload at a time.
        assert!(!widget.controls().upload);
        assert!(widget.apply(Action::Upload, now).is_none());

        widget.on_upload_finished(UploadOutcome {
            session: request.session,
            result: Err("connection refused".to_string()),
        });
        assert_eq!(widget.error(), Some(UPLOAD_ERROR));
        assert!(widget.clip().is_some());
        assert!(widget.controls().upload);

        assert!(widget.apply(Action::Upload, now).is_some());
    }

    #[test]
    fn test_upload_success_keeps_error_region_clear() {
        let (mut widget, _, _) = widget();
        let now = Instant::now();
        widget.apply(Action::StartRecording, now);
        widget.apply(Action::StopRecording, now);

        let request = widget.upload().unwrap();
        widget.on_upload_finished(UploadOutcome {
            session: request.session,
            result: Ok(UploadReceipt {
                status: 201,
                body: String::new(),
            }),
        });
        assert_eq!(widget.error(), None);
        assert!(widget.controls().upload);
    }

    #[test]
    fn test_invalid_actions_are_noops() {
        let (mut widget, _, _) = widget();
        let now = Instant::now();

        for action in [
            Action::PauseRecording,
            Action::ResumeRecording,
            Action::StopRecording,
            Action::Play,
            Action::PausePlayback,
            Action::StopPlayback,
        ] {
            assert!(widget.apply(action, now).is_none());
        }
        assert_eq!(widget.status(), SessionStatus::Idle);
        assert_eq!(widget.error(), None);
        assert!(widget.clip().is_none());
    }

    #[test]
    fn test_capture_error_for_live_take() {
        let (mut widget, _, _) = widget();
        widget.apply(Action::StartRecording, Instant::now());
        let session = widget.session().current();

        let stale = AudioEvent::CaptureError {
            session: SessionId(session.0 + 1),
            message: "gone".into(),
        };
        assert_eq!(widget.handle_event(stale), Transition::Ignored);

        let live = AudioEvent::CaptureError {
            session,
            message: "device unplugged".into(),
        };
        assert!(widget.handle_event(live).applied());
        assert_eq!(widget.error(), Some(CAPTURE_ERROR));
        assert_eq!(widget.status(), SessionStatus::Recording);
    }

    #[test]
    fn test_drop_releases_microphone() {
        let (mut widget, fake, _) = widget();
        widget.apply(Action::StartRecording, Instant::now());
        drop(widget);
        assert_eq!(fake.0.borrow().mic_released, 1);
    }
}
