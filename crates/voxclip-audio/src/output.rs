//! Clip playback through cpal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Host, Sample, SizedSample};
use tracing::{error, info, warn};
use voxclip_core::{AudioEvent, EventSink, SessionId};

use crate::clip::PlayableAudio;
use crate::device::{AudioOutput, OutputStream, PlaybackError};

type Result<T> = std::result::Result<T, PlaybackError>;

/// Playhead shared between the output callback and the owning stream.
#[derive(Debug, Default)]
struct Playhead {
    /// Position in source frames
    cursor: AtomicUsize,
    playing: AtomicBool,
    // Set once the end has been announced, cleared on seek.
    ended: AtomicBool,
    pass: AtomicU64,
}

pub struct CpalOutput {
    host: Host,
}

impl Default for CpalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalOutput {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

impl AudioOutput for CpalOutput {
    fn open(
        &self,
        audio: PlayableAudio,
        session: SessionId,
        sink: Arc<dyn EventSink>,
    ) -> Result<Box<dyn OutputStream>> {
        let device = self
            .host
            .default_output_device()
            .ok_or(PlaybackError::NoOutputDevice)?;
        let config = device.default_output_config()?;

        info!(
            device_name = %device.name().unwrap_or_else(|_| "unknown".into()),
            clip = %session,
            "Playing on device"
        );

        let source_rate = audio.format.sample_rate.max(1);
        let total_frames = audio.frames();
        let renderer = Renderer::new(audio, config.sample_rate().0, config.channels(), session, sink);
        let playhead: Arc<Playhead> = Arc::default();

        let err_fn = move |err: cpal::StreamError| {
            error!("an error occurred on output stream: {}", err);
        };

        let playhead_2 = playhead.clone();
        let stream = match config.sample_format() {
            cpal::SampleFormat::I16 => device.build_output_stream(
                &config.into(),
                move |data, _: &_| renderer.write::<i16>(data, &playhead_2),
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I32 => device.build_output_stream(
                &config.into(),
                move |data, _: &_| renderer.write::<i32>(data, &playhead_2),
                err_fn,
                None,
            )?,
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data, _: &_| renderer.write::<f32>(data, &playhead_2),
                err_fn,
                None,
            )?,
            sample_format => {
                return Err(PlaybackError::SampleFormatNotSupported(format!(
                    "{:?}",
                    sample_format
                )));
            }
        };

        // Some hosts start streams as soon as they are built.
        stream.pause().ok();

        Ok(Box::new(CpalOutputStream {
            stream,
            playhead,
            source_rate,
            total_frames,
        }))
    }
}

/// A cpal output stream bound to one clip. Dropping it closes the device.
struct CpalOutputStream {
    stream: cpal::Stream,
    playhead: Arc<Playhead>,
    source_rate: u32,
    total_frames: usize,
}

impl OutputStream for CpalOutputStream {
    fn play(&mut self) {
        self.playhead.playing.store(true, Ordering::Release);
        if let Err(e) = self.stream.play() {
            warn!("failed to start output stream: {}", e);
        }
    }

    fn pause(&mut self) {
        self.playhead.playing.store(false, Ordering::Release);
        if let Err(e) = self.stream.pause() {
            warn!("failed to pause output stream: {}", e);
        }
    }

    fn seek(&mut self, position: Duration) {
        let frame = (position.as_secs_f64() * f64::from(self.source_rate)) as usize;
        self.playhead
            .cursor
            .store(frame.min(self.total_frames), Ordering::Release);
        self.playhead.pass.fetch_add(1, Ordering::AcqRel);
        self.playhead.ended.store(false, Ordering::Release);
    }

    fn position(&self) -> Duration {
        let frame = self.playhead.cursor.load(Ordering::Acquire);
        Duration::from_secs_f64(frame as f64 / f64::from(self.source_rate))
    }

    fn pass(&self) -> u64 {
        self.playhead.pass.load(Ordering::Acquire)
    }
}

/// Maps clip frames onto device frames. Channels are matched by index with
/// the last clip channel repeated; rates by nearest source frame.
struct Renderer {
    audio: PlayableAudio,
    // Source frames advanced per device frame.
    step: f64,
    out_channels: usize,
    session: SessionId,
    sink: Arc<dyn EventSink>,
}

impl Renderer {
    fn new(
        audio: PlayableAudio,
        device_rate: u32,
        device_channels: u16,
        session: SessionId,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            step: f64::from(audio.format.sample_rate) / f64::from(device_rate.max(1)),
            out_channels: usize::from(device_channels.max(1)),
            audio,
            session,
            sink,
        }
    }

    fn write<T>(&self, output: &mut [T], playhead: &Playhead)
    where
        T: Sample + SizedSample + FromSample<i16>,
    {
        if !playhead.playing.load(Ordering::Acquire) {
            output.fill(T::EQUILIBRIUM);
            return;
        }

        let in_channels = usize::from(self.audio.format.channels.max(1));
        let total_frames = self.audio.frames();
        let start = playhead.cursor.load(Ordering::Acquire);

        let mut frames = 0;
        for (i, frame) in output.chunks_mut(self.out_channels).enumerate() {
            frames = i + 1;
            let source = start + (i as f64 * self.step) as usize;
            if source >= total_frames {
                frame.fill(T::EQUILIBRIUM);
                continue;
            }
            for (c, out) in frame.iter_mut().enumerate() {
                let sample = self.audio.samples[source * in_channels + c.min(in_channels - 1)];
                *out = T::from_sample(sample);
            }
        }

        let advanced = (start + (frames as f64 * self.step).round() as usize).min(total_frames);
        playhead.cursor.store(advanced, Ordering::Release);

        if advanced >= total_frames && !playhead.ended.swap(true, Ordering::AcqRel) {
            self.sink.send(AudioEvent::PlaybackEnded {
                clip: self.session,
                pass: playhead.pass.load(Ordering::Acquire),
            });
        }
    }
}
