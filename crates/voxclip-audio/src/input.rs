//! Microphone capture through cpal.
//!
//! The input callback converts whatever the device produces into 16-bit PCM
//! and cuts it into fragments of roughly `chunk_interval`. Completed
//! fragments wait in a queue shared with the session; the callback only
//! posts a [`AudioEvent::ChunksReady`] notification so the session can drain
//! them from its own thread.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Host, Sample, SizedSample};
use parking_lot::Mutex;
use tracing::{error, info, warn};
use voxclip_core::{AudioEvent, EventSink, SessionId};

use crate::device::{AcquisitionError, AudioInput, InputStream, StreamFormat};

type Result<T> = std::result::Result<T, AcquisitionError>;

/// Fragments shared between the audio callback and the owning stream.
#[derive(Debug, Default)]
struct FragmentQueue {
    completed: VecDeque<Vec<u8>>,
    partial: Vec<u8>,
}

impl FragmentQueue {
    /// Moves the partial buffer into the completed queue. Returns whether
    /// there was anything to move.
    fn seal(&mut self) -> bool {
        if self.partial.is_empty() {
            return false;
        }
        let partial = mem::take(&mut self.partial);
        self.completed.push_back(partial);
        true
    }
}

type QueueHandle = Arc<Mutex<FragmentQueue>>;

pub struct CpalInput {
    host: Host,
    preferred_device: Option<String>,
    chunk_interval: Duration,
}

impl CpalInput {
    pub fn new(preferred_device: Option<String>, chunk_interval: Duration) -> Self {
        Self {
            host: cpal::default_host(),
            preferred_device,
            chunk_interval,
        }
    }

    fn select_device(&self) -> Result<cpal::Device> {
        if let Some(wanted) = self.preferred_device.as_deref() {
            let found = self
                .host
                .input_devices()
                .ok()
                .and_then(|mut devices| {
                    devices.find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                });
            match found {
                Some(device) => return Ok(device),
                None => warn!(device = wanted, "preferred input device not found, using default"),
            }
        }

        self.host
            .default_input_device()
            .ok_or(AcquisitionError::NoInputDevice)
    }
}

impl AudioInput for CpalInput {
    fn open(&self, session: SessionId, sink: Arc<dyn EventSink>) -> Result<Box<dyn InputStream>> {
        let device = self.select_device()?;
        let config = device.default_input_config()?;

        info!(
            device_name = %device.name().unwrap_or_else(|_| "unknown".into()),
            %session,
            "Recording from device"
        );

        let format = StreamFormat {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
        };
        let chunk_bytes = format.bytes_for(self.chunk_interval);
        let queue: QueueHandle = Arc::default();

        let err_sink = sink.clone();
        let err_fn = move |err: cpal::StreamError| {
            error!("an error occurred on stream: {}", err);
            err_sink.send(AudioEvent::CaptureError {
                session,
                message: err.to_string(),
            });
        };

        let queue_2 = queue.clone();
        let sink_2 = sink.clone();
        let stream = match config.sample_format() {
            cpal::SampleFormat::I8 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| {
                    write_input_data::<i8>(data, &queue_2, chunk_bytes, session, &sink_2)
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| {
                    write_input_data::<i16>(data, &queue_2, chunk_bytes, session, &sink_2)
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I32 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| {
                    write_input_data::<i32>(data, &queue_2, chunk_bytes, session, &sink_2)
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| {
                    write_input_data::<f32>(data, &queue_2, chunk_bytes, session, &sink_2)
                },
                err_fn,
                None,
            )?,
            sample_format => {
                return Err(AcquisitionError::SampleFormatNotSupported(format!(
                    "{:?}",
                    sample_format
                )));
            }
        };

        Ok(Box::new(CpalInputStream {
            stream,
            format,
            queue,
            session,
            sink,
        }))
    }
}

/// A live cpal input stream. Dropping it closes the device.
struct CpalInputStream {
    stream: cpal::Stream,
    format: StreamFormat,
    queue: QueueHandle,
    session: SessionId,
    sink: Arc<dyn EventSink>,
}

impl InputStream for CpalInputStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn start(&mut self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| AcquisitionError::Start(e.to_string()))
    }

    fn pause(&mut self) {
        if let Err(e) = self.stream.pause() {
            warn!(session = %self.session, "failed to pause input stream: {}", e);
        }
        if self.queue.lock().seal() {
            self.sink.send(AudioEvent::ChunksReady(self.session));
        }
    }

    fn resume(&mut self) {
        if let Err(e) = self.stream.play() {
            warn!(session = %self.session, "failed to resume input stream: {}", e);
        }
    }

    fn take_chunks(&mut self) -> Vec<Vec<u8>> {
        self.queue.lock().completed.drain(..).collect()
    }

    fn stop(&mut self) -> Vec<Vec<u8>> {
        // Pause and ignore errors, the stream is dropped on release anyway.
        self.stream.pause().ok();
        let mut queue = self.queue.lock();
        queue.seal();
        queue.completed.drain(..).collect()
    }

    fn release(self: Box<Self>) {
        info!(session = %self.session, "Releasing input device");
        drop(self);
    }
}

fn write_input_data<T>(
    input: &[T],
    queue: &QueueHandle,
    chunk_bytes: usize,
    session: SessionId,
    sink: &Arc<dyn EventSink>,
) where
    T: Sample + SizedSample,
    i16: FromSample<T>,
{
    let mut queue = queue.lock();
    for &sample in input.iter() {
        let sample = i16::from_sample(sample);
        queue.partial.extend_from_slice(&sample.to_le_bytes());
    }
    if queue.partial.len() >= chunk_bytes && queue.seal() {
        drop(queue);
        sink.send(AudioEvent::ChunksReady(session));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    fn channel_sink() -> (Arc<dyn EventSink>, mpsc::Receiver<AudioEvent>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(tx), rx)
    }

    #[test]
    fn test_write_input_data_cuts_fragments() {
        let queue: QueueHandle = Arc::default();
        let (sink, rx) = channel_sink();

        write_input_data::<i16>(&[1, 2], &queue, 6, SessionId(3), &sink);
        assert!(rx.try_recv().is_err());
        write_input_data::<i16>(&[3], &queue, 6, SessionId(3), &sink);
        assert_eq!(rx.try_recv().unwrap(), AudioEvent::ChunksReady(SessionId(3)));

        let mut queue = queue.lock();
        assert_eq!(queue.completed.len(), 1);
        assert_eq!(queue.completed[0], vec![1, 0, 2, 0, 3, 0]);
        assert!(queue.partial.is_empty());
        assert!(!queue.seal());
    }

    #[test]
    fn test_write_input_data_converts_floats() {
        let queue: QueueHandle = Arc::default();
        let (sink, _rx) = channel_sink();

        write_input_data::<f32>(&[0.0, 1.0, -1.0], &queue, 1024, SessionId(1), &sink);

        let queue = queue.lock();
        let samples: Vec<i16> = queue
            .partial
            .chunks_exact(2)
            .map(|p| i16::from_le_bytes([p[0], p[1]]))
            .collect();
        assert_eq!(samples[0], 0);
        assert!(samples[1] >= i16::MAX - 1);
        assert!(samples[2] <= -(i16::MAX - 1));
    }

    #[test]
    fn test_seal_keeps_order() {
        let mut queue = FragmentQueue::default();
        queue.partial.extend_from_slice(b"ab");
        assert!(queue.seal());
        queue.partial.extend_from_slice(b"cd");
        assert!(queue.seal());

        let order: Vec<Vec<u8>> = queue.completed.drain(..).collect();
        assert_eq!(order, vec![b"ab".to_vec(), b"cd".to_vec()]);
    }
}
