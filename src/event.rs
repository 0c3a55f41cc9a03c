//! Application events for the tao event loop.

use parking_lot::Mutex;
use tao::event_loop::EventLoopProxy;
use voxclip_core::{AudioEvent, EventSink};

use crate::widget::UploadOutcome;

/// Events for the tao event loop, extending the core AudioEvent.
#[derive(Debug, Clone)]
pub enum VoxclipEvent {
    /// A capture or playback stream needs attention
    Audio(AudioEvent),
    /// An upload attempt finished
    UploadFinished(UploadOutcome),
}

/// Forwards audio events from device threads into the event loop.
pub struct ProxySink {
    proxy: Mutex<EventLoopProxy<VoxclipEvent>>,
}

impl ProxySink {
    pub fn new(proxy: EventLoopProxy<VoxclipEvent>) -> Self {
        Self {
            proxy: Mutex::new(proxy),
        }
    }
}

impl EventSink for ProxySink {
    fn send(&self, event: AudioEvent) {
        // Fails only once the event loop has exited.
        self.proxy.lock().send_event(VoxclipEvent::Audio(event)).ok();
    }
}
