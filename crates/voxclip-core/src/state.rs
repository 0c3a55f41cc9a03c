//! Recording and playback state types.

use std::fmt;

/// Identifies one Start..Stop recording take. Events produced by a capture
/// stream carry the id of the take that opened it so that late deliveries
/// from an older take can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "take-{}", self.0)
    }
}

/// The current state of the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// No take has been started, or the last start failed
    #[default]
    Idle,
    /// Microphone is held and audio is flowing
    Recording,
    /// Microphone is held but capture is suspended
    Paused,
    /// The last take was finalized into a clip
    Stopped,
}

impl SessionStatus {
    /// Whether a device handle is held in this state.
    pub fn is_live(&self) -> bool {
        matches!(self, SessionStatus::Recording | SessionStatus::Paused)
    }
}

/// The current state of clip playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Outcome of a state machine request. Requests made from a state that does
/// not permit them are ignored rather than reported as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Ignored,
}

impl Transition {
    pub fn applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }
}
