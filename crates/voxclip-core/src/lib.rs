//! Core types and configuration for voxclip.
//!
//! This crate provides platform-agnostic types that can be used across
//! all voxclip sub-crates.

mod config;
mod event;
mod state;
mod time;

pub use config::{Config, ConfigManager};
pub use event::{AudioEvent, EventSink};
pub use state::{PlaybackStatus, SessionId, SessionStatus, Transition};
pub use time::format_time;

/// Application name
pub const APP_NAME: &str = "voxclip";

/// Pretty application name for display
pub const APP_NAME_PRETTY: &str = "Voxclip";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";
