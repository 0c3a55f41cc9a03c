// Re-export from sub-crates
pub use voxclip_audio::{
    AcquisitionError, CaptureSession, Clip, CpalInput, CpalOutput, PlaybackController,
    PlaybackError,
};
pub use voxclip_core::{
    APP_NAME, APP_NAME_PRETTY, AudioEvent, Config, ConfigManager, DEFAULT_LOG_LEVEL,
    PlaybackStatus, SessionId, SessionStatus, Transition, format_time,
};
pub use voxclip_upload::{HttpUploadConfig, HttpUploader, UploadError, UploadReceipt, Uploader};

// App-specific modules
pub mod config_ext;
pub mod event;
pub mod icon;
pub mod notify;
pub mod upload;
pub mod widget;

// Version from this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
