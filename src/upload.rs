use std::sync::Arc;
use std::time::Instant;

use tao::event_loop::EventLoopProxy;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use voxclip_core::Config;
use voxclip_upload::{HttpUploadConfig, HttpUploader, UploadError, Uploader};

use crate::event::VoxclipEvent;
use crate::widget::{UploadOutcome, UploadRequest};

type FinishedFn = dyn Fn(UploadOutcome) + Send + Sync + 'static;

/// Runs uploads off the event loop thread. Each request is sent once and
/// its outcome is handed to the completion callback.
pub struct UploadPipeline {
    runtime: Runtime,
    uploader: Option<Arc<dyn Uploader>>,
    on_finished: Arc<FinishedFn>,
}

impl UploadPipeline {
    /// Create a pipeline. Without an uploader every submission fails with
    /// [`UploadError::NoEndpoint`].
    pub fn new(
        uploader: Option<Arc<dyn Uploader>>,
        on_finished: impl Fn(UploadOutcome) + Send + Sync + 'static,
    ) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        Ok(Self {
            runtime,
            uploader,
            on_finished: Arc::new(on_finished),
        })
    }

    /// Build the HTTP uploader from config and post outcomes to the event
    /// loop.
    pub fn from_config(
        config: &Config,
        event_sender: EventLoopProxy<VoxclipEvent>,
    ) -> anyhow::Result<Self> {
        let uploader: Option<Arc<dyn Uploader>> = match config.upload_url() {
            Some(url) => {
                let http = HttpUploadConfig::new(url).with_timeout(config.upload_timeout());
                Some(Arc::new(HttpUploader::new(http)?))
            }
            None => None,
        };

        let event_sender = parking_lot::Mutex::new(event_sender);
        Self::new(uploader, move |outcome| {
            event_sender
                .lock()
                .send_event(VoxclipEvent::UploadFinished(outcome))
                .ok();
        })
    }

    /// Submit a packaged clip. Non-blocking.
    pub fn submit(&self, request: UploadRequest) {
        info!(
            session = %request.session,
            bytes = request.audio.len(),
            bytes_mb = request.audio.len() as f64 / (1024.0 * 1024.0),
            mime_type = request.mime_type,
            "audio submitted for upload"
        );

        let on_finished = self.on_finished.clone();
        let Some(uploader) = self.uploader.clone() else {
            warn!("upload requested but no upload_url is configured");
            on_finished(UploadOutcome {
                session: request.session,
                result: Err(UploadError::NoEndpoint.to_string()),
            });
            return;
        };

        self.runtime.spawn(async move {
            let before = Instant::now();
            let result = uploader
                .upload(request.audio, request.mime_type, request.filename)
                .await;
            info!(
                uploader = uploader.name(),
                duration = ?before.elapsed(),
                ok = result.is_ok(),
                "upload finished"
            );
            on_finished(UploadOutcome {
                session: request.session,
                result: result.map_err(|e| e.to_string()),
            });
        });
    }
}
