use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;
use tokio::fs;

use crate::{
    domain::InboundEvent,
    infrastructure::shutdown::ShutdownListener,
    platform::{ChatPlatform, EventStream, PlatformError},
};

pub mod layout;

pub use layout::{artifact_folder_name, caption_path};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to create folder {}: {source}", path.display())]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to download media of message {message_id}: {source}")]
    Download {
        message_id: i32,
        #[source]
        source: PlatformError,
    },
    #[error("failed to write caption {}: {source}", path.display())]
    WriteCaption {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The event had no media; nothing was written.
    NoMedia,
    Captured(CapturedArtifact),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedArtifact {
    pub folder: PathBuf,
    pub media_path: PathBuf,
    pub caption_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub captured: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Persists media and captions of delivered events under `downloads_dir`.
pub struct CaptureLoop {
    platform: Arc<dyn ChatPlatform>,
    downloads_dir: PathBuf,
}

impl CaptureLoop {
    pub fn new(platform: Arc<dyn ChatPlatform>, downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            downloads_dir: downloads_dir.into(),
        }
    }

    /// Consumes events until the stream closes or shutdown fires. A failing
    /// event is logged and never ends the loop.
    pub async fn run(
        &self,
        mut events: EventStream,
        mut shutdown: ShutdownListener,
    ) -> CaptureSummary {
        let mut summary = CaptureSummary::default();
        tracing::info!(
            target: "capture",
            downloads = %self.downloads_dir.display(),
            "listening for new messages"
        );

        loop {
            let event = tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!(target: "capture", "shutdown requested; leaving capture loop");
                    break;
                }
                next = events.recv() => match next {
                    Some(event) => event,
                    None => {
                        tracing::info!(target: "capture", "event stream closed");
                        break;
                    }
                },
            };

            match self.handle_event(&event).await {
                Ok(CaptureOutcome::NoMedia) => summary.skipped += 1,
                Ok(CaptureOutcome::Captured(_)) => summary.captured += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::error!(
                        target: "capture",
                        message_id = event.message_id,
                        error = %err,
                        "failed to capture message"
                    );
                }
            }
        }

        tracing::info!(
            target: "capture",
            captured = summary.captured,
            skipped = summary.skipped,
            failed = summary.failed,
            "capture loop stopped"
        );
        summary
    }

    pub async fn handle_event(
        &self,
        event: &InboundEvent,
    ) -> Result<CaptureOutcome, CaptureError> {
        let Some(media) = &event.media else {
            tracing::info!(
                target: "capture",
                message_id = event.message_id,
                "message does not contain media"
            );
            return Ok(CaptureOutcome::NoMedia);
        };

        let folder = self
            .downloads_dir
            .join(artifact_folder_name(event.timestamp, event.message_id));
        fs::create_dir_all(&folder)
            .await
            .map_err(|source| CaptureError::CreateFolder {
                path: folder.clone(),
                source,
            })?;

        let media_path = self
            .platform
            .download_media(event, &folder)
            .await
            .map_err(|source| CaptureError::Download {
                message_id: event.message_id,
                source,
            })?;
        tracing::info!(
            target: "capture",
            message_id = event.message_id,
            kind = media.kind.label(),
            mime = media.mime_type.as_deref(),
            path = %media_path.display(),
            "downloaded media"
        );

        let caption_path = match event.caption() {
            Some(caption) => Some(write_caption(&media_path, caption).await?),
            None => None,
        };

        Ok(CaptureOutcome::Captured(CapturedArtifact {
            folder,
            media_path,
            caption_path,
        }))
    }
}

async fn write_caption(media_path: &Path, caption: &str) -> Result<PathBuf, CaptureError> {
    let path = caption_path(media_path);
    fs::write(&path, caption.as_bytes())
        .await
        .map_err(|source| CaptureError::WriteCaption {
            path: path.clone(),
            source,
        })?;
    tracing::info!(target: "capture", path = %path.display(), "saved caption");
    Ok(path)
}
