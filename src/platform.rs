use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    domain::{Conversation, EventFilter, InboundEvent},
    infrastructure::shutdown::ShutdownListener,
};

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Stream of filtered events; closes when the subscription stops.
pub type EventStream = mpsc::Receiver<InboundEvent>;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),
    #[error("media download failed: {0}")]
    Download(#[from] teloxide::DownloadError),
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("conversation registry failed: {0}")]
    Registry(#[from] sqlx::Error),
    #[error("update dispatcher crashed: {0}")]
    Dispatcher(#[from] tokio::task::JoinError),
    #[error("message {0} carries no media")]
    NoMedia(i32),
    #[error("{0}")]
    Other(String),
}

/// Capabilities the workflows need from the chat client.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Every conversation known to the account, in platform order.
    async fn conversations(&self) -> PlatformResult<Vec<Conversation>>;

    /// Starts delivering events that match `filter` until `shutdown` fires.
    async fn subscribe(
        &self,
        filter: EventFilter,
        shutdown: ShutdownListener,
    ) -> PlatformResult<EventStream>;

    /// Writes the event's media into `folder` under its native name and
    /// returns the written path.
    async fn download_media(&self, event: &InboundEvent, folder: &Path)
        -> PlatformResult<PathBuf>;

    async fn send_text(&self, conversation: &Conversation, text: &str) -> PlatformResult<()>;

    /// Releases the connection. Safe to call more than once. Reports a
    /// subscription that died on its own since it was started.
    async fn disconnect(&self) -> PlatformResult<()>;
}
