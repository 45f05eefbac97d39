use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::{sync::mpsc, time::Instant};

use crate::{
    domain::{Conversation, EventFilter, InboundEvent, MediaKind, MediaPayload},
    infrastructure::shutdown::ShutdownListener,
    platform::{ChatPlatform, EventStream, PlatformError, PlatformResult},
};

/// In-memory platform: fixed conversations, a pre-loaded event queue,
/// recorded sends and downloads.
#[derive(Default)]
pub struct FakePlatform {
    conversations: Vec<Conversation>,
    queued_events: Mutex<Vec<InboundEvent>>,
    failing_texts: Mutex<HashSet<String>>,
    disconnect_failure: Mutex<Option<String>>,
    pub filters: Mutex<Vec<EventFilter>>,
    pub sent: Mutex<Vec<(i64, String, Instant)>>,
    pub downloads: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl FakePlatform {
    pub fn new(conversations: Vec<Conversation>) -> Self {
        Self {
            conversations,
            ..Default::default()
        }
    }

    pub fn with_events(self, events: Vec<InboundEvent>) -> Self {
        *self.queued_events.lock() = events;
        self
    }

    pub fn fail_on(self, text: &str) -> Self {
        self.failing_texts.lock().insert(text.to_string());
        self
    }

    /// Makes `disconnect` report a dead subscription.
    pub fn fail_disconnect(self, reason: &str) -> Self {
        *self.disconnect_failure.lock() = Some(reason.to_string());
        self
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, text, _)| text.clone()).collect()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn conversations(&self) -> PlatformResult<Vec<Conversation>> {
        Ok(self.conversations.clone())
    }

    async fn subscribe(
        &self,
        filter: EventFilter,
        _shutdown: ShutdownListener,
    ) -> PlatformResult<EventStream> {
        let events = std::mem::take(&mut *self.queued_events.lock());
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            if filter.matches(event.chat_id, event.sender.as_deref()) {
                tx.try_send(event)
                    .map_err(|err| PlatformError::Other(err.to_string()))?;
            }
        }
        self.filters.lock().push(filter);
        Ok(rx)
    }

    async fn download_media(
        &self,
        event: &InboundEvent,
        folder: &Path,
    ) -> PlatformResult<PathBuf> {
        let media = event
            .media
            .as_ref()
            .ok_or(PlatformError::NoMedia(event.message_id))?;
        let name = media
            .file_name
            .clone()
            .unwrap_or_else(|| format!("{}_{}.bin", media.kind.label(), event.message_id));
        let path = folder.join(name);
        tokio::fs::write(&path, media.file_id.as_bytes()).await?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(path)
    }

    async fn send_text(&self, conversation: &Conversation, text: &str) -> PlatformResult<()> {
        if self.failing_texts.lock().contains(text) {
            return Err(PlatformError::Other(format!("send of {text} rejected")));
        }
        self.sent
            .lock()
            .push((conversation.id, text.to_string(), Instant::now()));
        Ok(())
    }

    async fn disconnect(&self) -> PlatformResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.disconnect_failure.lock().clone() {
            return Err(PlatformError::Other(reason));
        }
        Ok(())
    }
}

pub fn sent_at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
        .single()
        .expect("valid timestamp")
}

pub fn media_event(message_id: i32, file_name: Option<&str>, text: Option<&str>) -> InboundEvent {
    InboundEvent {
        chat_id: -100,
        message_id,
        sender: Some("media_bot".to_string()),
        timestamp: sent_at(2024, 3, 9, 14, 5, 7),
        media: Some(MediaPayload {
            kind: MediaKind::Video,
            file_id: format!("file-{message_id}"),
            file_name: file_name.map(str::to_string),
            mime_type: Some("video/mp4".to_string()),
        }),
        text: text.map(str::to_string),
    }
}

/// A supergroup message from `@Media_Bot` sent at 2024-03-09 16:00:00 UTC.
/// Keys in `fields` are added to it; a `null` value removes the key.
pub fn telegram_message(fields: serde_json::Value) -> teloxide::types::Message {
    let mut message = serde_json::json!({
        "message_id": 4821,
        "date": 1_710_000_000,
        "chat": { "id": -100, "title": "media", "type": "supergroup" },
        "from": {
            "id": 7,
            "is_bot": true,
            "first_name": "Media",
            "username": "Media_Bot"
        }
    });
    if let (Some(base), serde_json::Value::Object(extra)) = (message.as_object_mut(), fields) {
        for (key, value) in extra {
            if value.is_null() {
                base.remove(&key);
            } else {
                base.insert(key, value);
            }
        }
    }
    serde_json::from_value(message).expect("valid telegram message")
}
