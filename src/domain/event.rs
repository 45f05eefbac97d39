use chrono::{DateTime, Utc};

/// A message delivered by a live subscription.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub message_id: i32,
    pub sender: Option<String>,
    /// Platform-assigned send time.
    pub timestamp: DateTime<Utc>,
    pub media: Option<MediaPayload>,
    pub text: Option<String>,
}

impl InboundEvent {
    /// Caption text worth persisting, if any.
    pub fn caption(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub kind: MediaKind,
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Animation,
    Document,
    Audio,
    Voice,
    VideoNote,
    Sticker,
}

impl MediaKind {
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Animation => "animation",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Voice => "voice",
            MediaKind::VideoNote => "video_note",
            MediaKind::Sticker => "sticker",
        }
    }

    /// Extension used when neither the payload nor the server path carries one.
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Photo => ".jpg",
            MediaKind::Video | MediaKind::Animation | MediaKind::VideoNote => ".mp4",
            MediaKind::Audio => ".mp3",
            MediaKind::Voice => ".oga",
            MediaKind::Sticker => ".webp",
            MediaKind::Document => "",
        }
    }
}

/// Subscription predicate: origin chat and sender identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub chat_id: i64,
    pub sender_username: String,
}

impl EventFilter {
    pub fn matches(&self, chat_id: i64, sender: Option<&str>) -> bool {
        chat_id == self.chat_id
            && sender.is_some_and(|name| name.eq_ignore_ascii_case(&self.sender_username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_requires_chat_and_sender() {
        let filter = EventFilter {
            chat_id: -100,
            sender_username: "media_bot".into(),
        };
        assert!(filter.matches(-100, Some("Media_Bot")));
        assert!(!filter.matches(-101, Some("media_bot")));
        assert!(!filter.matches(-100, Some("someone_else")));
        assert!(!filter.matches(-100, None));
    }

    #[test]
    fn empty_text_is_not_a_caption() {
        let mut event = InboundEvent {
            chat_id: 1,
            message_id: 2,
            sender: None,
            timestamp: Utc::now(),
            media: None,
            text: Some(String::new()),
        };
        assert_eq!(event.caption(), None);
        event.text = Some("hello".into());
        assert_eq!(event.caption(), Some("hello"));
    }
}
