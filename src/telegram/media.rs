use std::path::Path;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::types::{FileMeta, Message};

use crate::domain::{MediaKind, MediaPayload};

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("valid filename regex"));

/// Media carried by a message, largest photo size for photos.
pub fn extract_media(msg: &Message) -> Option<MediaPayload> {
    if let Some(sizes) = msg.photo() {
        let largest = sizes.last()?;
        return Some(payload(MediaKind::Photo, &largest.file, None, None));
    }
    if let Some(video) = msg.video() {
        return Some(payload(
            MediaKind::Video,
            &video.file,
            video.file_name.clone(),
            video.mime_type.as_ref().map(ToString::to_string),
        ));
    }
    if let Some(animation) = msg.animation() {
        return Some(payload(
            MediaKind::Animation,
            &animation.file,
            animation.file_name.clone(),
            animation.mime_type.as_ref().map(ToString::to_string),
        ));
    }
    if let Some(document) = msg.document() {
        return Some(payload(
            MediaKind::Document,
            &document.file,
            document.file_name.clone(),
            document.mime_type.as_ref().map(ToString::to_string),
        ));
    }
    if let Some(audio) = msg.audio() {
        return Some(payload(
            MediaKind::Audio,
            &audio.file,
            audio.file_name.clone(),
            audio.mime_type.as_ref().map(ToString::to_string),
        ));
    }
    if let Some(voice) = msg.voice() {
        return Some(payload(
            MediaKind::Voice,
            &voice.file,
            None,
            voice.mime_type.as_ref().map(ToString::to_string),
        ));
    }
    if let Some(note) = msg.video_note() {
        return Some(payload(MediaKind::VideoNote, &note.file, None, None));
    }
    if let Some(sticker) = msg.sticker() {
        return Some(payload(MediaKind::Sticker, &sticker.file, None, None));
    }
    None
}

fn payload(
    kind: MediaKind,
    file: &FileMeta,
    file_name: Option<String>,
    mime_type: Option<String>,
) -> MediaPayload {
    MediaPayload {
        kind,
        file_id: file.id.0.clone(),
        file_name,
        mime_type,
    }
}

/// Local file name for a payload: its own name when it has one, otherwise
/// `{kind}_{send time}{ext}` with the extension of the server-side path.
pub fn native_file_name(
    payload: &MediaPayload,
    sent_at: DateTime<Utc>,
    server_path: &str,
) -> String {
    let own_name = payload
        .file_name
        .as_deref()
        .map(sanitize)
        .filter(|name| !name.is_empty());
    if let Some(name) = own_name {
        return name;
    }

    let extension = Path::new(server_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| payload.kind.default_extension().to_string());

    format!(
        "{}_{}{}",
        payload.kind.label(),
        sent_at.format("%Y-%m-%d_%H-%M-%S"),
        extension
    )
}

fn sanitize(name: &str) -> String {
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(name.trim(), "_");
    cleaned.trim_matches('.').to_string()
}
