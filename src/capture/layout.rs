use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

const FOLDER_TIME_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";
const CAPTION_EXTENSION: &str = "txt";

/// `{send time as YYYY_MM_DD_HH_MM_SS}_{message id}`.
pub fn artifact_folder_name(timestamp: DateTime<Utc>, message_id: i32) -> String {
    format!("{}_{}", timestamp.format(FOLDER_TIME_FORMAT), message_id)
}

/// Caption sibling of a downloaded media file: same base name, `.txt` extension.
/// A media file that is itself `.txt` gets `{stem}.caption.txt` instead.
pub fn caption_path(media_path: &Path) -> PathBuf {
    let is_text = media_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CAPTION_EXTENSION));
    if is_text {
        media_path.with_extension("caption.txt")
    } else {
        media_path.with_extension(CAPTION_EXTENSION)
    }
}
