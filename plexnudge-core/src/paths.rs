//! Helpers for destination-side path strings.
//!
//! Destination paths belong to the media server's filesystem, which may use
//! Windows separators even when this agent runs on Unix. They are handled as
//! strings with both separators recognized instead of as local `Path`s.

use std::path::Path;

/// File extensions treated as media payloads when deciding how to batch.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "ts", "m2ts",
];

/// Returns true when the path names a recognized media file.
pub fn is_media_file(path: &str) -> bool {
    match file_name(path).rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            MEDIA_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// Computes the batching key for a destination path.
///
/// Media files key on their parent directory so sibling episodes arriving
/// in a burst coalesce into one refresh; directories and unrecognized names
/// key on themselves.
pub fn batch_key(path: &str) -> String {
    if Path::new(path).is_file() || is_media_file(path) {
        parent(path).to_string()
    } else {
        path.to_string()
    }
}

/// Parent directory of a destination path, recognizing both separators.
/// Paths without any separator are their own parent.
pub fn parent(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    match trimmed.rfind(['/', '\\']) {
        Some(0) => &path[..1],
        Some(idx) => &trimmed[..idx],
        None => path,
    }
}

/// Normalizes separators to forward slashes for prefix comparison.
pub fn slash_normalized(path: &str) -> String {
    path.replace('\\', "/")
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
