// Upload Preparation
// Turns a local file into a payload for the chosen content kind

use std::fs;
use std::io;
use std::path::Path;

use crate::models::{ContentKind, ContentPayload};

const MIME_TABLE: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// MIME type from the file extension; `application/octet-stream` when unknown.
pub fn guess_mime_type(path: &Path) -> &'static str {
    extension(path)
        .and_then(|ext| {
            MIME_TABLE
                .iter()
                .find(|(e, _)| *e == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or("application/octet-stream")
}

pub fn kind_for_path(path: &Path) -> Option<ContentKind> {
    let mime = guess_mime_type(path);
    if mime.starts_with("image/") {
        Some(ContentKind::Image)
    } else if mime.starts_with("video/") {
        Some(ContentKind::Video)
    } else if mime.starts_with("text/") {
        Some(ContentKind::Text)
    } else {
        None
    }
}

/// Read a file as a payload: UTF-8 text for the text kind, raw bytes otherwise.
/// Shape and MIME checks are left to the session controller.
pub fn load_payload(path: &Path, kind: ContentKind) -> io::Result<ContentPayload> {
    if kind == ContentKind::Text {
        return Ok(ContentPayload::Text(fs::read_to_string(path)?));
    }

    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("upload.{}", kind.as_str()));
    Ok(ContentPayload::file(name, guess_mime_type(path), bytes))
}
