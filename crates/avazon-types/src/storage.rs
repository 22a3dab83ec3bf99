//! Blob storage helpers shared by the blob store and the pipelines.

/// Maximum artifact size accepted for upload (200 MB).
pub const MAX_BLOB_SIZE_BYTES: usize = 200 * 1024 * 1024;

/// File extension (with leading dot) for a MIME type.
///
/// `image/jpeg` maps to `.jpg` rather than the registry's first entry
/// (`.jpe`). Unknown types map to `.bin`.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
        "image/png" => ".png",
        "image/webp" => ".webp",
        "image/gif" => ".gif",
        "audio/mpeg" | "audio/mp3" => ".mp3",
        "audio/wav" | "audio/x-wav" => ".wav",
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        _ => ".bin",
    }
}

/// MIME type guessed from a file name or URL path.
pub fn mime_for_name(name: &str) -> &'static str {
    let path = name.split(['?', '#']).next().unwrap_or(name);
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
