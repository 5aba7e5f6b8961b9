//! Media type constants and extension-based content type lookup.

use std::path::Path;

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";
pub const TEXT_HTML: &str = "text/html";
pub const TEXT_HTML_UTF8: &str = "text/html; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_X_WWW_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

/// Guess a content type from a file extension.
///
/// Unknown or missing extensions map to `application/octet-stream`.
pub fn from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("html" | "htm") => TEXT_HTML_UTF8,
        Some("txt") => TEXT_PLAIN_UTF8,
        Some("css") => "text/css",
        Some("js" | "mjs") => "text/javascript",
        Some("json") => APPLICATION_JSON,
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("wasm") => "application/wasm",
        _ => APPLICATION_OCTET_STREAM,
    }
}

/// Compare a `Content-Type` header against a bare media type, ignoring
/// parameters such as `charset`.
pub fn matches(content_type: Option<&str>, media_type: &str) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case(media_type))
        .unwrap_or(false)
}
