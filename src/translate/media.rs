//! URL and media-type utilities shared by the adapters' multimodal handling:
//! data-URL parsing, URL classification, extension -> MIME inference and the
//! audio/video format tables.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;

pub const OCTET_STREAM: &str = "application/octet-stream";
const DEFAULT_AUDIO_MIME: &str = "audio/wav";
const DEFAULT_VIDEO_MIME: &str = "video/mp4";

/// A parsed `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl<'a> {
    pub mime_type: &'a str,
    pub data: &'a str,
}

/// Where a content block's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource<'a> {
    /// Inline base64 from a data URL.
    Inline(DataUrl<'a>),
    /// An `http(s)://` or `file://` reference.
    Remote(&'a str),
    /// Relative paths, other schemes, and data URLs without a base64 marker.
    Unsupported,
}

/// Parse a base64 data URL.
///
/// Returns `None` when the URL is not a data URL, has no `,` separator, or
/// its header lacks the `;base64` marker: non-base64 data URLs are not
/// accepted as literal text.
pub fn parse_data_url(url: &str) -> Option<DataUrl<'_>> {
    let rest = strip_prefix_ignore_case(url, "data:")?;
    let (header, data) = rest.split_once(',')?;
    let mut params = header.split(';');
    let mime_type = params.next().unwrap_or_default().trim();
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return None;
    }
    Some(DataUrl {
        mime_type: if mime_type.is_empty() {
            OCTET_STREAM
        } else {
            mime_type
        },
        data,
    })
}

pub fn classify_url(url: &str) -> MediaSource<'_> {
    let url = url.trim();
    if strip_prefix_ignore_case(url, "data:").is_some() {
        return parse_data_url(url).map_or(MediaSource::Unsupported, MediaSource::Inline);
    }
    let remote = ["http://", "https://", "file://"]
        .iter()
        .any(|scheme| strip_prefix_ignore_case(url, scheme).is_some());
    if remote {
        MediaSource::Remote(url)
    } else {
        MediaSource::Unsupported
    }
}

/// Infer a MIME type from the file extension at the end of a URL's path.
/// Query strings and fragments are ignored; matching is case-insensitive.
pub fn mime_type_from_url(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let file_name = path.rsplit('/').next().unwrap_or_default();
    let (_, ext) = file_name.rsplit_once('.')?;
    mime_type_from_extension(ext)
}

pub fn mime_type_from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mpeg" | "mpg" => "video/mpeg",
        "avi" => "video/x-msvideo",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "webm" => "video/webm",
        "3gp" | "3gpp" => "video/3gpp",
        "mp3" => "audio/mp3",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "aiff" => "audio/aiff",
        "m4a" => "audio/mp4",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "xml" => "text/xml",
        "rtf" => "text/rtf",
        "json" => "application/json",
        "js" => "text/javascript",
        "py" => "text/x-python",
        _ => return None,
    };
    Some(mime)
}

/// MIME type for a file reference: an explicit `format` wins, then the URL's
/// extension, then `application/octet-stream`.
///
/// `format` may be a full MIME type (`video/mp4`) or a bare extension (`mp4`).
pub fn file_mime_type(url: &str, format: Option<&str>) -> String {
    if let Some(format) = format.map(str::trim).filter(|f| !f.is_empty()) {
        if format.contains('/') {
            return format.to_string();
        }
        if let Some(mime) = mime_type_from_extension(format) {
            return mime.to_string();
        }
    }
    mime_type_from_url(url).unwrap_or(OCTET_STREAM).to_string()
}

pub fn audio_mime_type(format: &str) -> &'static str {
    match format.trim().to_ascii_lowercase().as_str() {
        "wav" | "x-wav" => "audio/wav",
        "mp3" => "audio/mp3",
        "mpeg" => "audio/mpeg",
        "aac" => "audio/aac",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "aiff" | "aif" => "audio/aiff",
        "m4a" => "audio/mp4",
        "webm" => "audio/webm",
        "pcm" | "pcm16" => "audio/pcm",
        _ => DEFAULT_AUDIO_MIME,
    }
}

pub fn video_mime_type(format: &str) -> &'static str {
    match format.trim().to_ascii_lowercase().as_str() {
        "mp4" => "video/mp4",
        "mov" | "quicktime" => "video/quicktime",
        "mpeg" | "mpg" => "video/mpeg",
        "avi" => "video/x-msvideo",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "webm" => "video/webm",
        "3gp" | "3gpp" => "video/3gpp",
        _ => DEFAULT_VIDEO_MIME,
    }
}

/// Decode and re-encode base64 text. Returns `None` if it does not decode.
/// The decoded bytes live only for the duration of this call.
pub fn normalize_base64(data: &str) -> Option<String> {
    let trimmed = data.trim();
    let bytes = STANDARD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()?;
    Some(STANDARD.encode(bytes))
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
