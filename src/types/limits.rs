//! Client-side upload limits.
//!
//! Both checks run before any network call.

use std::path::Path;

/// Maximum upload size: 100 MiB.
pub const MAX_FILE_SIZE: u64 = 104_857_600;

/// Accepted MIME types and the file extensions that map to them.
pub const SUPPORTED_FILE_TYPES: &[(&str, &[&str])] = &[
    ("application/pdf", &["pdf"]),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        &["docx"],
    ),
    ("text/plain", &["txt"]),
    ("text/markdown", &["md"]),
    ("application/msword", &["doc"]),
    ("text/html", &["html"]),
    ("application/json", &["json"]),
    ("text/javascript", &["js"]),
    ("text/typescript", &["ts", "tsx"]),
    ("text/css", &["css"]),
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/png", &["png"]),
    ("image/gif", &["gif"]),
    ("image/webp", &["webp"]),
];

/// Returns true if `size` fits the upload limit.
pub fn is_within_size_limit(size: u64, limit: u64) -> bool {
    size <= limit
}

/// Looks up the MIME type registered for a file name's extension.
pub fn mime_for_name(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();

    SUPPORTED_FILE_TYPES
        .iter()
        .find(|(_, extensions)| extensions.contains(&extension.as_str()))
        .map(|(mime, _)| *mime)
}

/// Returns true if the MIME type is on the allow-list.
///
/// Parameters such as `; charset=utf-8` are ignored.
pub fn is_supported_mime(mime_type: &str) -> bool {
    let Ok(parsed) = mime_type.parse::<mime::Mime>() else {
        return false;
    };
    let essence = parsed.essence_str();

    SUPPORTED_FILE_TYPES
        .iter()
        .any(|(supported, _)| supported.eq_ignore_ascii_case(essence))
}

/// Returns true if a file with this name (and optional declared MIME type)
/// may be uploaded.
///
/// A recognized extension is enough; otherwise the declared type decides.
pub fn is_supported(name: &str, mime_type: Option<&str>) -> bool {
    mime_for_name(name).is_some() || mime_type.is_some_and(is_supported_mime)
}
