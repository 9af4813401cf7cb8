//! Name/MIME validation and the deduplication-eligible extension set (spec §4.5).

use crate::error::CoreError;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Extensions refused outright regardless of declared MIME type.
const DENIED_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "ps1", "vbs", "vbe", "jse", "wsf", "wsh", "msc", "pif", "scr", "reg",
    "dll", "com", "msi", "hta", "cpl", "inf", "lnk",
];

/// MIME prefixes/exact values accepted for upload (images, documents, text,
/// archives, audio/video, code, fonts, generic binary).
const ALLOWED_MIME_PREFIXES: &[&str] = &[
    "image/", "audio/", "video/", "font/", "text/",
];

const ALLOWED_MIME_EXACT: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/zip",
    "application/x-tar",
    "application/gzip",
    "application/x-7z-compressed",
    "application/x-rar-compressed",
    "application/json",
    "application/xml",
    "application/javascript",
    "application/x-yaml",
    "application/octet-stream",
];

/// File extensions (lowercase, no leading dot) eligible for the
/// dedup-on-upload policy (spec §4.5).
static DEDUP_EXTENSIONS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "md", "csv", "jpg", "jpeg",
        "png", "gif", "webp", "svg", "bmp",
    ]
    .into_iter()
    .collect()
});

/// Validate a file/folder name: path-safe, no control characters, and not
/// the literal `..` (spec §3 File record invariants).
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("name must not be empty".to_string()));
    }
    if trimmed.len() > 255 {
        return Err(CoreError::Validation("name must be at most 255 characters".to_string()));
    }
    if trimmed == ".." || trimmed == "." {
        return Err(CoreError::Validation("name must not be a path segment".to_string()));
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(CoreError::Validation("name must not contain path separators".to_string()));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(CoreError::Validation("name must not contain control characters".to_string()));
    }
    let ext = extension_of(trimmed);
    if let Some(ext) = ext {
        if DENIED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(CoreError::Validation(format!("file extension .{ext} is not permitted")));
        }
    }
    Ok(())
}

/// Validate a declared MIME type against the allow-list.
pub fn validate_mime(mime_type: &str) -> Result<(), CoreError> {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    if ALLOWED_MIME_EXACT.contains(&mime_type.as_str())
        || ALLOWED_MIME_PREFIXES.iter().any(|p| mime_type.starts_with(p))
    {
        return Ok(());
    }
    Err(CoreError::Validation(format!("mime type {mime_type} is not permitted")))
}

/// Lowercase file extension without the leading dot, if any.
pub fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Whether `name`'s extension is eligible for the dedup-on-upload policy.
pub fn is_dedup_eligible(name: &str) -> bool {
    extension_of(name)
        .map(|ext| DEDUP_EXTENSIONS.contains(ext.as_str()))
        .unwrap_or(false)
}

/// Validate the `^[0-9a-f]{64}$` content hash wire format.
pub fn validate_content_hash(hash: &str) -> Result<(), CoreError> {
    if hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        Ok(())
    } else {
        Err(CoreError::Validation(
            "content hash must be 64 lowercase hex characters".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_dotdot() {
        assert!(validate_name("..").is_err());
    }

    #[test]
    fn rejects_control_chars() {
        assert!(validate_name("foo\nbar.txt").is_err());
    }

    #[test]
    fn rejects_denied_extension() {
        assert!(validate_name("installer.exe").is_err());
    }

    #[test]
    fn accepts_plain_name() {
        assert!(validate_name("report.pdf").is_ok());
    }

    #[test]
    fn mime_allow_list() {
        assert!(validate_mime("image/png").is_ok());
        assert!(validate_mime("application/pdf").is_ok());
        assert!(validate_mime("application/x-msdownload").is_err());
    }

    #[test]
    fn dedup_eligibility() {
        assert!(is_dedup_eligible("photo.JPG"));
        assert!(is_dedup_eligible("notes.md"));
        assert!(!is_dedup_eligible("archive.zip"));
    }

    #[test]
    fn content_hash_format() {
        assert!(validate_content_hash(&"a".repeat(64)).is_ok());
        assert!(validate_content_hash(&"A".repeat(64)).is_err());
        assert!(validate_content_hash("abcd").is_err());
    }
}
