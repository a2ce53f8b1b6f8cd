use crate::config::AppConfig;
use anyhow::{Result, anyhow};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Strip parameters and lowercase, e.g. "IMAGE/JPEG; charset=x" -> "image/jpeg".
pub fn normalize_mime(content_type: &str) -> String {
    content_type
        .parse::<mime::Mime>()
        .map(|m| m.essence_str().to_ascii_lowercase())
        .unwrap_or_else(|_| {
            content_type
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase()
        })
}

/// Validates the declared MIME type against the configured allow-list and
/// returns the normalized form. This runs before any storage write.
pub fn validate_mime_type(content_type: &str, config: &AppConfig) -> Result<String> {
    let normalized = normalize_mime(content_type);

    if config.is_mime_allowed(&normalized) {
        return Ok(normalized);
    }

    Err(anyhow!(ValidationError {
        code: "INVALID_MIME_TYPE",
        message: format!(
            "MIME type '{}' is not allowed. Only images, audio, video, and PDF are accepted.",
            content_type
        ),
    }))
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<()> {
    if size == 0 {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_FILE",
            message: "File is empty".to_string(),
        }));
    }
    if size > max_size {
        return Err(anyhow!(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        }));
    }
    Ok(())
}

/// Magic-byte sniff: when the content is recognizable as a concrete type,
/// that detected type must itself pass the allow-list. Catches renamed
/// executables and archives smuggled under a media MIME.
pub fn validate_magic_bytes(data: &[u8], config: &AppConfig) -> Result<()> {
    if let Some(kind) = infer::get(data) {
        let detected = kind.mime_type();
        if !config.is_mime_allowed(detected) {
            return Err(anyhow!(ValidationError {
                code: "CONTENT_MISMATCH",
                message: format!("File content looks like '{}', which is not allowed", detected),
            }));
        }
    }
    Ok(())
}

/// Sanitizes a user-supplied display name: strips any path component and
/// replaces reserved characters. The storage key is server-generated and
/// never derived from this value.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        }));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == '/'
                || c == '\\'
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = sanitized.trim().trim_matches('.');
    if trimmed.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename contains no usable characters".to_string(),
        }));
    }

    Ok(trimmed.to_string())
}

/// Extension preserved from the display name, used to build readable
/// storage keys ("<uuid>.png").
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_normalization_and_allow_list() {
        let config = AppConfig::default();
        assert_eq!(
            validate_mime_type("IMAGE/JPEG; charset=binary", &config).unwrap(),
            "image/jpeg"
        );
        assert!(validate_mime_type("application/x-msdownload", &config).is_err());
        assert!(validate_mime_type("", &config).is_err());
    }

    #[test]
    fn size_limits() {
        assert!(validate_file_size(0, 100).is_err());
        assert!(validate_file_size(100, 100).is_ok());
        assert!(validate_file_size(101, 100).is_err());
    }

    #[test]
    fn magic_bytes_reject_disguised_archives() {
        let config = AppConfig::default();
        // ZIP local file header, declared or not, is not on the allow-list.
        let zip = [0x50, 0x4B, 0x03, 0x04, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(validate_magic_bytes(&zip, &config).is_err());

        // PNG signature passes.
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert!(validate_magic_bytes(&png, &config).is_ok());

        // Unrecognized content is left to the declared-MIME check.
        assert!(validate_magic_bytes(b"just some text", &config).is_ok());
    }

    #[test]
    fn filename_sanitization() {
        assert_eq!(
            sanitize_filename("../../etc/passwd").unwrap(),
            "passwd"
        );
        assert_eq!(
            sanitize_filename("my photo: final?.jpg").unwrap(),
            "my photo_ final_.jpg"
        );
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("...").is_err());
    }

    #[test]
    fn extension_extraction() {
        assert_eq!(file_extension("a.PNG").as_deref(), Some("png"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension("weird.!!!"), None);
    }
}
