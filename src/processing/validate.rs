//! Input checks applied before any remote call.

use super::types::ValidationError;
use sha2::{Digest, Sha256};

/// Trim a user-supplied filename down to its final path component.
///
/// Browsers and the CLI may hand over full paths; the remote display name is always the bare
/// filename.
pub fn normalize_filename(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let name = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed).trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Reject uploads that are unnamed, empty, or larger than `max_bytes`.
pub fn validate_upload(
    filename: &str,
    size: usize,
    max_bytes: usize,
) -> Result<(), ValidationError> {
    if filename.trim().is_empty() {
        return Err(ValidationError::MissingFilename);
    }
    if size == 0 {
        return Err(ValidationError::EmptyFile {
            filename: filename.to_string(),
        });
    }
    if size > max_bytes {
        return Err(ValidationError::TooLarge {
            filename: filename.to_string(),
            size,
            max: max_bytes,
        });
    }
    Ok(())
}

/// Reject blank questions.
pub fn validate_question(question: &str) -> Result<&str, ValidationError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyQuestion)
    } else {
        Ok(trimmed)
    }
}

/// Guess a MIME type from the filename extension, defaulting to `application/octet-stream`.
pub fn detect_mime_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Hex-encoded SHA-256 of the file content.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
