//! Checks applied to an uploaded query image before it is decoded.
//!
//! The declared Content-Type is not checked; decoding decides what is an
//! image.

use crate::error::ApiError;

const MB: usize = 1024 * 1024;

/// Upload cap used when nothing else is configured.
pub const DEFAULT_MAX_FILE_SIZE: usize = 25 * MB;

pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size <= max_size {
        return Ok(());
    }
    Err(ApiError::bad_request(format!(
        "Image too large: {} MB (limit {} MB)",
        size.div_ceil(MB),
        max_size / MB
    )))
}

/// Reduce a client-supplied filename to a safe base name
///
/// Directory components are dropped and only ASCII alphanumerics, `.`, `-`
/// and `_` are kept. Returns `None` when nothing usable remains.
pub fn sanitize_file_name(file_name: &str) -> Option<String> {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        None
    } else {
        Some(cleaned.to_string())
    }
}
