//! Multipart upload parsing
//!
//! Extracts the query image from a `multipart/form-data` request. The image
//! is expected in a field named `image`; other fields are ignored.

use axum::extract::Multipart;

use crate::error::ApiError;
use crate::validation::validate_file_size;

/// Form field carrying the query image
pub const IMAGE_FIELD: &str = "image";

/// An uploaded image file
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// File data bytes
    pub data: Vec<u8>,
    /// Content-Type from the multipart field (if provided)
    pub content_type: Option<String>,
    /// Filename as sent by the client, possibly empty
    pub file_name: String,
}

impl ImageUpload {
    /// Read the `image` field from a multipart request
    ///
    /// # Errors
    /// - `No image uploaded` when the field is absent
    /// - `Empty filename` when the field carries no filename
    /// - size violations
    pub async fn from_multipart(
        multipart: &mut Multipart,
        max_file_size: usize,
    ) -> Result<Self, ApiError> {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {}", e)))?
        {
            if field.name() != Some(IMAGE_FIELD) {
                continue;
            }

            let file_name = field.file_name().unwrap_or_default().to_string();
            if file_name.trim().is_empty() {
                return Err(ApiError::bad_request("Empty filename"));
            }

            let content_type = field.content_type().map(|s| s.to_string());

            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?
                .to_vec();
            validate_file_size(data.len(), max_file_size)?;

            return Ok(Self {
                data,
                content_type,
                file_name,
            });
        }

        Err(ApiError::bad_request("No image uploaded"))
    }
}
