//! Validation of uploaded file metadata.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{AppError, FieldErrors};

const MIB: u64 = 1024 * 1024;

/// What the client says it is uploading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpload {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
}

/// Limits an upload must respect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    pub max_size_bytes: u64,
    pub allowed_mime_types: Vec<String>,
    /// Lowercase, without the leading dot
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: 10 * MIB,
            allowed_mime_types: ["image/jpeg", "image/png", "image/gif", "image/webp", "application/pdf"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_extensions: ["jpg", "jpeg", "png", "gif", "webp", "pdf"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// The first rule an upload broke.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UploadError {
    #[error("File size exceeds maximum of {max_mb}MB")]
    TooLarge { max_mb: f64 },

    #[error("File type {0} is not allowed")]
    MimeTypeNotAllowed(String),

    #[error("File extension .{0} is not allowed")]
    ExtensionNotAllowed(String),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let message = err.to_string();
        let mut fields = FieldErrors::new();
        fields.insert("file".to_string(), vec![message.clone()]);
        AppError::validation(message, Some(fields))
    }
}

/// Check size, then MIME type, then extension. Stops at the first failure.
pub fn validate_file_upload(file: &FileUpload, policy: &UploadPolicy) -> Result<(), UploadError> {
    if file.size > policy.max_size_bytes {
        return Err(UploadError::TooLarge {
            max_mb: policy.max_size_bytes as f64 / MIB as f64,
        });
    }

    if !policy.allowed_mime_types.contains(&file.mime_type) {
        return Err(UploadError::MimeTypeNotAllowed(file.mime_type.clone()));
    }

    // a name without a dot is treated as all extension
    let extension = file
        .name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    if extension.is_empty() || !policy.allowed_extensions.contains(&extension) {
        return Err(UploadError::ExtensionNotAllowed(extension));
    }

    Ok(())
}
