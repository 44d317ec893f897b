//! Stateless helpers for handling untrusted input and secrets.

mod html;
mod secrets;
mod upload;
mod validators;

pub use html::{escape_html, has_sql_injection_patterns, sanitize_html};
pub use secrets::{generate_secure_token, mask_secret, secure_compare, DEFAULT_TOKEN_BYTES};
pub use upload::{validate_file_upload, FileUpload, UploadError, UploadPolicy};
pub use validators::{
    check_password, check_phone, check_strong_password, check_zip_code, normalize_email,
};
