//! Multipart upload helper
//!
//! Streams a file part, preceded by optional form fields, as a
//! `multipart/form-data` body with progress reporting and cancellation.

mod multipart;
mod progress;

pub use multipart::{upload_file, MultipartUpload, UploadSource, DEFAULT_CHUNK_SIZE};
pub use progress::{ProgressCallback, ProgressStream};
