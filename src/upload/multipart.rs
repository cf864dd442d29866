//! `multipart/form-data` upload bodies

use super::progress::{ProgressCallback, ProgressStream};
use crate::error::{Error, Result};
use crate::http::{Request, RequestExecutor, RequestOptions, Response};
use crate::types::ContentKind;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Default chunk size for streamed file content
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Where the file part's content comes from
pub enum UploadSource {
    /// In-memory content
    Bytes(Bytes),
    /// A file on disk; its size is read from metadata
    File(PathBuf),
    /// Any async reader; the size must be given
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl std::fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadSource::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            UploadSource::File(path) => f.debug_tuple("File").field(path).finish(),
            UploadSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// A file upload with optional extra form fields
pub struct MultipartUpload {
    field_name: String,
    file_name: String,
    content_type: String,
    source: UploadSource,
    size: Option<u64>,
    form_fields: Vec<(String, String)>,
    chunk_size: usize,
    progress: Option<ProgressCallback>,
}

impl MultipartUpload {
    /// Upload `source` as the file part `field_name` named `file_name`
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        source: UploadSource,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            content_type: DEFAULT_FILE_CONTENT_TYPE.to_string(),
            source,
            size: None,
            form_fields: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: None,
        }
    }

    /// Upload a file from disk, using its file name
    pub fn from_path(field_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(field_name, file_name, UploadSource::File(path))
    }

    /// Set the file part's content type
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Declare the content size
    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Add a plain form field sent before the file part
    #[must_use]
    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_fields.push((name.into(), value.into()));
        self
    }

    /// Set the chunk size used for progress reporting
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Report progress after every chunk
    #[must_use]
    pub fn on_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Encode into a streamed body. Returns the stream, the content type
    /// with boundary, and the exact body length.
    pub async fn into_body(
        self,
        cancel: CancellationToken,
    ) -> Result<(BoxStream<'static, Result<Bytes>>, String, u64)> {
        if self.field_name.is_empty() {
            return Err(Error::invalid_request("multipart field name must not be empty"));
        }
        if self.file_name.is_empty() {
            return Err(Error::invalid_request("multipart file name must not be empty"));
        }

        let boundary = format!("jamfpro-{}", Uuid::new_v4().simple());
        let chunk_size = self.chunk_size;

        let (content, size): (BoxStream<'static, Result<Bytes>>, u64) = match self.source {
            UploadSource::Bytes(bytes) => {
                let size = bytes.len() as u64;
                let chunks: Vec<Result<Bytes>> = (0..bytes.len())
                    .step_by(chunk_size)
                    .map(|start| Ok(bytes.slice(start..(start + chunk_size).min(bytes.len()))))
                    .collect();
                (stream::iter(chunks).boxed(), size)
            }
            UploadSource::File(path) => {
                let file = tokio::fs::File::open(&path).await.map_err(|e| {
                    Error::invalid_request(format!("cannot open {}: {e}", path.display()))
                })?;
                let size = match self.size {
                    Some(size) => size,
                    None => file.metadata().await?.len(),
                };
                let reader = ReaderStream::with_capacity(file, chunk_size).map_err(Error::from);
                (reader.boxed(), size)
            }
            UploadSource::Reader(reader) => {
                let size = self.size.ok_or_else(|| {
                    Error::invalid_request("size is required when uploading from a reader")
                })?;
                let reader = ReaderStream::with_capacity(reader, chunk_size).map_err(Error::from);
                (reader.boxed(), size)
            }
        };

        let mut head = String::new();
        for (name, value) in &self.form_fields {
            head.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{value}\r\n",
                escape_param(name)
            ));
        }
        head.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            escape_param(&self.field_name),
            escape_param(&self.file_name),
            self.content_type
        ));
        let tail = format!("\r\n--{boundary}--\r\n");

        let length = head.len() as u64 + size + tail.len() as u64;
        let content = ProgressStream::new(content, size, self.progress, cancel);
        let body = stream::once(async move { Ok::<_, Error>(Bytes::from(head)) })
            .chain(content)
            .chain(stream::once(async move { Ok::<_, Error>(Bytes::from(tail)) }))
            .boxed();

        Ok((
            body,
            format!("multipart/form-data; boundary={boundary}"),
            length,
        ))
    }
}

impl std::fmt::Debug for MultipartUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartUpload")
            .field("field_name", &self.field_name)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("source", &self.source)
            .field("size", &self.size)
            .field("form_fields", &self.form_fields.len())
            .finish_non_exhaustive()
    }
}

/// POST a multipart upload through the executor.
///
/// The body is streamed once and never replayed, so transient failures are
/// returned instead of retried. Cancelling `options.cancel` aborts the
/// stream with [`Error::Cancelled`].
pub async fn upload_file(
    executor: &RequestExecutor,
    path: &str,
    upload: MultipartUpload,
    options: RequestOptions,
) -> Result<Response> {
    let cancel = options.cancel.clone().unwrap_or_default();
    let file_name = upload.file_name.clone();
    let (body, content_type, length) = upload.into_body(cancel.clone()).await?;

    debug!(endpoint = path, file = %file_name, bytes = length, "Starting upload");
    let request = Request::post(path)
        .stream_body(ContentKind::Multipart, content_type, body, Some(length))
        .with_options(options)
        .cancel(cancel);

    let response = executor.execute(request).await?;
    info!(endpoint = path, file = %file_name, bytes = length, "Upload complete");
    Ok(response)
}

/// Quote-safe form parameter value
fn escape_param(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
