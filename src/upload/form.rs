//! Inbound upload form parsing
//!
//! Reads the `file`, `chatId` and `caption` fields of a
//! `multipart/form-data` body with `multer`. The file is buffered only up to
//! the configured limit; past it chunks are counted and dropped so the
//! reported size stays exact.

use super::UploadError;
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::CONTENT_TYPE;
use hyper::Request;
use multer::{Field, Multipart};

pub const FILE_FIELD: &str = "file";
pub const CHAT_ID_FIELD: &str = "chatId";
pub const CAPTION_FIELD: &str = "caption";

/// Uploaded file part
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Filename as sent by the client, untouched
    pub filename: String,
    /// Total size of the part in bytes
    pub size: u64,
    /// File contents. Empty when `size` exceeded the read limit.
    pub data: Bytes,
}

/// Parsed upload form
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub file: Option<FilePart>,
    pub chat_id: Option<String>,
    pub caption: Option<String>,
}

/// Open a multipart reader over a request body
pub fn multipart_from_request<B>(req: Request<B>) -> Result<Multipart<'static>, UploadError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let boundary = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|content_type| multer::parse_boundary(content_type).ok())
        .ok_or_else(|| {
            UploadError::NoFile("request Content-Type isn't multipart/form-data".into())
        })?;

    Ok(Multipart::new(req.into_body().into_data_stream(), boundary))
}

/// Read the whole form.
///
/// Only the first `file` part that carries a non-empty filename counts as the
/// upload. Browsers send `filename=""` when no file was chosen. Unknown fields
/// are drained and ignored.
pub async fn read_upload_form(
    mut multipart: Multipart<'_>,
    max_file_bytes: u64,
) -> Result<UploadForm, UploadError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::NoFile(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD)
                if form.file.is_none() && field.file_name().is_some_and(|n| !n.is_empty()) =>
            {
                form.file = Some(read_file_part(&mut field, max_file_bytes).await?);
            }
            Some(CHAT_ID_FIELD) if form.chat_id.is_none() => {
                form.chat_id = Some(read_text(field).await?);
            }
            Some(CAPTION_FIELD) if form.caption.is_none() => {
                form.caption = Some(read_text(field).await?);
            }
            _ => drain(&mut field).await?,
        }
    }

    Ok(form)
}

async fn read_file_part(
    field: &mut Field<'_>,
    max_file_bytes: u64,
) -> Result<FilePart, UploadError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let mut size: u64 = 0;
    let mut buffer = BytesMut::new();

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| UploadError::ReadFailure(e.to_string()))?
    {
        size += chunk.len() as u64;
        if size <= max_file_bytes {
            buffer.extend_from_slice(&chunk);
        } else if !buffer.is_empty() {
            buffer = BytesMut::new();
        }
    }

    Ok(FilePart {
        filename,
        size,
        data: buffer.freeze(),
    })
}

async fn read_text(field: Field<'_>) -> Result<String, UploadError> {
    field
        .text()
        .await
        .map_err(|e| UploadError::NoFile(format!("malformed form field: {}", e)))
}

async fn drain(field: &mut Field<'_>) -> Result<(), UploadError> {
    while field
        .chunk()
        .await
        .map_err(|e| UploadError::NoFile(e.to_string()))?
        .is_some()
    {}
    Ok(())
}
