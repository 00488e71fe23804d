use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use tokio_util::io::ReaderStream;

use super::blocking;
use crate::api::response::{ApiError, FileMessage};
use crate::storage::models::FileDescriptor;
use crate::AppState;

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FileDescriptor>>, ApiError> {
    let files = blocking(move || state.storage.list()).await?;
    Ok(Json(files))
}

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileMessage>), ApiError> {
    let max_upload_size = state.storage.max_upload_size();
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(multipart_error)?;

        if data.len() as u64 > max_upload_size {
            return Err(ApiError::payload_too_large(format!(
                "File exceeds maximum upload size of {max_upload_size} bytes"
            )));
        }

        upload = Some((file_name, data));
    }

    let (file_name, data) =
        upload.ok_or_else(|| ApiError::bad_request("No file uploaded (missing \"file\" field)"))?;

    if file_name.trim().is_empty() {
        return Err(ApiError::bad_request("File name is empty"));
    }

    let file = blocking(move || state.storage.upload(&file_name, Cursor::new(data))).await?;

    Ok((StatusCode::CREATED, FileMessage::new("uploaded", file.name)))
}

pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let reader = blocking(move || state.storage.download(&name)).await?;
    let (file, stat) = reader.into_parts();

    // The handle is dropped with the body, including when the client hangs up.
    let stream = ReaderStream::new(tokio::fs::File::from_std(file));
    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();

    let mime = mime_guess::from_path(&stat.name).first_or_octet_stream();
    headers.insert(
        header::CONTENT_TYPE,
        mime.as_ref()
            .parse()
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(stat.size));
    if let Ok(value) = content_disposition(&stat.name).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<FileMessage>, ApiError> {
    let name = blocking(move || state.storage.delete(&name)).await?;
    Ok(FileMessage::new("deleted", name.into_string()))
}

// ============================================================================
// Helpers
// ============================================================================

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload exceeds maximum request size")
    } else {
        ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text()))
    }
}

/// `attachment` disposition with an ASCII fallback name and the exact name
/// percent-encoded as UTF-8.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();

    if fallback == name {
        return format!("attachment; filename=\"{name}\"");
    }

    let mut encoded = String::with_capacity(name.len() * 3);
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
