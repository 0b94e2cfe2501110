//! Multipart upload handler storing one file on the FTP server.

use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Extension, Multipart};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::path::RemotePath;
use crate::remote::RemoteFs;

struct UploadForm {
    dir: RemotePath,
    filename: String,
    data: Bytes,
}

/// Stores the posted `file` under the posted `path`, then redirects to that directory.
pub async fn upload_file(
    Extension(remote): Extension<Arc<RemoteFs>>,
    Extension(config): Extension<Arc<GatewayConfig>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let multipart = multipart
        .map_err(|err| ApiError::BadRequest(format!("Error parsing form: {}", err.body_text())))?;
    let form = read_form(multipart, config.upload_max_size).await?;
    let location = HeaderValue::from_str(&form.dir.browse_href())
        .map_err(|_| ApiError::BadRequest("Error parsing form: invalid path".into()))?;
    let target = form.dir.join(&form.filename);
    let size = form.data.len();
    debug!(target = %target, size, "upload received");

    let written = remote.store(&target, form.data).await.map_err(|err| {
        warn!(target = %target, error = ?err, "upload failed");
        ApiError::from(err)
    })?;
    info!(target = %target, bytes = written, "upload stored");

    Ok((StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response())
}

/// Answers any non-POST request to the upload route.
pub async fn reject_method() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn read_form(mut multipart: Multipart, max_size: u64) -> Result<UploadForm, ApiError> {
    let mut dir = RemotePath::root();
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "path" => {
                let value = field.text().await.map_err(form_error)?;
                dir = RemotePath::from(value.as_str());
            }
            "file" => {
                let filename = field
                    .file_name()
                    .map(declared_base_name)
                    .unwrap_or_default()
                    .to_string();
                let data = read_limited(field, max_size).await?;
                file = Some((filename, data));
            }
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| ApiError::BadRequest("Error getting file: missing file field".into()))?;
    if filename.is_empty() {
        return Err(ApiError::BadRequest(
            "Error getting file: missing file name".into(),
        ));
    }
    Ok(UploadForm {
        dir,
        filename,
        data,
    })
}

async fn read_limited(mut field: Field<'_>, max_size: u64) -> Result<Bytes, ApiError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(form_error)? {
        if (data.len() + chunk.len()) as u64 > max_size {
            return Err(ApiError::BadRequest(format!(
                "Error parsing form: upload exceeds {max_size} bytes"
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(data))
}

/// Browsers may send a client-side path; only its last segment names the file.
fn declared_base_name(declared: &str) -> &str {
    declared.rsplit(['/', '\\']).next().unwrap_or(declared)
}

fn form_error(err: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Error parsing form: {}", err.body_text()))
}
