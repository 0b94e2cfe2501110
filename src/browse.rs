//! Browse handler: directory listings and inline file fetches share one URL space.

use axum::body::Body as AxumBody;
use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::path::RemotePath;
use crate::remote::{RemoteFs, Resolution};
use crate::render::render_listing;

/// Browses the FTP root.
pub async fn browse_root(Extension(remote): Extension<Arc<RemoteFs>>) -> Result<Response, ApiError> {
    browse_path(&remote, RemotePath::root()).await
}

/// Browses a directory or streams a file, whichever the server accepts.
pub async fn browse(
    Path(path): Path<String>,
    Extension(remote): Extension<Arc<RemoteFs>>,
) -> Result<Response, ApiError> {
    browse_path(&remote, RemotePath::from_url_path(&path)).await
}

async fn browse_path(remote: &RemoteFs, path: RemotePath) -> Result<Response, ApiError> {
    info!(path = %path, "browse");
    match remote.classify(&path).await? {
        Resolution::Directory(entries) => {
            info!(path = %path, count = entries.len(), "list directory");
            Ok(Html(render_listing(&path, &entries)).into_response())
        }
        Resolution::File(file) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            let disposition = match attachment_header(&path) {
                Ok(disposition) => disposition,
                Err(err) => {
                    file.close().await;
                    return Err(err);
                }
            };
            headers.insert(header::CONTENT_DISPOSITION, disposition);
            info!(path = %path, "stream file");
            Ok((StatusCode::OK, headers, AxumBody::from_stream(file.into_stream())).into_response())
        }
        Resolution::NotFound(message) => {
            warn!(path = %path, error = %message, "error retrieving file");
            Err(ApiError::NotFound(format!("File not found: {message}")))
        }
    }
}

fn attachment_header(path: &RemotePath) -> Result<HeaderValue, ApiError> {
    let filename = path.base_name().replace('\\', "\\\\").replace('"', "\\\"");
    HeaderValue::from_bytes(format!(r#"attachment; filename="{filename}""#).as_bytes())
        .map_err(|_| ApiError::Internal("invalid file name for Content-Disposition".into()))
}
