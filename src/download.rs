//! Explicit download handler: saves a remote file into the local download directory.

use axum::extract::{Extension, Path};
use axum::response::Html;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::atomic::AtomicFile;
use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::path::RemotePath;
use crate::remote::{GatewayError, RemoteFile, RemoteFs};
use crate::render::render_download_saved;

/// Retrieves `path` and materializes it under the configured download directory.
pub async fn download_to_local(
    Path(path): Path<String>,
    Extension(remote): Extension<Arc<RemoteFs>>,
    Extension(config): Extension<Arc<GatewayConfig>>,
) -> Result<Html<String>, ApiError> {
    let remote_path = RemotePath::from_url_path(&path);
    let file = remote.retrieve(&remote_path).await.map_err(|err| match err {
        GatewayError::NotFound(msg) => ApiError::NotFound(format!("Error retrieving file: {msg}")),
        other => other.into(),
    })?;

    let local_path = match local_target(&config, &remote_path) {
        Ok(local_path) => local_path,
        Err(err) => {
            file.close().await;
            return Err(ApiError::Internal(format!("Error creating local file: {err}")));
        }
    };
    let written = materialize(file, &local_path).await?;
    info!(
        remote = %remote_path,
        local = %local_path.display(),
        bytes = written,
        "file downloaded"
    );

    Ok(Html(render_download_saved(&local_path, &remote_path.parent())))
}

/// Local file for `remote`: its base name inside the download directory.
fn local_target(config: &GatewayConfig, remote: &RemotePath) -> io::Result<PathBuf> {
    match remote.base_name() {
        "" | "." | ".." => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no file name in '{remote}'"),
        )),
        name => Ok(config.download_dir.join(name)),
    }
}

/// Copies every chunk of `file` into `target`, replacing any existing file.
///
/// On failure the remote session is closed before returning and `target` is
/// left as it was.
async fn materialize(mut file: RemoteFile, target: &std::path::Path) -> Result<u64, ApiError> {
    let mut out = match AtomicFile::create(target).await {
        Ok(out) => out,
        Err(err) => {
            file.close().await;
            return Err(ApiError::Internal(format!("Error creating local file: {err}")));
        }
    };

    let mut written: u64 = 0;
    while let Some(chunk) = file.next_chunk().await {
        let copied = match chunk {
            Ok(bytes) => out.write_all(&bytes).await.map(|_| bytes.len() as u64),
            Err(err) => Err(err),
        };
        match copied {
            Ok(len) => written += len,
            Err(err) => {
                warn!(target = %target.display(), error = %err, "error saving file");
                out.cleanup().await;
                file.close().await;
                return Err(ApiError::Internal(format!("Error saving file: {err}")));
            }
        }
    }

    out.finalize()
        .await
        .map_err(|err| ApiError::Internal(format!("Error saving file: {err}")))?;
    Ok(written)
}
