//! ftp-gate server binary.
//!
//! Exposes a remote FTP file tree over HTTP for browsing, downloading and
//! uploading. Each request opens its own FTP session and closes it before the
//! response completes; nothing is cached between requests.

mod atomic;
mod browse;
mod config;
mod download;
mod error;
mod ftp;
mod http;
mod logging;
mod path;
mod remote;
mod render;
mod upload;

#[cfg(test)]
mod testing;

use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::Request;
use axum::routing::{get, post};
use axum::{Router, middleware};
use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info, info_span, warn};

use crate::config::{Args, GatewayConfig, MULTIPART_OVERHEAD_BYTES, SHUTDOWN_GRACE_SECS};
use crate::ftp::SuppaConnector;
use crate::path::RemotePath;
use crate::remote::RemoteFs;

shadow!(build);

/// Starts the gateway and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let config = Arc::new(args.gateway_config());
    if let Err(err) = tokio::fs::create_dir_all(&config.download_dir).await {
        error!(dir = %config.download_dir.display(), error = %err, "failed to create downloads directory");
        return Err(err);
    }

    let remote = Arc::new(RemoteFs::new(
        Arc::new(SuppaConnector),
        config.ftp.clone(),
    ));
    probe_remote(&remote).await;

    let app = build_router(remote.clone(), config.clone());

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let http_addr = SocketAddr::new(host, args.http_port);
    let handle = Handle::new();

    info!("Starting HTTP server at {}", http_addr);
    info!("Forwarding to FTP server at {}", remote.address());
    info!("Downloads will be saved to {}", config.download_dir.display());

    let http_server = axum_server::bind(http_addr)
        .handle(handle.clone())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());

    tokio::select! {
        result = http_server => result?,
        _ = shutdown_signal(handle) => {}
    }

    Ok(())
}

fn build_router(remote: Arc<RemoteFs>, config: Arc<GatewayConfig>) -> Router {
    let body_limit = config
        .upload_max_size
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/", get(browse::browse_root))
        .route("/download/{*path}", get(download::download_to_local))
        .route(
            "/upload",
            post(upload::upload_file)
                .fallback(upload::reject_method)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/{*path}", get(browse::browse))
        .layer(middleware::from_fn(http::add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip = http::client_ip(request),
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(remote))
        .layer(Extension(config))
}

/// Lists the FTP root once at startup so misconfiguration shows up in the log.
async fn probe_remote(remote: &RemoteFs) {
    match remote.list(&RemotePath::root()).await {
        Ok(entries) => {
            info!(count = entries.len(), "FTP root directory contents");
            for entry in &entries {
                info!(name = %entry.name, size = entry.size, "- entry");
            }
        }
        Err(err) => warn!(error = ?err, "could not list FTP root"),
    }
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_GRACE_SECS)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body as AxumBody, to_bytes};
    use axum::http::{StatusCode, header};
    use axum::response::Response;
    use std::path::Path;
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::config::DEFAULT_UPLOAD_MAX_SIZE;
    use crate::testing::{FakeFtp, fake_config};

    fn test_router(ftp: &FakeFtp, download_dir: &Path, upload_max_size: u64) -> Router {
        let config = Arc::new(fake_config(download_dir, upload_max_size));
        build_router(Arc::new(ftp.remote_fs()), config)
    }

    async fn send(router: Router, request: Request<AxumBody>) -> Response {
        router.oneshot(request).await.expect("router response")
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn get(uri: &str) -> Request<AxumBody> {
        Request::builder()
            .uri(uri)
            .body(AxumBody::empty())
            .expect("build request")
    }

    #[tokio::test]
    async fn download_prefix_saves_locally() {
        let temp = tempdir().expect("tempdir");
        let ftp = FakeFtp::new().with_file("docs/a.txt", b"alpha");
        let router = test_router(&ftp, temp.path(), DEFAULT_UPLOAD_MAX_SIZE);
        let response = send(router, get("/download/docs/a.txt")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("File Downloaded Successfully!"));
        assert_eq!(std::fs::read(temp.path().join("a.txt")).expect("saved"), b"alpha");
        let state = ftp.state();
        assert_eq!((state.lists, state.retrieves, state.quits), (0, 1, 1));
    }

    #[tokio::test]
    async fn other_paths_browse_inline() {
        let temp = tempdir().expect("tempdir");
        let ftp = FakeFtp::new().with_file("docs/a.txt", b"alpha");
        let router = test_router(&ftp, temp.path(), DEFAULT_UPLOAD_MAX_SIZE);
        let response = send(router, get("/docs/a.txt")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(body_text(response).await, "alpha");
        assert_eq!(std::fs::read_dir(temp.path()).expect("read dir").count(), 0);
        assert_eq!(ftp.state().quits, 1);
    }

    #[tokio::test]
    async fn root_lists_remote_root() {
        let temp = tempdir().expect("tempdir");
        let ftp = FakeFtp::new().with_dir("", Vec::new());
        let router = test_router(&ftp, temp.path(), DEFAULT_UPLOAD_MAX_SIZE);
        let response = send(router, get("/")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("<h1>Directory: /</h1>"));
        assert_eq!(ftp.state().quits, 1);
    }

    #[tokio::test]
    async fn get_upload_is_method_not_allowed() {
        let temp = tempdir().expect("tempdir");
        let ftp = FakeFtp::new();
        let router = test_router(&ftp, temp.path(), DEFAULT_UPLOAD_MAX_SIZE);
        let response = send(router, get("/upload")).await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "POST");
        assert_eq!(ftp.state().dials, 0);
    }

    #[tokio::test]
    async fn body_over_limit_is_bad_request_without_dial() {
        let temp = tempdir().expect("tempdir");
        let ftp = FakeFtp::new();
        let boundary = "ftpgate-router-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"padding\"\r\n\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(&vec![b'p'; 2 * MULTIPART_OVERHEAD_BYTES as usize]);
        body.extend_from_slice(
            format!(
                "\r\n--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"x.txt\"\r\n\r\n1\r\n--{boundary}--\r\n"
            )
            .as_bytes(),
        );
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(AxumBody::from(body))
            .expect("build request");

        let response = send(test_router(&ftp, temp.path(), 16), request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.starts_with("Error parsing form"));
        let state = ftp.state();
        assert_eq!((state.dials, state.stores), (0, 0));
    }

    #[tokio::test]
    async fn probe_closes_its_session() {
        let ftp = FakeFtp::new().with_dir("", Vec::new());
        probe_remote(&ftp.remote_fs()).await;
        let state = ftp.state();
        assert_eq!(state.lists, 1);
        assert_eq!(state.quits, 1);
    }
}
