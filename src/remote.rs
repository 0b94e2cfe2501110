//! Async facade over blocking FTP sessions.
//!
//! Every operation dials a fresh session on a blocking thread, performs one
//! command and drops the session (QUIT) before the thread finishes.

use axum::body::Bytes;
use futures_util::stream::{self, Stream};
use std::io::{self, Cursor, ErrorKind, Read};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::ftp::{DirectoryEntry, FtpConnector, FtpSettings, RetrieveError, Session};
use crate::path::RemotePath;

const READ_CHUNK_SIZE: usize = 64 * 1024;
const CHUNK_QUEUE_DEPTH: usize = 8;

#[derive(Debug)]
pub enum GatewayError {
    /// Dial or login failed.
    Connect(String),
    /// The remote path could not be retrieved.
    NotFound(String),
    /// A listing or store command failed on an open session.
    Remote(String),
}

/// Outcome of probing a path: a listable directory, a retrievable file, or neither.
pub enum Resolution {
    Directory(Vec<DirectoryEntry>),
    File(RemoteFile),
    NotFound(String),
}

/// Bytes of a retrieval in progress, fed by the blocking session thread.
pub struct RemoteFile {
    chunks: mpsc::Receiver<io::Result<Bytes>>,
    closed: oneshot::Receiver<()>,
}

impl RemoteFile {
    fn new(chunks: mpsc::Receiver<io::Result<Bytes>>, closed: oneshot::Receiver<()>) -> Self {
        Self { chunks, closed }
    }

    /// Abandons the transfer and waits until its session is closed.
    pub async fn close(self) {
        let Self { chunks, closed } = self;
        drop(chunks);
        let _ = closed.await;
    }

    pub async fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        self.chunks.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        stream::unfold(self.chunks, |mut chunks| async move {
            chunks.recv().await.map(|chunk| (chunk, chunks))
        })
    }
}

/// The upstream FTP server as seen by the HTTP handlers.
pub struct RemoteFs {
    connector: Arc<dyn FtpConnector>,
    settings: FtpSettings,
}

impl RemoteFs {
    pub fn new(connector: Arc<dyn FtpConnector>, settings: FtpSettings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    pub fn address(&self) -> &str {
        &self.settings.address
    }

    pub async fn list(&self, path: &RemotePath) -> Result<Vec<DirectoryEntry>, GatewayError> {
        let path = path.clone();
        self.with_session(move |session| {
            session
                .list(&path)
                .map_err(|err| GatewayError::Remote(err.to_string()))
        })
        .await
    }

    /// Lists `path`; if that fails, retrieves it as a file instead.
    ///
    /// A directory costs one round trip, a file costs two.
    pub async fn classify(&self, path: &RemotePath) -> Result<Resolution, GatewayError> {
        let (opened_tx, opened_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_QUEUE_DEPTH);
        let (closed_tx, closed_rx) = oneshot::channel();
        let connector = self.connector.clone();
        let settings = self.settings.clone();
        let path = path.clone();

        tokio::task::spawn_blocking(move || {
            let mut session = match Session::open(connector.as_ref(), &settings) {
                Ok(session) => session,
                Err(err) => {
                    let _ = opened_tx.send(Err(GatewayError::Connect(err.to_string())));
                    return;
                }
            };
            match session.list(&path) {
                Ok(entries) => {
                    drop(session);
                    let _ = opened_tx.send(Ok(Probe::Directory(entries)));
                }
                Err(err) => {
                    debug!(path = %path, error = %err, "list failed, trying retrieve");
                    pump_retrieval(session, &path, opened_tx, chunk_tx, closed_tx);
                }
            }
        });

        match await_opened(opened_rx).await? {
            Probe::Directory(entries) => Ok(Resolution::Directory(entries)),
            Probe::File => Ok(Resolution::File(RemoteFile::new(chunk_rx, closed_rx))),
            Probe::Missing(message) => Ok(Resolution::NotFound(message)),
        }
    }

    /// Retrieves `path` as a file. Fails with `NotFound` if the server refuses.
    pub async fn retrieve(&self, path: &RemotePath) -> Result<RemoteFile, GatewayError> {
        let (opened_tx, opened_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_QUEUE_DEPTH);
        let (closed_tx, closed_rx) = oneshot::channel();
        let connector = self.connector.clone();
        let settings = self.settings.clone();
        let path = path.clone();

        tokio::task::spawn_blocking(move || {
            match Session::open(connector.as_ref(), &settings) {
                Ok(session) => pump_retrieval(session, &path, opened_tx, chunk_tx, closed_tx),
                Err(err) => {
                    let _ = opened_tx.send(Err(GatewayError::Connect(err.to_string())));
                }
            }
        });

        match await_opened(opened_rx).await? {
            Probe::File => Ok(RemoteFile::new(chunk_rx, closed_rx)),
            Probe::Missing(message) => Err(GatewayError::NotFound(message)),
            Probe::Directory(_) => Err(GatewayError::Remote("unexpected listing".into())),
        }
    }

    /// Stores `data` at `path`, returning the number of bytes written.
    pub async fn store(&self, path: &RemotePath, data: Bytes) -> Result<u64, GatewayError> {
        let path = path.clone();
        self.with_session(move |session| {
            let mut reader = Cursor::new(data);
            session
                .store(&path, &mut reader)
                .map_err(|err| GatewayError::Remote(err.to_string()))
        })
        .await
    }

    async fn with_session<T, F>(&self, op: F) -> Result<T, GatewayError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session) -> Result<T, GatewayError> + Send + 'static,
    {
        let connector = self.connector.clone();
        let settings = self.settings.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = Session::open(connector.as_ref(), &settings)
                .map_err(|err| GatewayError::Connect(err.to_string()))?;
            op(&mut session)
        })
        .await
        .map_err(|err| GatewayError::Remote(err.to_string()))?
    }
}

enum Probe {
    Directory(Vec<DirectoryEntry>),
    File,
    Missing(String),
}

type OpenedSender = oneshot::Sender<Result<Probe, GatewayError>>;

async fn await_opened(
    opened_rx: oneshot::Receiver<Result<Probe, GatewayError>>,
) -> Result<Probe, GatewayError> {
    opened_rx
        .await
        .map_err(|_| GatewayError::Remote("ftp worker exited unexpectedly".into()))?
}

/// Retrieves `path` on `session`, signalling `opened_tx` once the data
/// channel is up and forwarding the bytes through `chunk_tx`.
///
/// The session is closed before the outcome becomes visible to the receiver;
/// `closed_tx` is dropped at that point.
fn pump_retrieval(
    mut session: Session,
    path: &RemotePath,
    opened_tx: OpenedSender,
    chunk_tx: mpsc::Sender<io::Result<Bytes>>,
    closed_tx: oneshot::Sender<()>,
) {
    let mut opened_tx = Some(opened_tx);
    let result = {
        let mut sink = |reader: &mut dyn Read| -> io::Result<()> {
            if let Some(tx) = opened_tx.take() {
                let _ = tx.send(Ok(Probe::File));
            }
            forward_chunks(reader, &chunk_tx)
        };
        session.retrieve(path, &mut sink)
    };
    drop(session);
    drop(closed_tx);

    match result {
        Ok(()) => {}
        Err(RetrieveError::Remote(err)) => match opened_tx.take() {
            Some(tx) => {
                let _ = tx.send(Ok(Probe::Missing(err.to_string())));
            }
            None => {
                let _ = chunk_tx.blocking_send(Err(io::Error::other(err.to_string())));
            }
        },
        Err(RetrieveError::Sink(err)) => {
            debug!(path = %path, error = %err, "retrieval aborted");
            let _ = chunk_tx.blocking_send(Err(err));
        }
    }
}

fn forward_chunks(
    reader: &mut dyn Read,
    chunk_tx: &mpsc::Sender<io::Result<Bytes>>,
) -> io::Result<()> {
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        chunk_tx
            .blocking_send(Ok(Bytes::copy_from_slice(&buf[..read])))
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "receiver dropped"))?;
    }
}
