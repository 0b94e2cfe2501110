//! FTP capability traits and the `suppaftp` backed implementation.
//!
//! All calls here block. Callers run them on `spawn_blocking` (see
//! `remote.rs`), one session per request.

use chrono::{DateTime, Utc};
use std::fmt;
use std::io::{self, Read};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, SystemTime};
use suppaftp::FtpStream;
use suppaftp::list::File as ListFile;
use suppaftp::types::FileType;
use tracing::debug;

use crate::path::RemotePath;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One item of a remote directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub size: u64,
    pub kind: EntryKind,
    pub modified: Option<String>,
}

impl DirectoryEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Error text reported by the FTP server or the control connection.
#[derive(Debug)]
pub struct RemoteError(String);

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<suppaftp::FtpError> for RemoteError {
    fn from(err: suppaftp::FtpError) -> Self {
        Self(err.to_string())
    }
}

impl From<io::Error> for RemoteError {
    fn from(err: io::Error) -> Self {
        Self(err.to_string())
    }
}

/// Failure of a retrieval: either the server refused or the sink gave up.
#[derive(Debug)]
pub enum RetrieveError {
    Remote(RemoteError),
    Sink(io::Error),
}

/// Receives the data channel of an opened retrieval.
pub type RetrieveSink<'a> = dyn FnMut(&mut dyn Read) -> io::Result<()> + 'a;

/// Opens control connections to an FTP server.
pub trait FtpConnector: Send + Sync {
    fn dial(&self, address: &str, timeout: Duration) -> Result<Box<dyn FtpSession>, RemoteError>;
}

/// Commands available on one open control connection.
pub trait FtpSession: Send {
    fn login(&mut self, user: &str, password: &str) -> Result<(), RemoteError>;

    fn list(&mut self, path: &RemotePath) -> Result<Vec<DirectoryEntry>, RemoteError>;

    /// Opens `path` for reading and hands the data channel to `sink`.
    ///
    /// `sink` is called at most once and only after the server accepted the
    /// transfer, so a `Remote` error means nothing was opened.
    fn retrieve(
        &mut self,
        path: &RemotePath,
        sink: &mut RetrieveSink<'_>,
    ) -> Result<(), RetrieveError>;

    fn store(&mut self, path: &RemotePath, reader: &mut dyn Read) -> Result<u64, RemoteError>;

    fn quit(&mut self);
}

/// Address, credentials and dial timeout of the upstream FTP server.
#[derive(Clone, Debug)]
pub struct FtpSettings {
    pub address: String,
    pub user: String,
    pub password: String,
    pub dial_timeout: Duration,
}

/// An open, logged-in session that sends QUIT exactly once when dropped.
pub struct Session {
    inner: Box<dyn FtpSession>,
}

impl Session {
    /// Dials and logs in. A session whose login fails is still closed.
    pub fn open(connector: &dyn FtpConnector, settings: &FtpSettings) -> Result<Self, RemoteError> {
        let inner = connector.dial(&settings.address, settings.dial_timeout)?;
        let mut session = Self { inner };
        session
            .inner
            .login(&settings.user, &settings.password)
            .map_err(|err| RemoteError::new(format!("failed to login: {err}")))?;
        Ok(session)
    }

    pub fn list(&mut self, path: &RemotePath) -> Result<Vec<DirectoryEntry>, RemoteError> {
        self.inner.list(path)
    }

    pub fn retrieve(
        &mut self,
        path: &RemotePath,
        sink: &mut RetrieveSink<'_>,
    ) -> Result<(), RetrieveError> {
        self.inner.retrieve(path, sink)
    }

    pub fn store(&mut self, path: &RemotePath, reader: &mut dyn Read) -> Result<u64, RemoteError> {
        self.inner.store(path, reader)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.inner.quit();
    }
}

/// Production connector backed by `suppaftp`.
#[derive(Debug, Default)]
pub struct SuppaConnector;

impl FtpConnector for SuppaConnector {
    fn dial(&self, address: &str, timeout: Duration) -> Result<Box<dyn FtpSession>, RemoteError> {
        let stream = connect_any(address, address.to_socket_addrs()?, |addr| {
            Ok(FtpStream::connect_timeout(addr, timeout)?)
        })?;
        Ok(Box::new(SuppaSession { stream }))
    }
}

/// Tries every resolved address in order and returns the first connection.
fn connect_any<T>(
    address: &str,
    addrs: impl IntoIterator<Item = SocketAddr>,
    mut connect: impl FnMut(SocketAddr) -> Result<T, RemoteError>,
) -> Result<T, RemoteError> {
    let mut last_err = None;
    for addr in addrs {
        match connect(addr) {
            Ok(conn) => return Ok(conn),
            Err(err) => {
                debug!(%addr, error = %err, "ftp dial failed");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| RemoteError::new(format!("no address found for {address}"))))
}

struct SuppaSession {
    stream: FtpStream,
}

impl FtpSession for SuppaSession {
    fn login(&mut self, user: &str, password: &str) -> Result<(), RemoteError> {
        self.stream.login(user, password)?;
        self.stream.transfer_type(FileType::Binary)?;
        Ok(())
    }

    fn list(&mut self, path: &RemotePath) -> Result<Vec<DirectoryEntry>, RemoteError> {
        let target = (!path.is_root()).then_some(path.as_str());
        let lines = self.stream.list(target)?;
        Ok(lines.iter().filter_map(|line| parse_list_line(line)).collect())
    }

    fn retrieve(
        &mut self,
        path: &RemotePath,
        sink: &mut RetrieveSink<'_>,
    ) -> Result<(), RetrieveError> {
        let mut data = self
            .stream
            .retr_as_stream(path.as_str())
            .map_err(|err| RetrieveError::Remote(err.into()))?;
        let copied = sink(&mut data);
        let finalized = self.stream.finalize_retr_stream(data);
        copied.map_err(RetrieveError::Sink)?;
        finalized.map_err(|err| RetrieveError::Remote(err.into()))
    }

    fn store(&mut self, path: &RemotePath, reader: &mut dyn Read) -> Result<u64, RemoteError> {
        let mut reader = reader;
        Ok(self.stream.put_file(path.as_str(), &mut reader)?)
    }

    fn quit(&mut self) {
        if let Err(err) = self.stream.quit() {
            debug!(error = %err, "ftp quit failed");
        }
    }
}

/// Parses one LIST line (UNIX or DOS style). Unparseable lines are skipped.
fn parse_list_line(line: &str) -> Option<DirectoryEntry> {
    match line.parse::<ListFile>() {
        Ok(file) => Some(DirectoryEntry {
            name: file.name().to_string(),
            size: file.size() as u64,
            kind: if file.is_directory() {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            modified: format_modified(file.modified()),
        }),
        Err(err) => {
            debug!(line, error = ?err, "skipping unparseable list line");
            None
        }
    }
}

fn format_modified(modified: SystemTime) -> Option<String> {
    if modified <= SystemTime::UNIX_EPOCH {
        return None;
    }
    let datetime: DateTime<Utc> = modified.into();
    Some(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
}
