//! In-memory FTP server used by handler tests.

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::ftp::{
    DirectoryEntry, EntryKind, FtpConnector, FtpSession, FtpSettings, RemoteError,
    RetrieveError, RetrieveSink,
};
use crate::path::RemotePath;
use crate::remote::RemoteFs;

#[derive(Default)]
pub struct FakeState {
    pub dirs: HashMap<String, Vec<DirectoryEntry>>,
    pub files: HashMap<String, Vec<u8>>,
    pub stored: Vec<(String, Vec<u8>)>,
    pub refuse_dial: bool,
    pub refuse_login: bool,
    pub refuse_store: bool,
    /// Retrievals fail with a read error after this many bytes.
    pub break_retrieve_after: Option<usize>,
    pub dials: usize,
    pub lists: usize,
    pub retrieves: usize,
    pub stores: usize,
    pub quits: usize,
}

#[derive(Clone, Default)]
pub struct FakeFtp {
    state: Arc<Mutex<FakeState>>,
}

impl FakeFtp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(self, path: &str, entries: Vec<DirectoryEntry>) -> Self {
        self.state().dirs.insert(path.to_string(), entries);
        self
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.state().files.insert(path.to_string(), data.to_vec());
        self
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake ftp state poisoned")
    }

    pub fn remote_fs(&self) -> RemoteFs {
        RemoteFs::new(Arc::new(self.clone()), fake_settings())
    }
}

pub fn fake_settings() -> FtpSettings {
    FtpSettings {
        address: "fake:21".into(),
        user: "pc".into(),
        password: "0000".into(),
        dial_timeout: Duration::from_secs(5),
    }
}

pub fn fake_config(download_dir: &Path, upload_max_size: u64) -> GatewayConfig {
    GatewayConfig {
        ftp: fake_settings(),
        download_dir: download_dir.to_path_buf(),
        upload_max_size,
    }
}

pub fn dir_entry(name: &str) -> DirectoryEntry {
    DirectoryEntry {
        name: name.to_string(),
        size: 0,
        kind: EntryKind::Directory,
        modified: None,
    }
}

pub fn file_entry(name: &str, size: u64) -> DirectoryEntry {
    DirectoryEntry {
        name: name.to_string(),
        size,
        kind: EntryKind::File,
        modified: None,
    }
}

impl FtpConnector for FakeFtp {
    fn dial(&self, _address: &str, _timeout: Duration) -> Result<Box<dyn FtpSession>, RemoteError> {
        let mut state = self.state();
        state.dials += 1;
        if state.refuse_dial {
            return Err(RemoteError::new("connection refused"));
        }
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSession {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake ftp state poisoned")
    }
}

/// Data channel that drops mid-transfer.
struct BrokenReader;

impl Read for BrokenReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "426 Connection closed; transfer aborted.",
        ))
    }
}

impl FtpSession for FakeSession {
    fn login(&mut self, _user: &str, _password: &str) -> Result<(), RemoteError> {
        if self.state().refuse_login {
            return Err(RemoteError::new("530 Login incorrect."));
        }
        Ok(())
    }

    fn list(&mut self, path: &RemotePath) -> Result<Vec<DirectoryEntry>, RemoteError> {
        let mut state = self.state();
        state.lists += 1;
        state
            .dirs
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| RemoteError::new("550 No such directory."))
    }

    fn retrieve(
        &mut self,
        path: &RemotePath,
        sink: &mut RetrieveSink<'_>,
    ) -> Result<(), RetrieveError> {
        let (data, break_after) = {
            let mut state = self.state();
            state.retrieves += 1;
            (state.files.get(path.as_str()).cloned(), state.break_retrieve_after)
        };
        let data = data.ok_or_else(|| {
            RetrieveError::Remote(RemoteError::new("550 No such file or directory."))
        })?;
        let result = match break_after {
            Some(limit) => sink(&mut Cursor::new(data).take(limit as u64).chain(BrokenReader)),
            None => sink(&mut Cursor::new(data)),
        };
        result.map_err(RetrieveError::Sink)
    }

    fn store(&mut self, path: &RemotePath, reader: &mut dyn Read) -> Result<u64, RemoteError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let mut state = self.state();
        state.stores += 1;
        if state.refuse_store {
            return Err(RemoteError::new("553 Could not create file."));
        }
        let written = data.len() as u64;
        state.stored.push((path.to_string(), data));
        Ok(written)
    }

    fn quit(&mut self) {
        self.state().quits += 1;
    }
}
