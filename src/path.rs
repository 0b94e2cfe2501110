//! Remote path resolution between the URL space and the FTP namespace.
//!
//! Paths are kept as plain slash-separated strings relative to the FTP root.
//! Repeated separators (`a//b`) are passed through untouched; the FTP server
//! decides what they mean.

use std::fmt;

/// A location in the FTP namespace, relative to its root. Empty is the root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Maps an HTTP URL path to a remote path by stripping one leading `/`.
    pub fn from_url_path(url_path: &str) -> Self {
        let trimmed = url_path.strip_prefix('/').unwrap_or(url_path);
        Self(trimmed.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the enclosing directory, or the root when there is none.
    pub fn parent(&self) -> Self {
        if self.is_root() {
            return Self::root();
        }
        let trimmed = self.0.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(index) => Self(trimmed[..index].to_string()),
            None => Self::root(),
        }
    }

    /// Appends `name` below this path.
    pub fn join(&self, name: &str) -> Self {
        if self.is_root() {
            return Self(name.to_string());
        }
        Self(format!("{}/{}", self.0, name))
    }

    /// Last segment after trimming trailing separators; empty for the root.
    pub fn base_name(&self) -> &str {
        let trimmed = self.0.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(index) => &trimmed[index + 1..],
            None => trimmed,
        }
    }

    /// Browse URL for this path (`/` for the root).
    pub fn browse_href(&self) -> String {
        format!("/{}", self.encoded())
    }

    pub fn download_href(&self) -> String {
        format!("/download/{}", self.encoded())
    }

    /// Percent-encodes each segment, keeping the separators.
    fn encoded(&self) -> String {
        self.0
            .split('/')
            .map(urlencoding::encode)
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemotePath {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
