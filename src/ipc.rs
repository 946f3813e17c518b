use crate::error::{RsuvError, TransportError};
use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio::time::timeout;

/// File name of the daemon's RPC socket inside the state directory
pub const SOCKET_FILE_NAME: &str = "rsuv.sock";

/// Filesystem path of the daemon's local RPC socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcPath {
    inner: PathBuf,
}

impl IpcPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { inner: path.into() }
    }

    /// Socket path inside the given per-user state directory
    pub fn in_state_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(SOCKET_FILE_NAME))
    }

    pub fn as_path(&self) -> &Path {
        &self.inner
    }

    pub fn exists(&self) -> bool {
        self.inner.exists()
    }

    pub fn display(&self) -> String {
        self.inner.display().to_string()
    }
}

impl From<PathBuf> for IpcPath {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&str> for IpcPath {
    fn from(path: &str) -> Self {
        Self::new(PathBuf::from(path))
    }
}

impl AsRef<Path> for IpcPath {
    fn as_ref(&self) -> &Path {
        &self.inner
    }
}

impl AsRef<std::ffi::OsStr> for IpcPath {
    fn as_ref(&self) -> &std::ffi::OsStr {
        self.inner.as_ref()
    }
}

/// Dial the daemon socket, giving up after `limit`.
pub async fn connect(path: &IpcPath, limit: Duration) -> Result<UnixStream, TransportError> {
    timeout(limit, UnixStream::connect(path.as_path()))
        .await
        .map_err(|_| TransportError::Timeout(format!("connecting to {}", path.display())))?
        .map_err(|e| TransportError::Dial {
            endpoint: path.display(),
            reason: e.to_string(),
        })
}

/// Socket file created by a successful [`bind`].
///
/// Remembers the file's device and inode so that cleanup never unlinks a
/// socket that a later daemon has bound at the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketFile {
    path: PathBuf,
    dev: u64,
    ino: u64,
}

impl SocketFile {
    fn identify(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::symlink_metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    /// Remove the socket file if it is still the one this daemon bound.
    ///
    /// Returns whether a file was removed.
    pub fn remove(&self) -> std::io::Result<bool> {
        match Self::identify(&self.path) {
            Ok(current) if current == *self => {}
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Bind the daemon socket, replacing a leftover socket file.
///
/// Only call this after winning the daemon's exclusivity gate: a leftover
/// file at this point belongs to a daemon that is no longer serving.
pub fn bind(path: &IpcPath) -> crate::error::Result<(UnixListener, SocketFile)> {
    let socket_path = path.as_path();
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if socket_path.exists() {
        std::fs::remove_file(socket_path).map_err(RsuvError::IoError)?;
    }

    let listener = UnixListener::bind(socket_path).map_err(|e| {
        RsuvError::IoError(std::io::Error::new(
            e.kind(),
            format!("failed to bind socket {}: {e}", path.display()),
        ))
    })?;
    let file = SocketFile::identify(socket_path)?;

    Ok((listener, file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ipc_path_in_state_dir() {
        let path = IpcPath::in_state_dir(Path::new("/home/me/.rsuv"));
        assert_eq!(path.as_path(), Path::new("/home/me/.rsuv/rsuv.sock"));
    }

    #[tokio::test]
    async fn test_connect_missing_socket_is_dial_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = IpcPath::in_state_dir(temp_dir.path());

        let err = connect(&path, Duration::from_millis(200)).await.unwrap_err();
        assert!(matches!(err, TransportError::Dial { .. }));
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let temp_dir = TempDir::new().unwrap();
        let path = IpcPath::in_state_dir(&temp_dir.path().join("state"));

        // A listener that is dropped leaves its socket file behind
        drop(bind(&path).unwrap());
        assert!(path.exists());

        let (listener, _file) = bind(&path).unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });
        connect(&path, Duration::from_secs(1)).await.unwrap();
        accept.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_socket_file_removal_spares_a_rebound_socket() {
        let temp_dir = TempDir::new().unwrap();
        let path = IpcPath::in_state_dir(temp_dir.path());

        let (_first_listener, first_file) = bind(&path).unwrap();

        // Keep the first inode alive under another name while a second
        // daemon binds the original path
        std::fs::rename(path.as_path(), temp_dir.path().join("moved.sock")).unwrap();
        let (_second_listener, second_file) = bind(&path).unwrap();
        assert_ne!(first_file, second_file);

        assert!(!first_file.remove().unwrap());
        assert!(path.exists());

        assert!(second_file.remove().unwrap());
        assert!(!path.exists());
        assert!(!second_file.remove().unwrap());
    }
}
