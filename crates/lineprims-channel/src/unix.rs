use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ChannelError, Result};

#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

/// Connect to a listening Unix domain socket (blocking).
///
/// The returned stream is a ready [`crate::DuplexChannel`].
pub fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path).map_err(|source| ChannelError::Connect {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(?path, "connected to unix domain socket");
    Ok(stream)
}

/// A bound Unix domain socket handing out connected channels.
///
/// The socket file is removed on drop, unless the path has since been
/// replaced by something else.
pub struct UnixChannelListener {
    listener: UnixListener,
    path: PathBuf,
    identity: (u64, u64),
}

impl UnixChannelListener {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// Bind and listen on `path`, replacing a stale socket file if present.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind with an explicit permission mode for the socket file.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = path.as_os_str().len();
        if len >= MAX_PATH_LEN {
            return Err(ChannelError::PathTooLong {
                path,
                len,
                max: MAX_PATH_LEN,
            });
        }

        let bind_err = |source: std::io::Error| ChannelError::Bind {
            path: path.clone(),
            source,
        };

        // Only ever remove a leftover socket, never a regular file.
        if let Ok(existing) = std::fs::symlink_metadata(&path) {
            if !existing.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "listening on unix domain socket");

        Ok(Self {
            listener,
            identity: (created.dev(), created.ino()),
            path,
        })
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().map_err(ChannelError::Accept)?;
        debug!(path = ?self.path, "accepted connection");
        Ok(stream)
    }

    /// The bound socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixChannelListener {
    fn drop(&mut self) {
        let Ok(metadata) = std::fs::symlink_metadata(&self.path) else {
            return;
        };
        if metadata.file_type().is_socket() && (metadata.dev(), metadata.ino()) == self.identity {
            debug!(path = ?self.path, "cleaning up socket file");
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path replaced; skipping cleanup");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;
    use crate::DuplexChannel;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lineprims-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn bind_accept_connect() {
        let dir = temp_dir("uds-basic");
        let sock_path = dir.join("test.sock");

        let listener = UnixChannelListener::bind(&sock_path).unwrap();
        assert!(sock_path.exists());

        let path_clone = sock_path.clone();
        let handle = std::thread::spawn(move || {
            let client = connect(&path_clone).unwrap();
            client.output().unwrap().write_all(b"hello").unwrap();
        });

        let server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.input().unwrap().read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        handle.join().unwrap();

        drop(listener);
        assert!(!sock_path.exists(), "socket file should be cleaned up on drop");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = UnixChannelListener::bind(&long_path);
        assert!(matches!(result, Err(ChannelError::PathTooLong { .. })));
    }

    #[test]
    fn default_permissions_are_owner_only() {
        let dir = temp_dir("uds-perms");
        let sock_path = dir.join("perm.sock");

        let listener = UnixChannelListener::bind(&sock_path).unwrap();
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bind_rejects_existing_regular_file() {
        let dir = temp_dir("uds-file");
        let sock_path = dir.join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = UnixChannelListener::bind(&sock_path);
        assert!(matches!(result, Err(ChannelError::Bind { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bind_replaces_stale_socket() {
        let dir = temp_dir("uds-stale");
        let sock_path = dir.join("stale.sock");

        let first = UnixChannelListener::bind(&sock_path).unwrap();
        std::mem::forget(first);
        assert!(sock_path.exists());

        let second = UnixChannelListener::bind(&sock_path).unwrap();
        assert_eq!(second.path(), sock_path.as_path());

        drop(second);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn connect_to_missing_socket_fails() {
        let err = connect("/tmp/lineprims-definitely-missing.sock").unwrap_err();
        assert!(matches!(err, ChannelError::Connect { .. }));
    }
}
