//! Control socket listener.
//!
//! Binds a Unix socket at the path named by the configured listen address,
//! restricts it to owner and group, and serves control sessions until the
//! shutdown signal fires.

use std::fs::Permissions;
use std::io;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::protocol::{Request, Response};
use super::{ControlError, ControlService};
use crate::config::ControlConfig;

/// File mode applied to the socket after binding: rwx for owner and group.
pub const SOCKET_MODE: u32 = 0o770;

/// Longest request line a session will buffer, excluding the newline.
pub const MAX_REQUEST_LINE: usize = 64 * 1024;

/// Protocol prefix of a Unix socket listen address.
const UNIX_PROTOCOL: &str = "/unix";

/// Pause after a failed accept. A connection the listener cannot take
/// (out of file descriptors) stays queued and keeps the socket readable.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Errors bringing up the control socket.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("invalid control listen address '{addr}': {reason}")]
    InvalidListenAddr { addr: String, reason: &'static str },

    #[error("control socket {0} is already served by another process")]
    AddrInUse(PathBuf),

    #[error("failed to bind control socket {path}: {source}")]
    Bind { path: PathBuf, source: io::Error },
}

/// Extract the filesystem path from a `/unix/<path>` listen address.
///
/// `/unix/run/meshd/control.sock` names `/run/meshd/control.sock`.
pub fn unix_socket_path(listen: &str) -> Result<PathBuf, SocketError> {
    let invalid = |reason| SocketError::InvalidListenAddr {
        addr: listen.to_string(),
        reason,
    };

    let rest = listen
        .strip_prefix(UNIX_PROTOCOL)
        .ok_or_else(|| invalid("expected /unix/<path>"))?;
    if !rest.starts_with('/') || rest.trim_start_matches('/').is_empty() {
        return Err(invalid("missing socket path"));
    }
    if rest.contains('\0') {
        return Err(invalid("socket path contains NUL"));
    }
    Ok(PathBuf::from(rest))
}

/// A bound control socket. The socket file is removed when this is dropped.
#[derive(Debug)]
pub struct ControlSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlSocket {
    /// Bind the socket named by `config.listen`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: &ControlConfig) -> Result<Self, SocketError> {
        Self::bind_path(unix_socket_path(&config.listen)?)
    }

    /// Bind a socket at `path`.
    ///
    /// A socket file left behind by a dead daemon is replaced; one that still
    /// accepts connections is not. Failure to apply [`SOCKET_MODE`] is logged
    /// and otherwise ignored.
    pub fn bind_path(path: impl Into<PathBuf>) -> Result<Self, SocketError> {
        let path = path.into();
        let bind_err = |source| SocketError::Bind {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(bind_err)?;
        }

        remove_stale_socket(&path)?;

        let listener = UnixListener::bind(&path).map_err(bind_err)?;

        if let Err(e) = std::fs::set_permissions(&path, Permissions::from_mode(SOCKET_MODE)) {
            warn!(path = %path.display(), error = %e, "Failed to set control socket permissions");
        }

        info!(path = %path.display(), "Control socket ready");
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept sessions until `shutdown` turns true or its sender goes away.
    ///
    /// Each session runs on its own task. Sessions still open at shutdown
    /// are not waited for.
    pub async fn run(self, service: Arc<ControlService>, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }

        'accept: loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break 'accept;
                    }
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let service = Arc::clone(&service);
                            tokio::spawn(async move {
                                if let Err(e) = serve_session(stream, service).await {
                                    debug!(error = %e, "Control session ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "Control socket accept error");
                            tokio::select! {
                                changed = shutdown.changed() => {
                                    if changed.is_err() || *shutdown.borrow() {
                                        break 'accept;
                                    }
                                }
                                _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
                            }
                        }
                    }
                }
            }
        }

        info!(path = %self.path.display(), "Closing control socket");
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %e, "Failed to remove control socket");
        }
    }
}

/// Clear the way for binding at `path`.
fn remove_stale_socket(path: &Path) -> Result<(), SocketError> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return Ok(()),
    };
    // Anything other than a socket is left for bind() to reject.
    if !metadata.file_type().is_socket() {
        return Ok(());
    }

    if std::os::unix::net::UnixStream::connect(path).is_ok() {
        return Err(SocketError::AddrInUse(path.to_path_buf()));
    }

    debug!(path = %path.display(), "Removing stale control socket");
    std::fs::remove_file(path).map_err(|source| SocketError::Bind {
        path: path.to_path_buf(),
        source,
    })
}

/// Outcome of reading one request line.
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line,
    TooLong,
    Eof,
}

/// Read one newline-terminated line into `buf`, without the terminator.
///
/// A line longer than [`MAX_REQUEST_LINE`] is discarded up to and including
/// its newline and reported as [`LineRead::TooLong`]; `buf` never grows
/// past the cap.
async fn read_request_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = MAX_REQUEST_LINE as u64 + 1;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(LineRead::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(LineRead::Line);
    }
    if n <= MAX_REQUEST_LINE {
        // Final line without a newline.
        return Ok(LineRead::Line);
    }

    buf.clear();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            break;
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                break;
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
    Ok(LineRead::TooLong)
}

/// Answer requests on one session until the client hangs up.
async fn serve_session(stream: UnixStream, service: Arc<ControlService>) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        let response = match read_request_line(&mut reader, &mut line).await? {
            LineRead::Eof => break,
            LineRead::TooLong => Response::error(&ControlError::BadRequest(format!(
                "request line exceeds {} bytes",
                MAX_REQUEST_LINE
            ))),
            LineRead::Line if line.trim_ascii().is_empty() => continue,
            LineRead::Line => match serde_json::from_slice::<Request>(&line) {
                Ok(request) => {
                    debug!(method = request.method(), "Control request");
                    service.dispatch(request)
                }
                Err(e) => Response::error(&ControlError::BadRequest(e.to_string())),
            },
        };

        let mut out = serde_json::to_vec(&response).map_err(io::Error::other)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
    }

    Ok(())
}
