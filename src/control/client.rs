//! Operator-side control session.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

use super::protocol::{
    PeersReply, Reply, Request, Response, RouteAction, RouteArgs, RouteReply, StatusReply,
};

/// Errors seen by a control client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot connect to control socket {path}: {source}")]
    Connect { path: PathBuf, source: io::Error },

    #[error("control socket I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed control message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("daemon closed the control session")]
    Closed,

    #[error("{message}")]
    Remote { code: String, message: String },

    #[error("daemon answered {method} with a {got} reply")]
    UnexpectedReply { method: &'static str, got: &'static str },
}

/// One session on the daemon's control socket.
///
/// Calls are answered in order, so a client must not be shared between
/// concurrent callers.
pub struct ControlClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl ControlClient {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| ClientError::Connect {
                path: path.to_path_buf(),
                source,
            })?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    /// Send one request and wait for its response.
    ///
    /// Error responses become [`ClientError::Remote`].
    pub async fn call(&mut self, request: &Request) -> Result<Reply, ClientError> {
        let mut out = serde_json::to_vec(request)?;
        out.push(b'\n');
        self.writer.write_all(&out).await?;

        let line = self.lines.next_line().await?.ok_or(ClientError::Closed)?;
        match serde_json::from_str::<Response>(&line)? {
            Response::Ok { reply } => Ok(reply),
            Response::Error { code, message } => Err(ClientError::Remote { code, message }),
        }
    }

    pub async fn status(&mut self) -> Result<StatusReply, ClientError> {
        match self.call(&Request::Status).await? {
            Reply::Status(status) => Ok(status),
            other => Err(unexpected("status", &other)),
        }
    }

    pub async fn peers(&mut self) -> Result<PeersReply, ClientError> {
        match self.call(&Request::Peers).await? {
            Reply::Peers(peers) => Ok(peers),
            other => Err(unexpected("peers", &other)),
        }
    }

    pub async fn route<I, S>(&mut self, action: RouteAction, args: I) -> Result<RouteReply, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = Request::Route(RouteArgs::new(action, args));
        match self.call(&request).await? {
            Reply::Route(route) => Ok(route),
            other => Err(unexpected("route", &other)),
        }
    }
}

fn unexpected(method: &'static str, reply: &Reply) -> ClientError {
    let got = match reply {
        Reply::Status(_) => "status",
        Reply::Route(_) => "route",
        Reply::Peers(_) => "peers",
    };
    ClientError::UnexpectedReply { method, got }
}
