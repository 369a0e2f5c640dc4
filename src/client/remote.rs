//! [`RemoteAdmission`]: [`AdmissionControl`] implementation that talks to heimdalld.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::admission::AdmissionControl;
use crate::server::protocol::{ErrorCode, Request, Response, read_frame, write_frame};
use crate::types::{AdmissionResult, AdmissionStatus, HolderId};
use crate::{HeimdallError, Result};

/// Bound on one request/response exchange, connect included.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    line: String,
}

impl Connection {
    async fn open(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| HeimdallError::Transport(format!("failed to connect to {addr}: {e}")))?;
        stream.set_nodelay(true)?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer,
            line: String::new(),
        })
    }

    /// `None` when the daemon closed the connection before answering.
    async fn exchange(&mut self, request: &Request) -> Result<Option<Response>> {
        write_frame(&mut self.writer, request).await?;
        read_frame(&mut self.reader, &mut self.line).await
    }
}

fn closed() -> HeimdallError {
    HeimdallError::Transport("heimdalld closed the connection".into())
}

/// An [`AdmissionControl`] client backed by a remote heimdalld.
///
/// Holds one persistent connection and serializes requests over it. The
/// connection is dropped after any I/O error (or a cancelled call) and
/// reopened on the next request.
///
/// `acquire` is never retried once the daemon may have seen it: it may have
/// granted the slot before the connection failed. The only exception is a
/// pooled connection found closed before any answer, which is replaced
/// transparently for every request. The other operations are idempotent and
/// get one retry on a fresh connection after any transport error.
pub struct RemoteAdmission {
    addr: String,
    io_timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl RemoteAdmission {
    /// Create a client for `addr` (`host:port`). Connects lazily.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            io_timeout: DEFAULT_IO_TIMEOUT,
            conn: Mutex::new(None),
        }
    }

    /// Create a client and open the connection right away.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let admission = RemoteAdmission::connect("127.0.0.1:9742").await?;
    /// ```
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        let client = Self::new(addr);
        let conn = Connection::open(&client.addr).await?;
        *client.conn.lock().await = Some(conn);
        Ok(client)
    }

    /// Set the per-exchange timeout.
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn call(&self, request: Request) -> Result<Response> {
        let mut guard = self.conn.lock().await;
        // Taken out for the exchange; a cancelled call leaves `None` behind
        // instead of a half-read connection.
        if let Some(mut conn) = guard.take() {
            match self.timed(conn.exchange(&request)).await? {
                Some(response) => {
                    *guard = Some(conn);
                    return Ok(response);
                }
                // EOF on a pooled connection: the daemon closed it while idle
                // (usually a restart) and never saw this request.
                None => debug!(addr = %self.addr, "pooled connection was closed, reconnecting"),
            }
        }

        debug!(addr = %self.addr, "connecting to heimdalld");
        let mut conn = self.timed(Connection::open(&self.addr)).await?;
        let response = self
            .timed(conn.exchange(&request))
            .await?
            .ok_or_else(closed)?;
        *guard = Some(conn);
        Ok(response)
    }

    async fn call_idempotent(&self, request: Request) -> Result<Response> {
        match self.call(request.clone()).await {
            Err(HeimdallError::Transport(e)) => {
                warn!(addr = %self.addr, error = %e, "heimdalld request failed, retrying once");
                self.call(request).await
            }
            other => other,
        }
    }

    async fn timed<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.io_timeout, fut)
            .await
            .map_err(|_| {
                HeimdallError::Transport(format!(
                    "heimdalld at {} did not answer within {:?}",
                    self.addr, self.io_timeout
                ))
            })?
    }
}

fn from_error_response(code: ErrorCode, message: String) -> HeimdallError {
    match code {
        ErrorCode::InvalidHolder => HeimdallError::InvalidHolder(message),
        ErrorCode::BadRequest => HeimdallError::Protocol(message),
        ErrorCode::Unavailable => HeimdallError::Transport(message),
    }
}

fn unexpected(expected: &str, got: Response) -> HeimdallError {
    match got {
        Response::Error { code, message } => from_error_response(code, message),
        other => HeimdallError::Protocol(format!("expected {expected} response, got {other:?}")),
    }
}

#[async_trait]
impl AdmissionControl for RemoteAdmission {
    async fn acquire(&self, holder: &HolderId, operation_tag: &str) -> Result<AdmissionResult> {
        let request = Request::Acquire {
            holder: holder.clone(),
            operation_tag: operation_tag.to_owned(),
        };
        match self.call(request).await? {
            Response::Admission(result) => Ok(result),
            other => Err(unexpected("admission", other)),
        }
    }

    async fn release(&self, holder: &HolderId) -> Result<()> {
        let request = Request::Release {
            holder: holder.clone(),
        };
        match self.call_idempotent(request).await? {
            Response::Released => Ok(()),
            other => Err(unexpected("released", other)),
        }
    }

    async fn cleanup_stale(&self, max_age: Duration) -> Result<usize> {
        let request = Request::CleanupStale {
            max_age_secs: max_age.as_secs(),
        };
        match self.call_idempotent(request).await? {
            Response::Reclaimed { count } => Ok(count),
            other => Err(unexpected("reclaimed", other)),
        }
    }

    async fn status(&self) -> Result<AdmissionStatus> {
        match self.call_idempotent(Request::Status).await? {
            Response::Status(status) => Ok(status),
            other => Err(unexpected("status", other)),
        }
    }
}
