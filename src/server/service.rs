//! TCP service exposing an [`AdmissionControl`] authority.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::protocol::{ErrorCode, Request, Response, read_frame, write_frame};
use crate::admission::AdmissionControl;
use crate::{HeimdallError, Result};

/// Serves the line protocol on top of an authority.
///
/// Every connection gets its own task; all of them share `authority`, so
/// the authority's own ordering is what keeps occupancy consistent.
pub struct AdmissionService<A: AdmissionControl> {
    authority: Arc<A>,
}

impl<A: AdmissionControl> Clone for AdmissionService<A> {
    fn clone(&self) -> Self {
        Self {
            authority: Arc::clone(&self.authority),
        }
    }
}

impl<A: AdmissionControl + 'static> AdmissionService<A> {
    /// Create a new service wrapping the given authority.
    pub fn new(authority: Arc<A>) -> Self {
        Self { authority }
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running until their peer hangs up.
    pub async fn serve_with_shutdown(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let local = listener.local_addr()?;
        info!(addr = %local, "admission service listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    let service = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = service.serve_connection(stream, peer).await {
                            warn!(peer = %peer, error = %e, "connection closed with error");
                        }
                    });
                }
                () = &mut shutdown => {
                    info!(addr = %local, "admission service shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn serve_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        debug!(peer = %peer, "connection opened");
        stream.set_nodelay(true)?;
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);
        let mut line = String::new();

        loop {
            let response = match read_frame::<_, Request>(&mut reader, &mut line).await {
                Ok(Some(request)) => self.handle(request).await,
                Ok(None) => break,
                // A bad line does not desync the stream; answer and go on.
                Err(HeimdallError::Json(e)) => Response::Error {
                    code: ErrorCode::BadRequest,
                    message: format!("malformed request: {e}"),
                },
                Err(e) => {
                    // Best effort: the peer may already be gone.
                    let _ = write_frame(&mut write, &Response::from_error(&e)).await;
                    return Err(e);
                }
            };
            write_frame(&mut write, &response).await?;
        }

        debug!(peer = %peer, "connection closed");
        Ok(())
    }

    /// Apply one request to the authority.
    pub async fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::Acquire {
                holder,
                operation_tag,
            } => self
                .authority
                .acquire(&holder, &operation_tag)
                .await
                .map(Response::Admission),
            Request::Release { holder } => self
                .authority
                .release(&holder)
                .await
                .map(|()| Response::Released),
            Request::CleanupStale { max_age_secs } => self
                .authority
                .cleanup_stale(Duration::from_secs(max_age_secs))
                .await
                .map(|count| Response::Reclaimed { count }),
            Request::Status => self.authority.status().await.map(Response::Status),
        };
        result.unwrap_or_else(|e| Response::from_error(&e))
    }
}
