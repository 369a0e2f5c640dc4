//! Wire protocol between admission clients and `heimdalld`.
//!
//! Newline-delimited JSON over TCP. Each request line gets exactly one
//! response line, in order, on a persistent connection:
//!
//! ```text
//! → {"op":"acquire","holder":"sess:1f2e","operation_tag":"apify~web-scraper"}
//! ← {"kind":"admission","granted":true,"current_slots":1,"max_slots":32}
//! → {"op":"release","holder":"sess:1f2e"}
//! ← {"kind":"released"}
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::types::{AdmissionResult, AdmissionStatus, HolderId};
use crate::{HeimdallError, Result};

/// Longest accepted line, newline excluded.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Client → daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Acquire {
        holder: HolderId,
        operation_tag: String,
    },
    Release {
        holder: HolderId,
    },
    CleanupStale {
        max_age_secs: u64,
    },
    Status,
}

/// Machine-readable class of an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed request line.
    BadRequest,
    /// The holder was rejected by the authority.
    InvalidHolder,
    /// The authority could not serve the request.
    Unavailable,
}

/// Daemon → client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    Admission(AdmissionResult),
    Released,
    Reclaimed { count: usize },
    Status(AdmissionStatus),
    Error { code: ErrorCode, message: String },
}

impl Response {
    /// Encode an authority error for the wire.
    pub fn from_error(err: &HeimdallError) -> Self {
        let code = match err {
            HeimdallError::InvalidHolder(_) => ErrorCode::InvalidHolder,
            HeimdallError::Json(_) | HeimdallError::Protocol(_) => ErrorCode::BadRequest,
            _ => ErrorCode::Unavailable,
        };
        Response::Error {
            code,
            message: err.to_string(),
        }
    }
}

/// Read one JSON line. `Ok(None)` on clean end of stream.
///
/// `line` is a reusable buffer.
pub async fn read_frame<R, T>(reader: &mut R, line: &mut String) -> Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    line.clear();
    let limit = MAX_FRAME_BYTES as u64 + 1;
    let n = (&mut *reader).take(limit).read_line(line).await?;
    if n == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') {
        return Err(HeimdallError::Protocol(if n as u64 >= limit {
            format!("frame exceeds {MAX_FRAME_BYTES} bytes")
        } else {
            "connection closed mid-frame".to_string()
        }));
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}

/// Write one value as a JSON line and flush.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    fn holder(id: &str) -> HolderId {
        HolderId::new(id).unwrap()
    }

    #[test]
    fn request_wire_shape() {
        let req = Request::Acquire {
            holder: holder("s:1"),
            operation_tag: "scrape".into(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"op": "acquire", "holder": "s:1", "operation_tag": "scrape"})
        );
        assert_eq!(
            serde_json::to_value(Request::Status).unwrap(),
            json!({"op": "status"})
        );
    }

    #[test]
    fn response_wire_shape() {
        let resp = Response::Admission(AdmissionResult::denied(
            2,
            2,
            std::time::Duration::from_secs(30),
        ));
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({
                "kind": "admission",
                "granted": false,
                "current_slots": 2,
                "max_slots": 2,
                "estimated_wait_secs": 30
            })
        );
    }

    #[test]
    fn malformed_holder_is_rejected_on_decode() {
        let line = r#"{"op":"release","holder":"has space"}"#;
        assert!(serde_json::from_str::<Request>(line).is_err());
    }

    #[test]
    fn error_codes_follow_error_kind() {
        let resp = Response::from_error(&HeimdallError::InvalidHolder("dup".into()));
        assert!(matches!(
            resp,
            Response::Error {
                code: ErrorCode::InvalidHolder,
                ..
            }
        ));
        let resp = Response::from_error(&HeimdallError::Transport("down".into()));
        assert!(matches!(
            resp,
            Response::Error {
                code: ErrorCode::Unavailable,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn frames_survive_a_pipe() {
        let (client, server) = tokio::io::duplex(1024);
        let (_, mut client_w) = tokio::io::split(client);
        let (server_r, _) = tokio::io::split(server);

        write_frame(&mut client_w, &Request::Status).await.unwrap();
        write_frame(
            &mut client_w,
            &Request::CleanupStale { max_age_secs: 5 },
        )
        .await
        .unwrap();
        drop(client_w);

        let mut reader = BufReader::new(server_r);
        let mut line = String::new();
        let first: Request = read_frame(&mut reader, &mut line).await.unwrap().unwrap();
        assert_eq!(first, Request::Status);
        let second: Request = read_frame(&mut reader, &mut line).await.unwrap().unwrap();
        assert_eq!(second, Request::CleanupStale { max_age_secs: 5 });
        let end: Option<Request> = read_frame(&mut reader, &mut line).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let data = vec![b'a'; MAX_FRAME_BYTES + 10];
        let mut reader = BufReader::new(&data[..]);
        let mut line = String::new();
        let err = read_frame::<_, Request>(&mut reader, &mut line)
            .await
            .unwrap_err();
        assert!(matches!(err, HeimdallError::Protocol(_)));
    }

    #[tokio::test]
    async fn truncated_frame_is_rejected() {
        let data = br#"{"op":"status"}"#;
        let mut reader = BufReader::new(&data[..]);
        let mut line = String::new();
        let err = read_frame::<_, Request>(&mut reader, &mut line)
            .await
            .unwrap_err();
        assert!(matches!(err, HeimdallError::Protocol(_)));
    }
}
