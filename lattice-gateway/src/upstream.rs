//! Control-plane client.
//!
//! The gateway reaches the control plane over a Unix socket with
//! length-prefixed JSON frames, one request per connection. Both collaborator
//! contracts — command execution and token issuance — ride the same wire.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;

use lattice_auth::{Authenticator, Credentials};
use lattice_core::{BackendError, Chunk, ExecutionBackend};

/// Maximum frame size (16 MB).
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Read a length-delimited frame from an async reader.
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Bytes> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes", len),
        ));
    }

    let mut buf = BytesMut::with_capacity(len);
    buf.resize(len, 0);
    reader.read_exact(&mut buf).await?;

    Ok(buf.freeze())
}

/// Write a length-delimited frame to an async writer.
async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> std::io::Result<()> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("frame too large: {} bytes", data.len()),
        ));
    }

    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;

    Ok(())
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ControlRequest<'a> {
    Run { chunk: &'a Chunk },
    IssueToken { credentials: &'a Credentials },
}

#[derive(Deserialize)]
struct ControlReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the control-plane socket.
pub struct ControlPlaneClient {
    socket: PathBuf,
}

impl ControlPlaneClient {
    pub fn new(socket: PathBuf) -> Self {
        Self { socket }
    }

    async fn call(&self, request: &ControlRequest<'_>) -> Result<Value, BackendError> {
        let mut stream = UnixStream::connect(&self.socket).await.map_err(|e| {
            BackendError(format!(
                "control plane unreachable at {}: {e}",
                self.socket.display()
            ))
        })?;

        let payload = serde_json::to_vec(request)
            .map_err(|e| BackendError(format!("request encoding failed: {e}")))?;
        write_frame(&mut stream, &payload)
            .await
            .map_err(|e| BackendError(format!("control plane write failed: {e}")))?;

        let frame = read_frame(&mut stream)
            .await
            .map_err(|e| BackendError(format!("control plane read failed: {e}")))?;
        let reply: ControlReply = serde_json::from_slice(&frame)
            .map_err(|e| BackendError(format!("malformed control plane reply: {e}")))?;

        if let Some(error) = reply.error {
            return Err(BackendError(error));
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ExecutionBackend for ControlPlaneClient {
    async fn execute(&self, chunk: &Chunk) -> Result<Value, BackendError> {
        self.call(&ControlRequest::Run { chunk }).await
    }
}

#[async_trait]
impl Authenticator for ControlPlaneClient {
    async fn issue_token(&self, credentials: &Credentials) -> Result<Option<String>, BackendError> {
        match self.call(&ControlRequest::IssueToken { credentials }).await? {
            Value::Null | Value::Bool(false) => Ok(None),
            Value::String(token) => Ok(Some(token)),
            other => Err(BackendError(format!(
                "malformed token reply from control plane: {other}"
            ))),
        }
    }
}
