//! Control socket client.

use crate::{ControlRequest, IpcError, IpcResult};
use mirror_engine::SessionSnapshot;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

pub struct ControlClient {
    socket_path: PathBuf,
}

impl ControlClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Open a connection that yields every snapshot the server pushes.
    pub async fn subscribe(&self) -> IpcResult<SnapshotStream> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| IpcError::Socket(format!("Failed to connect: {}", e)))?;
        let (reader, writer) = stream.into_split();
        Ok(SnapshotStream {
            reader: BufReader::new(reader),
            writer,
            line: String::new(),
        })
    }

    /// Current snapshot.
    pub async fn status(&self) -> IpcResult<SessionSnapshot> {
        let mut stream = self.subscribe().await?;
        stream.next().await?.ok_or(IpcError::ConnectionClosed)
    }

    /// Send `request` and wait until the server has taken it.
    ///
    /// Returns the last snapshot received on the connection.
    pub async fn send(&self, request: ControlRequest) -> IpcResult<SessionSnapshot> {
        let mut stream = self.subscribe().await?;
        let mut latest = stream.next().await?.ok_or(IpcError::ConnectionClosed)?;
        stream.send(request).await?;
        stream.finish().await?;
        // The server closes once it has read our half-close
        while let Some(snapshot) = stream.next().await? {
            latest = snapshot;
        }
        Ok(latest)
    }

    pub async fn is_running(&self) -> bool {
        self.status().await.is_ok()
    }
}

/// An open control connection.
pub struct SnapshotStream {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    line: String,
}

impl SnapshotStream {
    /// Next pushed snapshot, `None` once the server closed the connection.
    pub async fn next(&mut self) -> IpcResult<Option<SessionSnapshot>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                return Ok(None);
            }
            let trimmed = self.line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(serde_json::from_str(trimmed)?));
            }
        }
    }

    pub async fn send(&mut self, request: ControlRequest) -> IpcResult<()> {
        self.send_line(&request.to_json()?).await
    }

    pub(crate) async fn send_line(&mut self, line: &str) -> IpcResult<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Close the sending side; pushed snapshots still arrive.
    pub async fn finish(&mut self) -> IpcResult<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
