//! Control socket server.

use crate::{ControlRequest, IpcError, IpcResult};
use mirror_engine::{ControlCommand, SessionSnapshot, SnapshotFeed};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Serves control clients until [`shutdown`](Self::shutdown).
pub struct ControlServer {
    socket_path: PathBuf,
    feed: SnapshotFeed,
    commands: mpsc::Sender<ControlCommand>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ControlServer {
    pub fn new(
        socket_path: impl Into<PathBuf>,
        feed: SnapshotFeed,
        commands: mpsc::Sender<ControlCommand>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            socket_path: socket_path.into(),
            feed,
            commands,
            shutdown_tx,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sender that stops the server and all its connections.
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the socket and accept clients.
    pub async fn run(&self) -> IpcResult<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path.display(), "Control socket listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let feed = self.feed.clone();
                        let commands = self.commands.clone();
                        let shutdown = self.shutdown_tx.subscribe();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, feed, commands, shutdown).await {
                                debug!(error = %e, "Control connection ended with error");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "Accept error"),
                },
                _ = shutdown_rx.recv() => {
                    info!("Control socket shutting down");
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

async fn handle_connection(
    stream: UnixStream,
    feed: SnapshotFeed,
    commands: mpsc::Sender<ControlCommand>,
    mut shutdown: broadcast::Receiver<()>,
) -> IpcResult<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    // Subscribe before reading the current value so no change is missed
    let mut changes = feed.subscribe();
    write_snapshot(&mut writer, &feed.current()).await?;
    debug!("Control client connected");

    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(snapshot) => write_snapshot(&mut writer, &snapshot).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Control client lagged, sending latest");
                    write_snapshot(&mut writer, &feed.current()).await?;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            read = reader.read_line(&mut line) => {
                if read? == 0 {
                    debug!("Control client disconnected");
                    break;
                }
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    match ControlRequest::from_json(trimmed) {
                        Ok(request) => {
                            debug!(request = ?request, "Control request");
                            match request.command() {
                                Some(command) => commands
                                    .send(command)
                                    .await
                                    .map_err(|_| IpcError::ShuttingDown)?,
                                None => write_snapshot(&mut writer, &feed.current()).await?,
                            }
                        }
                        Err(e) => warn!(error = %e, "Ignoring invalid control message"),
                    }
                }
                line.clear();
            },

            _ = shutdown.recv() => break,
        }
    }

    Ok(())
}

async fn write_snapshot(writer: &mut OwnedWriteHalf, snapshot: &SessionSnapshot) -> IpcResult<()> {
    let mut json = serde_json::to_string(snapshot)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ControlClient;
    use mirror_engine::{SessionState, SessionStatus};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    struct Fixture {
        server: Arc<ControlServer>,
        feed: SnapshotFeed,
        commands: mpsc::Receiver<ControlCommand>,
        client: ControlClient,
        _dir: TempDir,
    }

    async fn start_server() -> Fixture {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("control.sock");
        let feed = SnapshotFeed::new(SessionState::new(true, false).snapshot());
        let (tx, commands) = mpsc::channel(8);

        let server = Arc::new(ControlServer::new(&socket, feed.clone(), tx));
        let running = server.clone();
        tokio::spawn(async move { running.run().await.unwrap() });

        let client = ControlClient::new(&socket);
        for _ in 0..100 {
            if socket.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Fixture {
            server,
            feed,
            commands,
            client,
            _dir: dir,
        }
    }

    fn snapshot(status: SessionStatus, trust_lines: u64) -> SessionSnapshot {
        let mut session = SessionState::new(true, false);
        session.status = status;
        session.trust_lines_today = trust_lines;
        session.snapshot()
    }

    #[tokio::test]
    async fn test_status_returns_current_snapshot() {
        let fixture = start_server().await;
        fixture.feed.publish(snapshot(SessionStatus::Running, 3));

        let status = fixture.client.status().await.unwrap();
        assert_eq!(status.status, SessionStatus::Running);
        assert_eq!(status.trust_lines_today, 3);
        assert!(status.test_mode);
    }

    #[tokio::test]
    async fn test_start_and_stop_reach_supervisor() {
        let mut fixture = start_server().await;

        fixture.client.send(ControlRequest::Start).await.unwrap();
        fixture.client.send(ControlRequest::Stop).await.unwrap();

        assert_eq!(fixture.commands.recv().await, Some(ControlCommand::Start));
        assert_eq!(fixture.commands.recv().await, Some(ControlCommand::Stop));
    }

    #[tokio::test]
    async fn test_changes_are_pushed() {
        let fixture = start_server().await;
        let mut stream = fixture.client.subscribe().await.unwrap();

        let initial = stream.next().await.unwrap().unwrap();
        assert_eq!(initial.status, SessionStatus::Idle);

        fixture.feed.publish(snapshot(SessionStatus::Starting, 0));
        fixture.feed.publish(snapshot(SessionStatus::Running, 0));

        let first = timeout(Duration::from_secs(5), stream.next()).await.unwrap();
        let second = timeout(Duration::from_secs(5), stream.next()).await.unwrap();
        assert_eq!(first.unwrap().unwrap().status, SessionStatus::Starting);
        assert_eq!(second.unwrap().unwrap().status, SessionStatus::Running);
    }

    #[tokio::test]
    async fn test_invalid_messages_are_ignored() {
        let mut fixture = start_server().await;
        let mut stream = fixture.client.subscribe().await.unwrap();
        stream.next().await.unwrap().unwrap();

        stream.send_line("not json").await.unwrap();
        stream.send_line(r#"{"type":"reboot"}"#).await.unwrap();
        stream.send(ControlRequest::Status).await.unwrap();

        // Connection survives and answers the status request
        let reply = timeout(Duration::from_secs(5), stream.next()).await.unwrap();
        assert_eq!(reply.unwrap().unwrap().status, SessionStatus::Idle);
        assert!(fixture.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_removes_socket() {
        let fixture = start_server().await;
        let socket = fixture.server.socket_path().to_path_buf();
        let mut stream = fixture.client.subscribe().await.unwrap();
        stream.next().await.unwrap().unwrap();

        fixture.server.shutdown();

        let ended = timeout(Duration::from_secs(5), stream.next()).await.unwrap();
        assert!(ended.unwrap().is_none());
        for _ in 0..100 {
            if !socket.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!socket.exists());
        assert!(!fixture.client.is_running().await);
    }
}
