//! Unix-domain-socket server and connection dispatcher.
//!
//! Accepts connections, assigns each a monotonically increasing `cid`,
//! and runs one reader task per connection. Every decoded frame is
//! dispatched on its own task so a slow handler never blocks the frames
//! behind it on the same connection.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use elephant_core::paths;
use elephant_proto::{ConnectionWriter, ProtocolError, RequestCodec};

use crate::Service;
use crate::handlers;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket path to listen on.
    pub socket_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: paths::socket_path(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }
}

/// The bound listener.
pub struct Server {
    config: ServerConfig,
    listener: UnixListener,
}

impl Server {
    /// Create the socket directory, remove a stale socket file, and
    /// bind.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created or the
    /// socket cannot be bound.
    pub fn bind(config: ServerConfig) -> Result<Self, ProtocolError> {
        if let Some(parent) = config.socket_path.parent() {
            ensure_directory(parent)?;
        }

        if config.socket_path.exists() {
            std::fs::remove_file(&config.socket_path)?;
            debug!(path = %config.socket_path.display(), "removed stale socket");
        }

        let listener = UnixListener::bind(&config.socket_path).map_err(|e| {
            ProtocolError::Io(io::Error::new(
                e.kind(),
                format!("failed to bind {}: {e}", config.socket_path.display()),
            ))
        })?;

        info!(socket = %config.socket_path.display(), "listening");

        Ok(Self { config, listener })
    }

    /// The socket path this server listens on.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Accept connections forever.
    ///
    /// # Errors
    ///
    /// Only unrecoverable listener failures end the loop; individual
    /// accept errors are logged and retried.
    pub async fn run(&self, service: Arc<Service>) -> Result<(), ProtocolError> {
        let mut cid: u32 = 0;

        loop {
            let (stream, _addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    continue;
                }
            };

            cid = cid.wrapping_add(1);
            debug!(cid, "new connection");

            let service = Arc::clone(&service);
            tokio::spawn(handle_connection(stream, cid, service));
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.config.socket_path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(error = %err, "socket not removed");
            }
        }
    }
}

fn ensure_directory(path: &Path) -> Result<(), ProtocolError> {
    if path.exists() {
        return Ok(());
    }

    std::fs::create_dir_all(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(())
}

/// Read frames until EOF or a fatal protocol error; spawn one handler
/// task per frame.
async fn handle_connection(stream: UnixStream, cid: u32, service: Arc<Service>) {
    let (read, write) = stream.into_split();
    let writer = Arc::new(ConnectionWriter::new(cid, write));
    let mut frames = FramedRead::new(read, RequestCodec);

    while let Some(next) = frames.next().await {
        match next {
            Ok(frame) => {
                let service = Arc::clone(&service);
                let writer = Arc::clone(&writer);
                // A panicking handler must never take the reader down
                // with it, so every frame gets its own task.
                tokio::spawn(async move {
                    handlers::dispatch(frame, writer, service).await;
                });
            }
            Err(err) => {
                warn!(cid, error = %err, "closing connection");
                break;
            }
        }
    }

    debug!(cid, "connection closed");
}
