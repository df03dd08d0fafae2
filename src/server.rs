use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::cmd::{Backend, Command};
use crate::connection::Connection;
use crate::frame::Frame;
use crate::session::Session;

/// Reply sent when a collaborator fails mid-command. The session stays open.
pub const INTERNAL_ERROR: &str = "Internal error - the command could not be completed";

/// Longest pause between two failed accepts.
const MAX_ACCEPT_BACKOFF_SECS: u64 = 64;

struct Listener {
    listener: TcpListener,
    backend: Backend,
    next_session: u64,
}

/// Per-connection state: the transport and the session it authenticates.
struct Handler {
    connection: Connection,
    session: Session,
    backend: Backend,
}

/// Serves connections from `listener` until `shutdown` completes.
pub async fn run(listener: TcpListener, backend: Backend, shutdown: impl Future) {
    let mut server = Listener {
        listener,
        backend,
        next_session: 0,
    };

    tokio::select! {
        _ = server.run() => {}
        _ = shutdown => {
            info!("shutting down");
        }
    }
}

impl Listener {
    /// Accepts connections forever, spawning one task per connection. Tasks
    /// share nothing but the backend.
    async fn run(&mut self) {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "accepting connections");
        }

        loop {
            let (socket, peer) = self.accept().await;

            self.next_session += 1;
            let id = self.next_session;

            let mut handler = Handler {
                connection: Connection::new(socket),
                session: Session::new(id),
                backend: self.backend.clone(),
            };

            let span = info_span!("session", id, %peer);

            tokio::spawn(
                async move {
                    info!("connected");

                    if let Err(err) = handler.run().await {
                        warn!(%err, "connection error");
                    }

                    info!("connection closed");
                }
                .instrument(span),
            );
        }
    }

    /// Waits for the next connection. Accept errors (fd exhaustion, aborted
    /// handshakes) are logged and retried with a capped exponential backoff
    /// that starts over on every call.
    async fn accept(&mut self) -> (TcpStream, SocketAddr) {
        let mut backoff = 1;

        loop {
            match self.listener.accept().await {
                Ok(accepted) => return accepted,
                Err(err) => {
                    error!(%err, retry_in_secs = backoff, "accept failed");
                }
            }

            tokio::time::sleep(Duration::from_secs(backoff)).await;

            backoff = next_backoff(backoff);
        }
    }
}

fn next_backoff(secs: u64) -> u64 {
    (secs * 2).min(MAX_ACCEPT_BACKOFF_SECS)
}

impl Handler {
    /// Reads one line, answers it with exactly one line, repeats. Ends on
    /// `disconnect`, end of stream or an I/O error.
    async fn run(&mut self) -> crate::Result<()> {
        loop {
            let frame = match self.connection.read_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!("peer closed the stream");
                    return Ok(());
                }
                Err(crate::Error::Frame(err)) if err.is_recoverable() => {
                    warn!(%err, "unreadable request");
                    self.connection
                        .write_line(&format!("Invalid command - {err}"))
                        .await?;
                    continue;
                }
                Err(err) => return Err(err),
            };

            if frame.is_disconnect() {
                debug!("client requested disconnect");
                return self.connection.shutdown().await;
            }

            let response = self.respond(frame);

            self.connection.write_line(&response).await?;
        }
    }

    fn respond(&mut self, frame: Frame) -> String {
        let cmd = match Command::from_frame(frame) {
            Ok(cmd) => cmd,
            Err(err) => {
                warn!(%err, "invalid command");
                return format!("Invalid command - {err}");
            }
        };

        let name = cmd.name();

        // Password hashing and the journal fsync run inline on this worker.
        // Both are bounded per request and the store lock is never held
        // across an await.

        match cmd.execute(&mut self.session, &self.backend) {
            Ok(outcome) => {
                debug!(command = name, success = outcome.success, "executed");
                outcome.message
            }
            Err(err) => {
                error!(command = name, %err, "command failed");
                INTERNAL_ERROR.to_string()
            }
        }
    }
}
