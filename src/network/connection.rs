//! Connection Handler
//!
//! Runs one session's read → dispatch → write loop.

use std::io::{BufWriter, ErrorKind};
use std::net::TcpStream;
use std::time::Duration;

use super::ShutdownSignal;
use crate::error::{BridgeError, Result};
use crate::protocol::{read_message, write_response};
use crate::session::{Reply, Session};

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (unbuffered: one read is one message)
    reader: TcpStream,

    /// TCP stream writer (buffered, flushed per response)
    writer: BufWriter<TcpStream>,

    /// The instance bound to this connection
    session: Session,

    /// Server-wide stop flag
    shutdown: ShutdownSignal,

    /// Single-read message buffer
    buffer: Vec<u8>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(
        stream: TcpStream,
        session: Session,
        shutdown: ShutdownSignal,
        buffer_size: usize,
    ) -> Result<Self> {
        let peer_addr = session.peer().to_string();

        // Disable Nagle's algorithm: every response is a tiny packet the
        // client is blocked on
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: read_stream,
            writer: BufWriter::new(write_stream),
            session,
            shutdown,
            buffer: vec![0u8; buffer_size],
            peer_addr,
        })
    }

    /// Configure connection timeouts
    ///
    /// The read timeout is the polling interval at which an idle session
    /// notices shutdown.
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Returns `Ok` when the client closes the session or disconnects, or
    /// when the server shuts down. Protocol faults are returned as errors.
    /// The instance log is released on every path.
    pub fn handle(&mut self) -> Result<()> {
        tracing::info!("Connected: {} (session {})", self.peer_addr, self.session.id());

        let result = self.serve();
        if let Some(path) = self.session.log_path() {
            tracing::debug!(
                "Session {} ended mid-step, releasing {}",
                self.session.id(),
                path.display()
            );
        }
        self.session.close();

        tracing::info!("Disconnected: {}", self.peer_addr);
        result
    }

    fn serve(&mut self) -> Result<()> {
        while !self.shutdown.is_triggered() {
            let len = match read_message(&mut self.reader, &mut self.buffer[..]) {
                Ok(0) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Ok(n) => n,
                Err(BridgeError::Io(ref e))
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) =>
                {
                    // Read timeout (WouldBlock on Unix, TimedOut on Windows):
                    // poll the shutdown flag and keep waiting
                    continue;
                }
                Err(e) if e.is_disconnect() => {
                    tracing::debug!("Connection to {} lost: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            match self.session.handle_message(&self.buffer[..len])? {
                Reply::Send(response) => {
                    if let Err(e) = write_response(&mut self.writer, &response) {
                        if e.is_disconnect() {
                            tracing::debug!(
                                "Client {} disconnected before response could be sent: {}",
                                self.peer_addr,
                                e
                            );
                            return Ok(());
                        }
                        return Err(e);
                    }
                }
                Reply::Close => return Ok(()),
            }
        }

        tracing::debug!("Session {} stopping for shutdown", self.session.id());
        Ok(())
    }

    /// The session bound to this connection
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
