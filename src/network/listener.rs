//! TCP Listener
//!
//! Accepts connections and runs one session thread per connection.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel;

use super::{Connection, SessionHandle, SessionRegistry, ShutdownSignal};
use crate::config::{Config, FaultPolicy, ServerMode};
use crate::error::{BridgeError, Result};
use crate::session::{Evaluator, Session, SessionId};

/// Upper bound on the sleep between non-blocking accept attempts
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Accept loop bound to one port
pub struct Listener {
    /// Listening socket; dropped once no more connections are wanted
    listener: Option<TcpListener>,

    local_addr: SocketAddr,
    config: Config,
    registry: Arc<SessionRegistry>,
    shutdown: ShutdownSignal,
    evaluator: Arc<dyn Evaluator>,
    next_id: u64,
}

impl Listener {
    /// Bind the configured address
    ///
    /// The socket is non-blocking so the accept loop can poll the shutdown
    /// signal.
    pub fn bind(
        config: Config,
        registry: Arc<SessionRegistry>,
        shutdown: ShutdownSignal,
        evaluator: Arc<dyn Evaluator>,
    ) -> Result<Self> {
        config.validate()?;

        let listener =
            TcpListener::bind(&config.listen_addr).map_err(|source| BridgeError::Bind {
                addr: config.listen_addr.clone(),
                source,
            })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener: Some(listener),
            local_addr,
            config,
            registry,
            shutdown,
            evaluator,
            next_id: 1,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the shutdown signal is set
    ///
    /// On the way out: stop listening, close every registered session and
    /// wait (bounded) for their threads.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!(
            "Listening on {} ({:?} mode)",
            self.local_addr,
            self.config.mode
        );

        let backoff = self.config.poll_interval().min(ACCEPT_BACKOFF);
        let mut result = Ok(());

        while !self.shutdown.is_triggered() {
            let Some(listener) = self.listener.as_ref() else {
                // Single mode after its one connection: just wait for the end
                thread::sleep(backoff);
                continue;
            };

            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.accept(stream, peer) {
                        tracing::warn!("Failed to start session for {}: {}", peer, e);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(backoff),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                    result = Err(e.into());
                    break;
                }
            }
        }

        self.listener = None;
        for (id, peer) in self.registry.sessions() {
            tracing::debug!("Session {} ({}) still open at shutdown", id, peer);
        }
        let stragglers = self.registry.close_all(self.config.shutdown_grace());
        if stragglers > 0 {
            tracing::warn!("{} session(s) still running after shutdown", stragglers);
        }
        tracing::info!("Listener on {} stopped", self.local_addr);
        result
    }

    /// Register and start a session for a freshly accepted connection
    fn accept(&mut self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        if self.registry.len() >= self.config.max_connections {
            tracing::warn!(
                "Refusing {}: {} connections already open",
                peer,
                self.config.max_connections
            );
            return Ok(());
        }

        // Accepted sockets may inherit non-blocking mode from the listener
        stream.set_nonblocking(false)?;

        let id = SessionId(self.next_id);
        self.next_id += 1;

        let session = Session::new(id, peer, self.config.mode, Arc::clone(&self.evaluator));
        let mut connection = Connection::new(
            stream.try_clone()?,
            session,
            self.shutdown.clone(),
            self.config.buffer_size,
        )?;
        connection.set_timeouts(self.config.poll_interval_ms, self.config.write_timeout_ms)?;

        let (done_tx, done_rx) = channel::bounded::<()>(0);
        self.registry
            .insert(id, SessionHandle::new(peer, stream, done_rx));

        let registry = Arc::clone(&self.registry);
        let shutdown = self.shutdown.clone();
        let policy = self.config.fault_policy;
        let mode = self.config.mode;

        let spawned = thread::Builder::new()
            .name(format!("session-{}", id.0))
            .spawn(move || {
                let _done = done_tx;
                run_session(connection, &registry, &shutdown, policy, mode);
            });

        match spawned {
            Ok(thread) => {
                self.registry.attach_thread(id, thread);
            }
            Err(e) => {
                self.registry.remove(id);
                return Err(e.into());
            }
        }

        if mode == ServerMode::Single {
            tracing::info!("Single-session mode: no longer accepting connections");
            self.listener = None;
        }
        Ok(())
    }
}

/// Body of a session thread
fn run_session(
    mut connection: Connection,
    registry: &SessionRegistry,
    shutdown: &ShutdownSignal,
    policy: FaultPolicy,
    mode: ServerMode,
) {
    let id = connection.session().id();

    if let Err(e) = connection.handle() {
        if e.is_protocol_fault() {
            tracing::warn!(
                "Session {} ({}) closed after fault: {}",
                id,
                connection.peer_addr(),
                e
            );
            if policy == FaultPolicy::ShutdownServer
                && shutdown.trigger_fault(format!("session {}: {}", id, e))
            {
                tracing::error!("Shutting down server after fault in session {}", id);
            }
        } else {
            tracing::warn!("Session {} ({}) ended with error: {}", id, connection.peer_addr(), e);
        }
    }

    registry.remove(id);

    if mode == ServerMode::Single && shutdown.trigger() {
        tracing::info!("Single-session mode: session {} ended, shutting down", id);
    }
}
