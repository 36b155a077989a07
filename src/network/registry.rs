//! Session Registry
//!
//! Live sessions keyed by id, used only to coordinate shutdown. No instance
//! data passes through here.
//!
//! ## Locking
//! The map sits behind one `parking_lot::Mutex`. The lock covers map
//! mutation only; socket shutdowns and thread joins happen after entries
//! have been moved out of the map.

use std::collections::HashMap;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;

use crate::session::SessionId;

/// Handle to one session's thread and connection
pub struct SessionHandle {
    /// Peer address for logging
    peer: SocketAddr,

    /// Clone of the session's socket, used to unblock it at shutdown
    stream: TcpStream,

    /// Session thread, once spawned
    thread: Option<JoinHandle<()>>,

    /// Disconnects when the session thread drops its sender
    done: Receiver<()>,
}

impl SessionHandle {
    pub fn new(peer: SocketAddr, stream: TcpStream, done: Receiver<()>) -> Self {
        Self {
            peer,
            stream,
            thread: None,
            done,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// True once the session thread has let go of its sender
    pub fn is_finished(&self) -> bool {
        matches!(
            self.done.try_recv(),
            Err(crossbeam::channel::TryRecvError::Disconnected)
        )
    }
}

/// Thread-safe collection of live sessions
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session (called by the listener on accept)
    pub fn insert(&self, id: SessionId, handle: SessionHandle) {
        self.sessions.lock().insert(id, handle);
    }

    /// Attach the session's thread handle once it has been spawned
    ///
    /// Returns false if the session already finished and removed itself.
    pub fn attach_thread(&self, id: SessionId, thread: JoinHandle<()>) -> bool {
        match self.sessions.lock().get_mut(&id) {
            Some(handle) => {
                handle.thread = Some(thread);
                true
            }
            None => false,
        }
    }

    /// Deregister a session (called when its loop ends)
    pub fn remove(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Ids and peers of all registered sessions, sorted by id
    pub fn sessions(&self) -> Vec<(SessionId, SocketAddr)> {
        let mut list: Vec<_> = self
            .sessions
            .lock()
            .iter()
            .map(|(id, handle)| (*id, handle.peer))
            .collect();
        list.sort_by_key(|(id, _)| *id);
        list
    }

    /// Close every registered connection and wait for the session threads
    ///
    /// Waits at most `grace` in total. Returns the number of sessions that
    /// had not finished by then.
    pub fn close_all(&self, grace: Duration) -> usize {
        let drained: Vec<(SessionId, SessionHandle)> = self.sessions.lock().drain().collect();
        if drained.is_empty() {
            return 0;
        }

        tracing::info!("Closing {} session(s)", drained.len());
        for (id, handle) in &drained {
            if handle.is_finished() {
                tracing::debug!("Session {} ({}) already finished", id, handle.peer);
                continue;
            }
            if let Err(e) = handle.stream.shutdown(Shutdown::Both) {
                tracing::debug!("Session {} socket already closed: {}", id, e);
            }
        }

        let deadline = Instant::now() + grace;
        let mut stragglers = 0;
        for (id, mut handle) in drained {
            match handle.done.recv_deadline(deadline) {
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!("Session {} ({}) did not finish in time", id, handle.peer);
                    stragglers += 1;
                }
                _ => {
                    if let Some(thread) = handle.thread.take() {
                        if thread.join().is_err() {
                            tracing::warn!("Session {} thread panicked", id);
                        }
                    }
                }
            }
        }
        stragglers
    }
}
