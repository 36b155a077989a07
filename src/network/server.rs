//! TCP Server
//!
//! Owns the shutdown signal and session registry and runs the listener.

use std::net::SocketAddr;
use std::sync::Arc;

use super::{Listener, SessionRegistry, ShutdownSignal};
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::session::{Evaluator, LinearGain};

/// TCP server for simbridge
pub struct Server {
    listener: Listener,
    registry: Arc<SessionRegistry>,
    shutdown: ShutdownSignal,
}

impl Server {
    /// Bind a server using the default linear-gain evaluation
    pub fn bind(config: Config) -> Result<Self> {
        Self::bind_with_evaluator(config, Arc::new(LinearGain))
    }

    /// Bind a server with a custom evaluation policy
    pub fn bind_with_evaluator(config: Config, evaluator: Arc<dyn Evaluator>) -> Result<Self> {
        let registry = Arc::new(SessionRegistry::new());
        let shutdown = ShutdownSignal::new();
        let listener = Listener::bind(config, Arc::clone(&registry), shutdown.clone(), evaluator)?;

        Ok(Self {
            listener,
            registry,
            shutdown,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// A handle that can stop the server from another thread
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Start the server (blocking)
    ///
    /// Returns once the shutdown signal is set and sessions are closed. A
    /// shutdown caused by a session fault is reported as
    /// `BridgeError::SessionFault`.
    pub fn run(&mut self) -> Result<()> {
        self.listener.run()?;

        match self.shutdown.fault() {
            Some(fault) => Err(BridgeError::SessionFault(fault)),
            None => Ok(()),
        }
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }
}
