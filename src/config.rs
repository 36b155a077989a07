//! Configuration for simbridge
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::protocol::MAX_MESSAGE_SIZE;

/// Port the server listens on when none is given
pub const DEFAULT_PORT: u16 = 1024;

/// Main configuration for a simbridge server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Size of the single-read message buffer (bytes)
    pub buffer_size: usize,

    /// Accept polling interval and per-session read timeout (milliseconds)
    pub poll_interval_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,

    /// How long shutdown waits for session threads (milliseconds)
    pub shutdown_grace_ms: u64,

    // -------------------------------------------------------------------------
    // Session Policy
    // -------------------------------------------------------------------------
    /// Single- or multi-session operation
    pub mode: ServerMode,

    /// What a protocol fault in one session does to the rest of the server
    pub fault_policy: FaultPolicy,
}

/// How many simulated instances one server process serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// One listener, any number of concurrent sessions.
    ///
    /// CloseSession closes only the issuing connection.
    #[default]
    Multi,

    /// Accept exactly one connection, then stop listening.
    ///
    /// The server shuts down when that session ends, so CloseSession is
    /// equivalent to a full shutdown. GetPortNumber is not available.
    Single,
}

/// Reaction to a malformed message, unknown command or log-open failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Terminate only the offending session
    #[default]
    IsolateSession,

    /// Terminate the offending session and shut the whole server down
    ShutdownServer,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_connections: 1024,
            buffer_size: MAX_MESSAGE_SIZE,
            poll_interval_ms: 1000,
            write_timeout_ms: 5000,
            shutdown_grace_ms: 1000,
            mode: ServerMode::Multi,
            fault_policy: FaultPolicy::IsolateSession,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size < 4 {
            return Err(BridgeError::Config(format!(
                "buffer_size must hold at least a command code (got {})",
                self.buffer_size
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(BridgeError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(BridgeError::Config(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Listen on all interfaces at the given port
    pub fn port(mut self, port: u16) -> Self {
        self.config.listen_addr = format!("0.0.0.0:{}", port);
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the single-read buffer size (in bytes)
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Set the accept/read polling interval (in milliseconds)
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the bounded wait for sessions at shutdown (in milliseconds)
    pub fn shutdown_grace_ms(mut self, ms: u64) -> Self {
        self.config.shutdown_grace_ms = ms;
        self
    }

    pub fn mode(mut self, mode: ServerMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.config.fault_policy = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
