//! Session Module
//!
//! Per-connection instance state and the command dispatcher.
//!
//! ## Responsibilities
//! - Hold one simulated instance's configuration (names, gain, step number)
//! - Validate and execute commands strictly in arrival order
//! - Own the instance log between Initialize and Destroy
//!
//! ## Lifecycle
//! ```text
//!   ┌──────── Initialize / Destroy / any other command ────────┐
//!   │                                                          │
//!   ▼                                                          │
//! [Open] ─────────────────────────────────────────────────────┘
//!   │
//!   ├── CloseSession ──▶ [Closing] ──▶ [Closed]
//!   └── I/O error / protocol fault ──▶ [Closed]
//! ```
//!
//! A session is owned by exactly one thread; nothing in here is shared.

mod dispatcher;
mod log;
mod policy;

pub use dispatcher::Session;
pub use log::InstanceLog;
pub use policy::{Evaluator, LinearGain, NO_STEP_LIMIT};

use std::fmt;

use crate::protocol::Response;

/// Identity of a session within one server run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Configuration received from the client for one simulated instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceData {
    /// Log file path (SetLogName)
    pub log_name: Option<String>,

    /// Component instance name (SetInstanceName)
    pub instance_name: Option<String>,

    /// Gain attribute (SetGain)
    pub gain: i32,

    /// Current simulation step (SetStepNumber)
    pub step_number: i32,

    /// Set by PostProcess: the next Destroy ends the simulation
    pub post_process: bool,
}

impl InstanceData {
    /// Instance name for log entries
    pub fn display_name(&self) -> &str {
        self.instance_name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

/// What the connection should do after a command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    /// Send this response and keep reading
    Send(Response),

    /// Send nothing and end the session
    Close,
}
