//! # simbridge
//!
//! A co-simulation bridge server. An external simulation engine opens one
//! connection per simulated component instance and drives it with
//! fixed-format binary messages:
//! - Configure the instance (log name, instance name, gain, step number)
//! - Evaluate its output at a time point
//! - Ask for a maximum timestep or a truncated timestep
//! - Signal lifecycle events (initialize, post-process, destroy, close)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Server                                │
//! │          (ShutdownSignal + SessionRegistry)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Listener                               │
//! │        (non-blocking accept, polls for shutdown)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ one thread per connection
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Connection  │          │ Connection  │
//!   │  + Session  │   ...    │  + Session  │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          ▼                        ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Codec    │          │ InstanceLog │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod session;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BridgeError, Result};
pub use config::{Config, FaultPolicy, ServerMode};
pub use network::{Server, ShutdownSignal};
pub use session::{Evaluator, LinearGain, Session};
pub use client::BridgeClient;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of simbridge
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
