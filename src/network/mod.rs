//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread polling a non-blocking listener
//! - One thread per connection, each owning its session
//! - Registry of live sessions, touched only to coordinate shutdown

mod connection;
mod listener;
mod registry;
mod server;
mod shutdown;

pub use connection::Connection;
pub use listener::Listener;
pub use registry::{SessionHandle, SessionRegistry};
pub use server::Server;
pub use shutdown::ShutdownSignal;
