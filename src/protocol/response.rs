//! Response definitions
//!
//! Represents responses to clients. Responses carry no status or length
//! header: the client knows the shape from the command it sent.

use super::CommandCode;

/// A response to send to client
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    /// One f64 (Evaluate, MaxStepSize, Truncate)
    Float64(f64),

    /// Acknowledgement: the command code echoed back as an i32
    Ack(CommandCode),

    /// The connection's port number (GetPortNumber)
    Port(i32),
}

impl Response {
    /// Number of bytes this response occupies on the wire
    pub fn wire_len(&self) -> usize {
        match self {
            Response::Float64(_) => 8,
            Response::Ack(_) | Response::Port(_) => 4,
        }
    }
}
