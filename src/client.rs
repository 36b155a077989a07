//! Blocking client
//!
//! Speaks the bridge protocol the way a simulation engine does: one request,
//! then wait for its reply. Used by `simbridge-cli` and the tests.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::protocol::{
    decode_float64_response, decode_int32_response, write_command, Command, EvaluateInput,
};

/// A connection to a bridge server, i.e. one simulated instance
pub struct BridgeClient {
    stream: TcpStream,
}

impl BridgeClient {
    /// Connect to a server
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Fail reads that take longer than `timeout`
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        Ok(())
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    pub fn evaluate(&mut self, sim_time: f64, input: f64, enable: f64) -> Result<f64> {
        self.request_f64(&Command::Evaluate(EvaluateInput {
            sim_time,
            input,
            enable,
        }))
    }

    pub fn max_step_size(&mut self, sim_time: f64) -> Result<f64> {
        self.request_f64(&Command::MaxStepSize { sim_time })
    }

    pub fn truncate(
        &mut self,
        sim_time: f64,
        input: f64,
        enable: f64,
        proposed_step: f64,
    ) -> Result<f64> {
        self.request_f64(&Command::Truncate {
            input: EvaluateInput {
                sim_time,
                input,
                enable,
            },
            proposed_step,
        })
    }

    // =========================================================================
    // Configuration and Events
    // =========================================================================

    pub fn set_log_name(&mut self, name: &str) -> Result<()> {
        self.request_ack(&Command::SetLogName(name.to_string()))
    }

    pub fn set_instance_name(&mut self, name: &str) -> Result<()> {
        self.request_ack(&Command::SetInstanceName(name.to_string()))
    }

    pub fn set_gain(&mut self, gain: i32) -> Result<()> {
        self.request_ack(&Command::SetGain(gain))
    }

    pub fn set_step_number(&mut self, step: i32) -> Result<()> {
        self.request_ack(&Command::SetStepNumber(step))
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.request_ack(&Command::Initialize)
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.request_ack(&Command::Destroy)
    }

    pub fn post_process(&mut self) -> Result<()> {
        self.request_ack(&Command::PostProcess)
    }

    /// Ask the server which port identifies this connection
    pub fn port_number(&mut self) -> Result<i32> {
        write_command(&mut self.stream, &Command::GetPortNumber)?;
        let mut reply = [0u8; 4];
        self.stream.read_exact(&mut reply)?;
        decode_int32_response(&reply)
    }

    /// End the session; the server sends no reply
    pub fn close_session(mut self) -> Result<()> {
        write_command(&mut self.stream, &Command::CloseSession)
    }

    // =========================================================================
    // Raw Access
    // =========================================================================

    /// Send arbitrary bytes as one message
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Read whatever the server sends next; an empty result means the server
    /// closed the connection
    pub fn recv_raw(&mut self) -> Result<Vec<u8>> {
        let mut buf = [0u8; 64];
        let n = self.stream.read(&mut buf)?;
        Ok(buf[..n].to_vec())
    }

    fn request_f64(&mut self, command: &Command) -> Result<f64> {
        write_command(&mut self.stream, command)?;
        let mut reply = [0u8; 8];
        self.stream.read_exact(&mut reply)?;
        decode_float64_response(&reply)
    }

    fn request_ack(&mut self, command: &Command) -> Result<()> {
        write_command(&mut self.stream, command)?;
        let mut reply = [0u8; 4];
        self.stream.read_exact(&mut reply)?;
        let echoed = decode_int32_response(&reply)?;

        let expected = command.code();
        if echoed != expected.code() {
            return Err(BridgeError::UnexpectedReply(format!(
                "{} acknowledged with {}",
                expected.name(),
                echoed
            )));
        }
        Ok(())
    }
}
