//! Session dispatcher
//!
//! Maps each decoded command to its handler and produces exactly one reply.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Evaluator, InstanceData, InstanceLog, Reply, SessionId, SessionState};
use crate::config::ServerMode;
use crate::error::{BridgeError, Result};
use crate::protocol::{decode_command, Command, CommandCode, EvaluateInput, Response};

/// One simulated instance bound to one connection
///
/// Owned by its connection thread. Fields are only mutated by `dispatch`,
/// one command at a time.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    mode: ServerMode,
    evaluator: Arc<dyn Evaluator>,
    data: InstanceData,
    state: SessionState,
    log: Option<InstanceLog>,
}

impl Session {
    pub fn new(
        id: SessionId,
        peer: SocketAddr,
        mode: ServerMode,
        evaluator: Arc<dyn Evaluator>,
    ) -> Self {
        Self {
            id,
            peer,
            mode,
            evaluator,
            data: InstanceData::default(),
            state: SessionState::Open,
            log: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Port used for log entries and GetPortNumber (the peer's port)
    pub fn port(&self) -> u16 {
        self.peer.port()
    }

    pub fn data(&self) -> &InstanceData {
        &self.data
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Path of the instance log, while one is open
    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(|log| log.path())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Decode a raw message and dispatch it
    pub fn handle_message(&mut self, bytes: &[u8]) -> Result<Reply> {
        let command = decode_command(bytes)?;
        tracing::trace!("Session {} received {:?}", self.id, command);
        self.dispatch(command)
    }

    /// Execute one command against this session
    pub fn dispatch(&mut self, command: Command) -> Result<Reply> {
        if self.state != SessionState::Open {
            return Err(BridgeError::SessionFault(format!(
                "session {} is not open",
                self.id
            )));
        }

        let code = command.code();
        match command {
            Command::Evaluate(input) => {
                let output = self.evaluator.evaluate(&self.data, &input);
                Ok(Reply::Send(Response::Float64(output)))
            }
            Command::MaxStepSize { sim_time } => {
                let step = self.evaluator.max_step_size(&self.data, sim_time);
                self.log_entry(format_args!("MaxStep():  t={:e}, retVal={:e}", sim_time, step));
                Ok(Reply::Send(Response::Float64(step)))
            }
            Command::Truncate {
                input,
                proposed_step,
            } => {
                let step = self.evaluator.truncate(&self.data, &input, proposed_step);
                self.log_truncate(&input, proposed_step, step);
                Ok(Reply::Send(Response::Float64(step)))
            }
            Command::SetLogName(name) => {
                self.data.log_name = Some(name);
                Ok(ack(code))
            }
            Command::SetInstanceName(name) => {
                self.data.instance_name = Some(name);
                Ok(ack(code))
            }
            Command::SetGain(gain) => {
                self.data.gain = gain;
                Ok(ack(code))
            }
            Command::SetStepNumber(step) => {
                self.data.step_number = step;
                Ok(ack(code))
            }
            Command::Destroy => {
                self.end_step();
                Ok(ack(code))
            }
            Command::PostProcess => {
                self.data.post_process = true;
                Ok(ack(code))
            }
            Command::Initialize => {
                self.begin_step()?;
                Ok(ack(code))
            }
            Command::CloseSession => {
                tracing::info!("Session {} ({}) requested close", self.id, self.peer);
                self.state = SessionState::Closing;
                Ok(Reply::Close)
            }
            Command::GetPortNumber => match self.mode {
                ServerMode::Multi => Ok(Reply::Send(Response::Port(i32::from(self.port())))),
                ServerMode::Single => Err(BridgeError::UnknownCommand(code.code())),
            },
        }
    }

    /// Terminate the session and release the instance log
    pub fn close(&mut self) {
        self.release_log();
        self.state = SessionState::Closed;
    }

    // =========================================================================
    // Step Lifecycle
    // =========================================================================

    /// Initialize: open the log and write the opening entries
    ///
    /// Logging is optional: without a log name the step runs unlogged.
    fn begin_step(&mut self) -> Result<()> {
        // Initialize twice in one step reopens the log
        self.release_log();

        let path = match self.data.log_name.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => PathBuf::from(name),
            None => {
                tracing::debug!(
                    "Session {}: no log name set, step {} is not logged",
                    self.id,
                    self.data.step_number
                );
                return Ok(());
            }
        };

        let step = self.data.step_number;
        self.log = Some(InstanceLog::open(&path, step)?);
        tracing::debug!(
            "Session {} opened log {} for step {}",
            self.id,
            path.display(),
            step
        );

        if step == 1 {
            self.log_entry(format_args!("Beginning Simulation..."));
        }
        self.log_entry(format_args!("Beginning Step {}", step));
        Ok(())
    }

    /// Destroy: write the closing entries and release the log
    fn end_step(&mut self) {
        let step = self.data.step_number;
        self.log_entry(format_args!("End of Step {}", step));
        if self.data.post_process {
            self.log_entry(format_args!("End of Simulation"));
        }
        self.release_log();
    }

    /// Flush and drop the instance log, if one is open
    fn release_log(&mut self) {
        if let Some(log) = self.log.take() {
            tracing::debug!("Session {} closing log {}", self.id, log.path().display());
            if let Err(e) = log.close() {
                tracing::warn!("Session {}: error closing log: {}", self.id, e);
            }
        }
    }

    // =========================================================================
    // Logging
    // =========================================================================

    fn log_truncate(&mut self, input: &EvaluateInput, proposed_step: f64, step: f64) {
        let gain = self.data.gain;
        self.log_entry(format_args!(
            "Trunc():    t={:e}, Gain={}, EN={}, IN={:e}, timestep={:e}, retVal={:e}",
            input.sim_time, gain, input.enable, input.input, proposed_step, step
        ));
    }

    /// Append to the instance log if one is open; failures never fail a command
    fn log_entry(&mut self, message: fmt::Arguments<'_>) {
        let port = self.peer.port();
        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.entry(self.data.display_name(), port, message) {
                tracing::warn!(
                    "Session {}: failed to write {}: {}",
                    self.id,
                    log.path().display(),
                    e
                );
            }
        }
    }
}

fn ack(code: CommandCode) -> Reply {
    Reply::Send(Response::Ack(code))
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("mode", &self.mode)
            .field("data", &self.data)
            .field("state", &self.state)
            .field("log", &self.log)
            .finish()
    }
}
