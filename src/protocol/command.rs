//! Command definitions
//!
//! The command code table and the typed requests decoded from it.

use crate::error::BridgeError;

/// Command codes as they appear on the wire (little-endian i32)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CommandCode {
    Evaluate = 2,
    MaxStepSize = 3,
    Truncate = 4,
    SetLogName = 1024,
    SetInstanceName = 1025,
    SetGain = 1026,
    SetStepNumber = 1027,
    Destroy = 1028,
    PostProcess = 1029,
    Initialize = 1030,
    CloseSession = 1031,
    GetPortNumber = 1032,
}

/// Request payload layout, fully determined by the command code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Exactly `n` little-endian f64 values
    Float64s(usize),
    /// Exactly `n` little-endian i32 values
    Int32s(usize),
    /// NUL/line-terminated string
    CString,
    /// Nothing (trailing bytes are ignored)
    Empty,
}

impl CommandCode {
    /// Every command in the table, in code order
    pub const ALL: [CommandCode; 12] = [
        CommandCode::Evaluate,
        CommandCode::MaxStepSize,
        CommandCode::Truncate,
        CommandCode::SetLogName,
        CommandCode::SetInstanceName,
        CommandCode::SetGain,
        CommandCode::SetStepNumber,
        CommandCode::Destroy,
        CommandCode::PostProcess,
        CommandCode::Initialize,
        CommandCode::CloseSession,
        CommandCode::GetPortNumber,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandCode::Evaluate => "Evaluate",
            CommandCode::MaxStepSize => "MaxStepSize",
            CommandCode::Truncate => "Truncate",
            CommandCode::SetLogName => "SetLogName",
            CommandCode::SetInstanceName => "SetInstanceName",
            CommandCode::SetGain => "SetGain",
            CommandCode::SetStepNumber => "SetStepNumber",
            CommandCode::Destroy => "Destroy",
            CommandCode::PostProcess => "PostProcess",
            CommandCode::Initialize => "Initialize",
            CommandCode::CloseSession => "CloseSession",
            CommandCode::GetPortNumber => "GetPortNumber",
        }
    }

    /// The request payload this command carries
    pub fn payload_shape(self) -> PayloadShape {
        match self {
            CommandCode::Evaluate => PayloadShape::Float64s(3),
            CommandCode::MaxStepSize => PayloadShape::Float64s(1),
            CommandCode::Truncate => PayloadShape::Float64s(4),
            CommandCode::SetLogName | CommandCode::SetInstanceName => PayloadShape::CString,
            CommandCode::SetGain | CommandCode::SetStepNumber => PayloadShape::Int32s(1),
            CommandCode::Destroy
            | CommandCode::PostProcess
            | CommandCode::Initialize
            | CommandCode::CloseSession
            | CommandCode::GetPortNumber => PayloadShape::Empty,
        }
    }
}

impl TryFrom<i32> for CommandCode {
    type Error = BridgeError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        CommandCode::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or(BridgeError::UnknownCommand(code))
    }
}

/// Evaluation inputs shared by Evaluate and Truncate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluateInput {
    pub sim_time: f64,
    pub input: f64,
    pub enable: f64,
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Compute the instance output at a time point
    Evaluate(EvaluateInput),

    /// Ask for the largest allowed timestep
    MaxStepSize { sim_time: f64 },

    /// Offer a timestep that the server may shorten
    Truncate {
        input: EvaluateInput,
        proposed_step: f64,
    },

    SetLogName(String),
    SetInstanceName(String),
    SetGain(i32),
    SetStepNumber(i32),

    /// End-of-step event
    Destroy,

    /// End-of-simulation event, sent before the final Destroy
    PostProcess,

    /// Start-of-step event; opens the instance log
    Initialize,

    /// Close this session; no response is sent
    CloseSession,

    /// Ask for the connection's port number
    GetPortNumber,
}

impl Command {
    /// Get the command code
    pub fn code(&self) -> CommandCode {
        match self {
            Command::Evaluate(_) => CommandCode::Evaluate,
            Command::MaxStepSize { .. } => CommandCode::MaxStepSize,
            Command::Truncate { .. } => CommandCode::Truncate,
            Command::SetLogName(_) => CommandCode::SetLogName,
            Command::SetInstanceName(_) => CommandCode::SetInstanceName,
            Command::SetGain(_) => CommandCode::SetGain,
            Command::SetStepNumber(_) => CommandCode::SetStepNumber,
            Command::Destroy => CommandCode::Destroy,
            Command::PostProcess => CommandCode::PostProcess,
            Command::Initialize => CommandCode::Initialize,
            Command::CloseSession => CommandCode::CloseSession,
            Command::GetPortNumber => CommandCode::GetPortNumber,
        }
    }
}
