//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request Format
//! ```text
//! ┌──────────┬─────────────────────────────────────────┐
//! │ Cmd (4)  │   Payload (shape fixed by Cmd)          │
//! └──────────┴─────────────────────────────────────────┘
//! ```
//!
//! There is no length field. A request is whatever a single transport read
//! returns, up to the buffer size; partial reads and coalesced messages are
//! not reassembled.
//!
//! ### Response Format
//! A bare f64 (8 bytes) or i32 (4 bytes), depending on the request.
//!
//! All numbers are little-endian.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{Command, CommandCode, EvaluateInput, PayloadShape, Response};
use crate::error::{BridgeError, Result};

/// Header size: 4 byte command code
pub const HEADER_SIZE: usize = 4;

/// Default single-read buffer size; any message must fit in it
pub const MAX_MESSAGE_SIZE: usize = 1024;

// =============================================================================
// Primitive Encoding/Decoding
// =============================================================================

/// Split a raw message into its command code and payload
pub fn split_header(bytes: &[u8]) -> Result<(i32, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(BridgeError::MalformedHeader { len: bytes.len() });
    }
    let (mut header, payload) = bytes.split_at(HEADER_SIZE);
    Ok((header.get_i32_le(), payload))
}

pub fn encode_int32(value: i32) -> [u8; 4] {
    value.to_le_bytes()
}

pub fn encode_float64(value: f64) -> [u8; 8] {
    value.to_le_bytes()
}

/// Decode a packed array of f64; the length must be a multiple of 8
pub fn decode_float64_array(bytes: &[u8]) -> Result<Vec<f64>> {
    float64s(bytes).map_err(|reason| BridgeError::malformed("float64 array", reason))
}

/// Decode a packed array of i32; the length must be a multiple of 4
pub fn decode_int32_array(bytes: &[u8]) -> Result<Vec<i32>> {
    int32s(bytes).map_err(|reason| BridgeError::malformed("int32 array", reason))
}

/// Decode a C string payload. Never fails.
///
/// Trailing NUL, CR and LF bytes are stripped. Invalid UTF-8 falls back to a
/// single-byte (Latin-1) decoding.
pub fn decode_cstring(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| !matches!(b, 0 | b'\r' | b'\n'))
        .map_or(0, |i| i + 1);
    let raw = &bytes[..end];

    match std::str::from_utf8(raw) {
        Ok(s) => s.to_owned(),
        Err(_) => raw.iter().map(|&b| char::from(b)).collect(),
    }
}

fn float64s(mut bytes: &[u8]) -> std::result::Result<Vec<f64>, String> {
    if bytes.len() % 8 != 0 {
        return Err(format!("{} bytes is not a multiple of 8", bytes.len()));
    }
    let mut values = Vec::with_capacity(bytes.len() / 8);
    while bytes.has_remaining() {
        values.push(bytes.get_f64_le());
    }
    Ok(values)
}

fn int32s(mut bytes: &[u8]) -> std::result::Result<Vec<i32>, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!("{} bytes is not a multiple of 4", bytes.len()));
    }
    let mut values = Vec::with_capacity(bytes.len() / 4);
    while bytes.has_remaining() {
        values.push(bytes.get_i32_le());
    }
    Ok(values)
}

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Strings are sent NUL-terminated, as a C client would.
pub fn encode_command(command: &Command) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + 32);
    buf.put_i32_le(command.code().code());

    match command {
        Command::Evaluate(input) => put_input(&mut buf, input),
        Command::MaxStepSize { sim_time } => buf.put_f64_le(*sim_time),
        Command::Truncate {
            input,
            proposed_step,
        } => {
            put_input(&mut buf, input);
            buf.put_f64_le(*proposed_step);
        }
        Command::SetLogName(s) | Command::SetInstanceName(s) => {
            buf.put_slice(s.as_bytes());
            buf.put_u8(0);
        }
        Command::SetGain(v) | Command::SetStepNumber(v) => buf.put_i32_le(*v),
        Command::Destroy
        | Command::PostProcess
        | Command::Initialize
        | Command::CloseSession
        | Command::GetPortNumber => {}
    }

    buf.freeze()
}

fn put_input(buf: &mut BytesMut, input: &EvaluateInput) {
    buf.put_f64_le(input.sim_time);
    buf.put_f64_le(input.input);
    buf.put_f64_le(input.enable);
}

/// Decode a command from a raw message
///
/// The payload is validated against the command's fixed shape before a
/// `Command` is produced, so a rejected message never reaches a session.
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (code, payload) = split_header(bytes)?;
    let code = CommandCode::try_from(code)?;

    match code {
        CommandCode::Evaluate => {
            let [sim_time, input, enable] = fixed_float64s(code, payload)?;
            Ok(Command::Evaluate(EvaluateInput {
                sim_time,
                input,
                enable,
            }))
        }
        CommandCode::MaxStepSize => {
            let [sim_time] = fixed_float64s(code, payload)?;
            Ok(Command::MaxStepSize { sim_time })
        }
        CommandCode::Truncate => {
            let [sim_time, input, enable, proposed_step] = fixed_float64s(code, payload)?;
            Ok(Command::Truncate {
                input: EvaluateInput {
                    sim_time,
                    input,
                    enable,
                },
                proposed_step,
            })
        }
        CommandCode::SetLogName => Ok(Command::SetLogName(decode_cstring(payload))),
        CommandCode::SetInstanceName => Ok(Command::SetInstanceName(decode_cstring(payload))),
        CommandCode::SetGain => {
            let [gain] = fixed_int32s(code, payload)?;
            Ok(Command::SetGain(gain))
        }
        CommandCode::SetStepNumber => {
            let [step] = fixed_int32s(code, payload)?;
            Ok(Command::SetStepNumber(step))
        }
        CommandCode::Destroy => Ok(Command::Destroy),
        CommandCode::PostProcess => Ok(Command::PostProcess),
        CommandCode::Initialize => Ok(Command::Initialize),
        CommandCode::CloseSession => Ok(Command::CloseSession),
        CommandCode::GetPortNumber => Ok(Command::GetPortNumber),
    }
}

fn fixed_float64s<const N: usize>(code: CommandCode, payload: &[u8]) -> Result<[f64; N]> {
    debug_assert_eq!(code.payload_shape(), PayloadShape::Float64s(N));
    let values = float64s(payload).map_err(|reason| BridgeError::malformed(code.name(), reason))?;
    <[f64; N]>::try_from(values).map_err(|values| {
        BridgeError::malformed(
            code.name(),
            format!("expected {} float64 values, got {}", N, values.len()),
        )
    })
}

fn fixed_int32s<const N: usize>(code: CommandCode, payload: &[u8]) -> Result<[i32; N]> {
    debug_assert_eq!(code.payload_shape(), PayloadShape::Int32s(N));
    let values = int32s(payload).map_err(|reason| BridgeError::malformed(code.name(), reason))?;
    <[i32; N]>::try_from(values).map_err(|values| {
        BridgeError::malformed(
            code.name(),
            format!("expected {} int32 values, got {}", N, values.len()),
        )
    })
}


// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Bytes {
    let mut buf = BytesMut::with_capacity(response.wire_len());
    match response {
        Response::Float64(v) => buf.put_f64_le(*v),
        Response::Ack(code) => buf.put_i32_le(code.code()),
        Response::Port(port) => buf.put_i32_le(*port),
    }
    buf.freeze()
}

/// Decode an 8-byte f64 response
pub fn decode_float64_response(bytes: &[u8]) -> Result<f64> {
    match <[u8; 8]>::try_from(bytes) {
        Ok(raw) => Ok(f64::from_le_bytes(raw)),
        Err(_) => Err(BridgeError::UnexpectedReply(format!(
            "expected 8 bytes, got {}",
            bytes.len()
        ))),
    }
}

/// Decode a 4-byte i32 response (acknowledgement or port number)
pub fn decode_int32_response(bytes: &[u8]) -> Result<i32> {
    match <[u8; 4]>::try_from(bytes) {
        Ok(raw) => Ok(i32::from_le_bytes(raw)),
        Err(_) => Err(BridgeError::UnexpectedReply(format!(
            "expected 4 bytes, got {}",
            bytes.len()
        ))),
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one message with a single read call
///
/// Returns the number of bytes read; 0 means the peer closed the stream.
pub fn read_message<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<usize> {
    Ok(reader.read(buffer)?)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
