//! Protocol Module
//!
//! Defines the wire protocol between the simulation engine and the bridge.
//!
//! ## Protocol Format (fixed-shape binary, little-endian)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Cmd (4)  │  Payload (shape set by Cmd) │
//! └──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! | Code | Name            | Request     | Response     |
//! |------|-----------------|-------------|--------------|
//! | 2    | Evaluate        | 3 × f64     | f64          |
//! | 3    | MaxStepSize     | 1 × f64     | f64          |
//! | 4    | Truncate        | 4 × f64     | f64          |
//! | 1024 | SetLogName      | C string    | i32 echo     |
//! | 1025 | SetInstanceName | C string    | i32 echo     |
//! | 1026 | SetGain         | 1 × i32     | i32 echo     |
//! | 1027 | SetStepNumber   | 1 × i32     | i32 echo     |
//! | 1028 | Destroy         | -           | i32 echo     |
//! | 1029 | PostProcess     | -           | i32 echo     |
//! | 1030 | Initialize      | -           | i32 echo     |
//! | 1031 | CloseSession    | -           | none         |
//! | 1032 | GetPortNumber   | -           | i32 port     |

mod command;
mod response;
mod codec;

pub use command::{Command, CommandCode, EvaluateInput, PayloadShape};
pub use response::Response;
pub use codec::{
    decode_command, decode_cstring, decode_float64_array, decode_float64_response,
    decode_int32_array, decode_int32_response, encode_command, encode_float64, encode_int32,
    encode_response, read_message, split_header, write_command, write_response, HEADER_SIZE,
    MAX_MESSAGE_SIZE,
};
