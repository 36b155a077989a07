//! Per-instance simulation log
//!
//! Opened by Initialize and released by Destroy. Dropping the log closes the
//! file, so any path that drops the session (I/O error, malformed message,
//! shutdown) releases it too.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};

/// An open instance log file
pub struct InstanceLog {
    path: PathBuf,
    writer: LineWriter<File>,
}

impl InstanceLog {
    /// Open the log for a step
    ///
    /// Step 1 starts a new simulation and truncates the file; every other
    /// step appends.
    pub fn open(path: impl AsRef<Path>, step_number: i32) -> Result<Self> {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        options.create(true);
        if step_number == 1 {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }

        let file = options.open(path).map_err(|source| BridgeError::LogOpen {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: LineWriter::new(file),
        })
    }

    /// Append one entry: `Inst {instance} Port {port}: {message}`
    pub fn entry(&mut self, instance: &str, port: u16, message: fmt::Arguments<'_>) -> Result<()> {
        writeln!(self.writer, "Inst {} Port {}: {}", instance, port, message)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the file
    pub fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl fmt::Debug for InstanceLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceLog").field("path", &self.path).finish()
    }
}
