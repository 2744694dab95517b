//! Error taxonomy for the sampler core.
//!
//! None of these errors escape the public snapshot operations: those return a
//! plain row count and encode field-level problems as the `-1` sentinel. The
//! variants exist so that internal stages can propagate with `?` and so the
//! orchestrator can log why a process or a whole call was dropped.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Caller-supplied buffer shape cannot hold the schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Process disappeared between enumeration and read.
    #[error("process {pid} vanished during scan")]
    ProcessVanished { pid: u32 },

    /// A secondary source could not be read (usually permissions).
    #[error("{source_name} unavailable for pid {pid}")]
    FieldUnavailable {
        pid: u32,
        source_name: &'static str,
    },

    /// Session storage could not grow to the requested number of elements.
    #[error("cannot grow buffer to {requested} elements")]
    AllocationFailure { requested: usize },

    /// Raw record could not be parsed.
    #[error("malformed {source_name} for pid {pid}: {reason}")]
    MalformedSourceData {
        pid: u32,
        source_name: &'static str,
        reason: String,
    },

    /// Fixture table is not valid JSON for the fixture format.
    #[error("malformed fixture data: {0}")]
    MalformedFixture(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ScanError {
    /// Maps a per-process read failure, treating a missing file as a vanished process.
    pub fn from_read(pid: u32, source_name: &'static str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ScanError::ProcessVanished { pid },
            io::ErrorKind::PermissionDenied => ScanError::FieldUnavailable { pid, source_name },
            _ if err.raw_os_error() == Some(libc::ESRCH) => ScanError::ProcessVanished { pid },
            _ => ScanError::Io(err),
        }
    }

    pub fn malformed(pid: u32, source_name: &'static str, reason: impl Into<String>) -> Self {
        ScanError::MalformedSourceData {
            pid,
            source_name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
