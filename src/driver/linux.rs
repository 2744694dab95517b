//! `/proc` driver for Linux.
//!
//! Primary record: `/proc/<pid>/stat`. Secondary records:
//! `/proc/<pid>/status` (threads, context switches, uid, ppid) and
//! `/proc/<pid>/io` (storage I/O bytes), each allowed to fail on its own.

use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use super::{IoRecord, PlatformConstants, PlatformDriver, StatRecord, StatusRecord};
use crate::error::{Result, ScanError};
use crate::system::host_constants;

/// Default procfs mount point.
pub const PROC_ROOT: &str = "/proc";

// Zero-based positions after the closing ')' of the comm field; field 3
// (state) is index 0.
const STAT_UTIME: usize = 11;
const STAT_STIME: usize = 12;
const STAT_STARTTIME: usize = 19;
const STAT_VSIZE: usize = 20;
const STAT_RSS: usize = 21;
const STAT_PROCESSOR: usize = 36;

#[derive(Debug)]
pub struct LinuxDriver {
    root: PathBuf,
    constants: PlatformConstants,
    warned_io_permission: AtomicBool,
}

impl Default for LinuxDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxDriver {
    /// Driver over `/proc` using the host's tick and page constants.
    pub fn new() -> Self {
        Self::with_root(PROC_ROOT, host_constants())
    }

    /// Driver over an alternative procfs tree (containers, tests).
    pub fn with_root(root: impl Into<PathBuf>, constants: PlatformConstants) -> Self {
        Self {
            root: root.into(),
            constants,
            warned_io_permission: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pid_path(&self, pid: u32, file: &str) -> PathBuf {
        self.root.join(pid.to_string()).join(file)
    }

    fn read_source(&self, pid: u32, file: &'static str) -> Result<String> {
        let bytes = fs::read(self.pid_path(pid, file)).map_err(|e| ScanError::from_read(pid, file, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_trimmed(&self, pid: u32, file: &str, nul_is_separator: bool) -> Option<String> {
        let bytes = fs::read(self.pid_path(pid, file)).ok()?;
        let text = fold_separators(&bytes, nul_is_separator);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Parses a pid directory name; only plain positive decimal numbers qualify.
fn parse_pid_dir(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match name.parse::<u32>() {
        Ok(pid) if pid > 0 && pid <= i32::MAX as u32 => Some(pid),
        _ => None,
    }
}

/// Replaces newlines (and optionally NULs) with spaces and trims trailing spaces.
fn fold_separators(bytes: &[u8], nul_is_separator: bool) -> String {
    let folded: Vec<u8> = bytes
        .iter()
        .map(|&b| match b {
            b'\n' => b' ',
            0 if nul_is_separator => b' ',
            other => other,
        })
        .collect();
    String::from_utf8_lossy(&folded).trim_end_matches(' ').to_string()
}

/// Parses `/proc/<pid>/stat` content.
///
/// The comm field may itself contain spaces and parentheses, so fields are
/// located relative to the last ')'.
pub fn parse_stat(pid: u32, content: &str) -> Result<StatRecord> {
    let close = content
        .rfind(')')
        .ok_or_else(|| ScanError::malformed(pid, "stat", "missing comm terminator"))?;
    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if fields.len() <= STAT_RSS {
        return Err(ScanError::malformed(
            pid,
            "stat",
            format!("expected at least {} fields, got {}", STAT_RSS + 1, fields.len()),
        ));
    }

    let field = |idx: usize, name: &str| -> Result<u64> {
        fields[idx]
            .parse::<u64>()
            .map_err(|e| ScanError::malformed(pid, "stat", format!("{}: {}", name, e)))
    };

    let rss_pages = fields[STAT_RSS]
        .parse::<i64>()
        .map_err(|e| ScanError::malformed(pid, "stat", format!("rss: {}", e)))?;

    Ok(StatRecord {
        utime_ticks: field(STAT_UTIME, "utime")?,
        stime_ticks: field(STAT_STIME, "stime")?,
        vsize_bytes: field(STAT_VSIZE, "vsize")?,
        rss_pages,
        processor: fields
            .get(STAT_PROCESSOR)
            .and_then(|v| v.parse::<i32>().ok()),
        start_ticks: field(STAT_STARTTIME, "starttime")?,
    })
}

fn leading_number<T: std::str::FromStr>(v: &str) -> Option<T> {
    v.split_whitespace().next()?.parse().ok()
}

/// Parses `/proc/<pid>/status` content. Keys that are absent or unparsable
/// stay `None`.
pub fn parse_status(content: &str) -> StatusRecord {
    let mut record = StatusRecord::default();
    for line in content.lines() {
        if let Some(v) = line.strip_prefix("Threads:") {
            record.num_threads = leading_number(v);
        } else if let Some(v) = line.strip_prefix("voluntary_ctxt_switches:") {
            record.vol_ctx_switches = leading_number(v);
        } else if let Some(v) = line.strip_prefix("nonvoluntary_ctxt_switches:") {
            record.nonvol_ctx_switches = leading_number(v);
        } else if let Some(v) = line.strip_prefix("Uid:") {
            // Real uid is the first of four columns.
            record.uid = leading_number(v);
        } else if let Some(v) = line.strip_prefix("PPid:") {
            record.ppid = leading_number(v);
        }
    }
    record
}

/// Parses `/proc/<pid>/io` content. A readable file with missing keys counts
/// as zero bytes.
pub fn parse_io(content: &str) -> IoRecord {
    let mut record = IoRecord::default();
    for line in content.lines() {
        if let Some(v) = line.strip_prefix("read_bytes:") {
            record.read_bytes = leading_number(v).unwrap_or(0);
        } else if let Some(v) = line.strip_prefix("write_bytes:") {
            record.write_bytes = leading_number(v).unwrap_or(0);
        }
    }
    record
}

impl PlatformDriver for LinuxDriver {
    fn constants(&self) -> PlatformConstants {
        self.constants
    }

    fn for_each_pid(&self, visit: &mut dyn FnMut(u32) -> ControlFlow<()>) -> Result<()> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            debug!("Failed to read {}: {}", self.root.display(), e);
            ScanError::Io(e)
        })?;

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(parse_pid_dir) else {
                continue;
            };
            if visit(pid).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn read_stat(&self, pid: u32) -> Result<StatRecord> {
        let content = self.read_source(pid, "stat")?;
        parse_stat(pid, &content)
    }

    fn read_status(&self, pid: u32) -> Result<StatusRecord> {
        let content = self.read_source(pid, "status")?;
        Ok(parse_status(&content))
    }

    fn read_io(&self, pid: u32) -> Result<IoRecord> {
        match self.read_source(pid, "io") {
            Ok(content) => Ok(parse_io(&content)),
            Err(e @ ScanError::FieldUnavailable { .. }) => {
                if !self.warned_io_permission.swap(true, Ordering::Relaxed) {
                    warn!("/proc/[pid]/io requires permission; I/O metrics set to -1");
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn read_comm(&self, pid: u32) -> Option<String> {
        self.read_trimmed(pid, "comm", false)
    }

    fn read_cmdline(&self, pid: u32) -> Option<String> {
        self.read_trimmed(pid, "cmdline", true)
    }

    fn read_cgroup(&self, pid: u32) -> Option<String> {
        self.read_trimmed(pid, "cgroup", false)
    }
}
