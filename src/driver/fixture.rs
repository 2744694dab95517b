//! In-memory driver over a hand-built or file-loaded process table.
//!
//! Processes are enumerated in insertion order (not sorted), so consumers
//! exercise the same ordering work as with a real procfs listing.

use std::fs;
use std::ops::ControlFlow;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{IoRecord, PlatformConstants, PlatformDriver, StatRecord, StatusRecord};
use crate::error::{Result, ScanError};

/// One synthetic process. A `None` record behaves like a failed read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureProcess {
    pub pid: u32,
    #[serde(default)]
    pub comm: Option<String>,
    #[serde(default)]
    pub cmdline: Option<String>,
    #[serde(default)]
    pub cgroup: Option<String>,
    pub stat: Option<StatRecord>,
    pub status: Option<StatusRecord>,
    pub io: Option<IoRecord>,
}

impl FixtureProcess {
    /// Process with every source readable and all counters at zero.
    pub fn new(pid: u32, start_ticks: u64) -> Self {
        Self {
            pid,
            comm: None,
            cmdline: None,
            cgroup: None,
            stat: Some(StatRecord {
                processor: Some(0),
                start_ticks,
                ..StatRecord::default()
            }),
            status: Some(StatusRecord {
                num_threads: Some(1),
                vol_ctx_switches: Some(0),
                nonvol_ctx_switches: Some(0),
                uid: Some(0),
                ppid: Some(1),
            }),
            io: Some(IoRecord::default()),
        }
    }

    pub fn comm(mut self, comm: &str) -> Self {
        self.comm = Some(comm.to_string());
        self
    }

    pub fn utime(mut self, ticks: u64) -> Self {
        if let Some(stat) = self.stat.as_mut() {
            stat.utime_ticks = ticks;
        }
        self
    }

    pub fn stime(mut self, ticks: u64) -> Self {
        if let Some(stat) = self.stat.as_mut() {
            stat.stime_ticks = ticks;
        }
        self
    }

    pub fn rss_pages(mut self, pages: i64) -> Self {
        if let Some(stat) = self.stat.as_mut() {
            stat.rss_pages = pages;
        }
        self
    }

    pub fn uid(mut self, uid: u32) -> Self {
        if let Some(status) = self.status.as_mut() {
            status.uid = Some(uid);
        }
        self
    }

    pub fn ctx_switches(mut self, voluntary: u64, involuntary: u64) -> Self {
        if let Some(status) = self.status.as_mut() {
            status.vol_ctx_switches = Some(voluntary);
            status.nonvol_ctx_switches = Some(involuntary);
        }
        self
    }

    pub fn io_bytes(mut self, read: u64, write: u64) -> Self {
        self.io = Some(IoRecord {
            read_bytes: read,
            write_bytes: write,
        });
        self
    }

    pub fn without_status(mut self) -> Self {
        self.status = None;
        self
    }

    pub fn without_io(mut self) -> Self {
        self.io = None;
        self
    }

    /// Listed but unreadable, like a process that exits mid-scan.
    pub fn vanished(mut self) -> Self {
        self.stat = None;
        self
    }
}

/// On-disk form of a fixture table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureFile {
    pub version: String,
    pub generated_at: String,
    pub clock_ticks_per_second: u64,
    pub page_size: u64,
    pub processes: Vec<FixtureProcess>,
}

#[derive(Debug, Clone, Default)]
pub struct FixtureDriver {
    constants: PlatformConstants,
    processes: Vec<FixtureProcess>,
}

impl FixtureDriver {
    pub fn new(constants: PlatformConstants) -> Self {
        Self {
            constants,
            processes: Vec::new(),
        }
    }

    pub fn from_file_data(data: FixtureFile) -> Self {
        let hz = data.clock_ticks_per_second.max(1);
        Self {
            constants: PlatformConstants {
                tick_ns: 1e9 / hz as f64,
                page_size: data.page_size,
            },
            processes: data.processes,
        }
    }

    /// Loads a JSON fixture table.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading fixture data from: {}", path.display());
        let content = fs::read_to_string(path)?;
        let data: FixtureFile = serde_json::from_str(&content)?;
        info!(
            "Loaded fixture version {} generated at {} ({} processes)",
            data.version,
            data.generated_at,
            data.processes.len()
        );
        Ok(Self::from_file_data(data))
    }

    /// Adds a process, replacing (in place) any entry with the same pid.
    pub fn insert(&mut self, process: FixtureProcess) {
        match self.processes.iter_mut().find(|p| p.pid == process.pid) {
            Some(slot) => *slot = process,
            None => self.processes.push(process),
        }
    }

    pub fn with(mut self, process: FixtureProcess) -> Self {
        self.insert(process);
        self
    }

    pub fn remove(&mut self, pid: u32) -> Option<FixtureProcess> {
        let idx = self.processes.iter().position(|p| p.pid == pid)?;
        Some(self.processes.remove(idx))
    }

    pub fn process_mut(&mut self, pid: u32) -> Option<&mut FixtureProcess> {
        self.processes.iter_mut().find(|p| p.pid == pid)
    }

    pub fn processes(&self) -> &[FixtureProcess] {
        &self.processes
    }

    fn find(&self, pid: u32) -> Option<&FixtureProcess> {
        self.processes.iter().find(|p| p.pid == pid)
    }
}

impl PlatformDriver for FixtureDriver {
    fn constants(&self) -> PlatformConstants {
        self.constants
    }

    fn for_each_pid(&self, visit: &mut dyn FnMut(u32) -> ControlFlow<()>) -> Result<()> {
        for p in &self.processes {
            if visit(p.pid).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn read_stat(&self, pid: u32) -> Result<StatRecord> {
        self.find(pid)
            .and_then(|p| p.stat)
            .ok_or(ScanError::ProcessVanished { pid })
    }

    fn read_status(&self, pid: u32) -> Result<StatusRecord> {
        self.find(pid)
            .and_then(|p| p.status)
            .ok_or(ScanError::FieldUnavailable {
                pid,
                source_name: "status",
            })
    }

    fn read_io(&self, pid: u32) -> Result<IoRecord> {
        self.find(pid).and_then(|p| p.io).ok_or(ScanError::FieldUnavailable {
            pid,
            source_name: "io",
        })
    }

    fn read_comm(&self, pid: u32) -> Option<String> {
        self.find(pid)?.comm.clone()
    }

    fn read_cmdline(&self, pid: u32) -> Option<String> {
        self.find(pid)?.cmdline.clone()
    }

    fn read_cgroup(&self, pid: u32) -> Option<String> {
        self.find(pid)?.cgroup.clone()
    }
}
