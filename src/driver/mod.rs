//! Platform drivers: enumerate processes and read their raw records.
//!
//! This module provides:
//! - `PlatformDriver`: the narrow per-OS contract
//! - `capture_absolute`: the capture loop, written once against the contract
//! - `linux`: `/proc` implementation
//! - `fixture`: in-memory implementation for tests and synthetic data

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::Result;
use crate::filter::Filter;
use crate::sample::{MetricRow, ProcessIdentity, Sample};
use crate::schema::UNAVAILABLE;
use crate::session::reserve_doubling;

pub mod fixture;
#[cfg(target_os = "linux")]
pub mod linux;

pub use fixture::{FixtureDriver, FixtureProcess};
#[cfg(target_os = "linux")]
pub use linux::LinuxDriver;

/// Unit conversions for raw counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformConstants {
    /// Nanoseconds per scheduler tick.
    pub tick_ns: f64,
    /// Bytes per memory page.
    pub page_size: u64,
}

impl Default for PlatformConstants {
    /// 100 Hz ticks, 4 KiB pages.
    fn default() -> Self {
        Self {
            tick_ns: 1e9 / 100.0,
            page_size: 4096,
        }
    }
}

/// Primary record: CPU times, memory, scheduling and start time.
///
/// A process whose primary record cannot be read is skipped entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatRecord {
    pub utime_ticks: u64,
    pub stime_ticks: u64,
    pub vsize_bytes: u64,
    pub rss_pages: i64,
    pub processor: Option<i32>,
    pub start_ticks: u64,
}

/// Extended status record. Missing keys stay `None` and surface as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusRecord {
    pub num_threads: Option<u64>,
    pub vol_ctx_switches: Option<u64>,
    pub nonvol_ctx_switches: Option<u64>,
    pub uid: Option<u32>,
    pub ppid: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IoRecord {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

pub trait PlatformDriver {
    /// Tick and page constants, resolved once per driver.
    fn constants(&self) -> PlatformConstants;

    /// Calls `visit` for every visible process id, in any order. Stops early
    /// when `visit` breaks.
    fn for_each_pid(&self, visit: &mut dyn FnMut(u32) -> ControlFlow<()>) -> Result<()>;

    fn read_stat(&self, pid: u32) -> Result<StatRecord>;

    fn read_status(&self, pid: u32) -> Result<StatusRecord>;

    fn read_io(&self, pid: u32) -> Result<IoRecord>;

    /// Short command name, trimmed.
    fn read_comm(&self, pid: u32) -> Option<String>;

    /// Full command line with argument separators replaced by spaces.
    fn read_cmdline(&self, pid: u32) -> Option<String>;

    /// Control-group membership text, newlines folded to spaces.
    fn read_cgroup(&self, pid: u32) -> Option<String>;
}

impl<D: PlatformDriver + ?Sized> PlatformDriver for Box<D> {
    fn constants(&self) -> PlatformConstants {
        (**self).constants()
    }

    fn for_each_pid(&self, visit: &mut dyn FnMut(u32) -> ControlFlow<()>) -> Result<()> {
        (**self).for_each_pid(visit)
    }

    fn read_stat(&self, pid: u32) -> Result<StatRecord> {
        (**self).read_stat(pid)
    }

    fn read_status(&self, pid: u32) -> Result<StatusRecord> {
        (**self).read_status(pid)
    }

    fn read_io(&self, pid: u32) -> Result<IoRecord> {
        (**self).read_io(pid)
    }

    fn read_comm(&self, pid: u32) -> Option<String> {
        (**self).read_comm(pid)
    }

    fn read_cmdline(&self, pid: u32) -> Option<String> {
        (**self).read_cmdline(pid)
    }

    fn read_cgroup(&self, pid: u32) -> Option<String> {
        (**self).read_cgroup(pid)
    }
}

fn or_unavailable<T: Into<f64>>(value: Option<T>) -> f64 {
    value.map_or(UNAVAILABLE, Into::into)
}

/// Normalizes raw records into an absolute row (ns, bytes).
pub fn build_row(
    constants: &PlatformConstants,
    stat: &StatRecord,
    status: Option<&StatusRecord>,
    io: Option<&IoRecord>,
) -> MetricRow {
    let status = status.copied().unwrap_or_default();
    MetricRow {
        utime_ns: stat.utime_ticks as f64 * constants.tick_ns,
        stime_ns: stat.stime_ticks as f64 * constants.tick_ns,
        rss_bytes: stat.rss_pages as f64 * constants.page_size as f64,
        vsize_bytes: stat.vsize_bytes as f64,
        num_threads: status.num_threads.map_or(UNAVAILABLE, |v| v as f64),
        vol_ctx_switches: status.vol_ctx_switches.map_or(UNAVAILABLE, |v| v as f64),
        nonvol_ctx_switches: status.nonvol_ctx_switches.map_or(UNAVAILABLE, |v| v as f64),
        processor: or_unavailable(stat.processor),
        io_read_bytes: io.map_or(UNAVAILABLE, |r| r.read_bytes as f64),
        io_write_bytes: io.map_or(UNAVAILABLE, |r| r.write_bytes as f64),
        starttime_ns: stat.start_ticks as f64 * constants.tick_ns,
        uid: or_unavailable(status.uid),
        ppid: or_unavailable(status.ppid),
    }
}

/// Enumerates, filters and reads processes, appending at most `capacity`
/// samples to `out` in ascending pid order.
///
/// Returns the number of processes that matched, which may exceed the number
/// written. `pids` is scratch storage; `limit` caps the growth of `out`
/// (see `Session::with_row_limit`).
///
/// A failed pid-list growth truncates enumeration (the scan continues over the
/// pids collected so far). A failed growth of `out` fails the call.
pub fn capture_absolute<D: PlatformDriver + ?Sized>(
    driver: &D,
    filter: Option<&Filter>,
    capacity: usize,
    pids: &mut Vec<u32>,
    out: &mut Vec<Sample>,
    limit: Option<usize>,
) -> Result<usize> {
    let constants = driver.constants();

    pids.clear();
    let mut truncated = None;
    driver.for_each_pid(&mut |pid| {
        if pid == 0 {
            return ControlFlow::Continue(());
        }
        match reserve_doubling(pids, pids.len() + 1, None) {
            Ok(()) => {
                pids.push(pid);
                ControlFlow::Continue(())
            }
            Err(e) => {
                truncated = Some(e);
                ControlFlow::Break(())
            }
        }
    })?;
    if let Some(e) = truncated {
        warn!(collected = pids.len(), error = %e, "pid enumeration truncated");
    }

    // Ascending, duplicate-free order is part of the output contract.
    pids.sort_unstable();
    pids.dedup();

    out.clear();

    let uid_filtered = filter.is_some_and(Filter::has_uid_filter);
    let mut matched = 0usize;

    for &pid in pids.iter() {
        if let Some(f) = filter {
            if !f.admits_pid(pid) {
                continue;
            }
        }

        let stat = match driver.read_stat(pid) {
            Ok(stat) => stat,
            Err(e) => {
                trace!(pid, error = %e, "skipping process");
                continue;
            }
        };

        let writing = out.len() < capacity;

        // Status is needed for the row itself and for the uid filter; a
        // process past capacity with no uid filter only needs to be counted.
        let status = if writing || uid_filtered {
            match driver.read_status(pid) {
                Ok(status) => Some(status),
                Err(e) => {
                    trace!(pid, error = %e, "extended status unavailable");
                    None
                }
            }
        } else {
            None
        };

        if let Some(f) = filter {
            if !f.admits_uid(status.as_ref().and_then(|s| s.uid)) {
                continue;
            }
        }

        matched += 1;
        if !writing {
            continue;
        }

        let io = match driver.read_io(pid) {
            Ok(io) => Some(io),
            Err(e) => {
                trace!(pid, error = %e, "io counters unavailable");
                None
            }
        };

        reserve_doubling(out, out.len() + 1, limit)?;
        out.push(Sample {
            identity: ProcessIdentity::new(pid, stat.start_ticks),
            row: build_row(&constants, &stat, status.as_ref(), io.as_ref()),
        });
    }

    Ok(matched)
}
