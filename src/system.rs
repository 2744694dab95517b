//! Ancillary host queries.
//!
//! Core count, total CPU ticks, total memory, the monotonic clock, sleep, and
//! the tick/page constants the drivers normalize with. The constants are
//! resolved once per process and cached.

use std::fs;
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::driver::PlatformConstants;

const FALLBACK_CLK_TCK: u64 = 100;
const FALLBACK_PAGE_SIZE: u64 = 4096;

static HOST_CONSTANTS: Lazy<PlatformConstants> = Lazy::new(|| {
    let hz = clock_ticks_per_second();
    let page_size = page_size();
    debug!(hz, page_size, "resolved platform constants");
    PlatformConstants {
        tick_ns: 1e9 / hz as f64,
        page_size,
    }
});

/// Tick duration and page size of the running host.
pub fn host_constants() -> PlatformConstants {
    *HOST_CONSTANTS
}

/// Scheduler ticks per second, falling back to 100 if sysconf fails.
pub fn clock_ticks_per_second() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if hz <= 0 {
        FALLBACK_CLK_TCK
    } else {
        hz as u64
    }
}

/// Memory page size in bytes, falling back to 4096 if sysconf fails.
pub fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        FALLBACK_PAGE_SIZE
    } else {
        size as u64
    }
}

/// Number of online processors, at least 1.
pub fn core_count() -> usize {
    // SAFETY: sysconf has no preconditions.
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n < 1 {
        1
    } else {
        n as usize
    }
}

/// Sum of all fields of the aggregate `cpu` line of /proc/stat, or 0 if unreadable.
pub fn total_cpu_ticks() -> u64 {
    match fs::read_to_string("/proc/stat") {
        Ok(content) => parse_total_cpu_ticks(&content),
        Err(e) => {
            debug!("Failed to read /proc/stat: {}", e);
            0
        }
    }
}

/// Parses the first `cpu ` line of /proc/stat content.
///
/// Format: "cpu  user nice system idle iowait irq softirq steal guest guest_nice"
pub fn parse_total_cpu_ticks(content: &str) -> u64 {
    content
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("cpu "))
        .map(|rest| {
            rest.split_whitespace()
                .filter_map(|t| t.parse::<u64>().ok())
                .sum()
        })
        .unwrap_or(0)
}

/// MemTotal from /proc/meminfo in bytes, or 0 if unreadable.
pub fn mem_total_bytes() -> u64 {
    match fs::read_to_string("/proc/meminfo") {
        Ok(content) => parse_mem_total_bytes(&content).unwrap_or(0),
        Err(e) => {
            debug!("Failed to read /proc/meminfo: {}", e);
            0
        }
    }
}

/// Looks for the "MemTotal:" line and converts KB to bytes.
pub fn parse_mem_total_bytes(content: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))
        .and_then(|v| v.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

/// Seconds on the monotonic clock, or 0.0 if it cannot be read.
pub fn monotonic_seconds() -> f64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: ts is a valid, writable timespec.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    if rc == 0 {
        ts.tv_sec as f64 + ts.tv_nsec as f64 / 1e9
    } else {
        0.0
    }
}

/// Sleeps for `usec` microseconds; interrupted sleeps are resumed.
pub fn sleep_micros(usec: u64) {
    std::thread::sleep(Duration::from_micros(usec));
}
