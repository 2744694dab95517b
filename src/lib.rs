//! Per-process resource sampler emitting fixed-width numeric matrices.
//!
//! Processes are enumerated through a [`PlatformDriver`], optionally
//! filtered, and written row-major into a caller-provided `f64` buffer with
//! one column per [`Metric`]. Delta snapshots convert counter columns into
//! per-interval deltas against the baseline stored in a caller-held
//! [`Session`], matching samples on `(pid, starttime)` so that a recycled pid
//! never inherits another process's counters.
//!
//! On Linux the free functions below sample the live `/proc`; any other
//! source can be plugged in through [`Snapshotter::new`].

pub mod config;
pub mod delta;
pub mod driver;
pub mod error;
pub mod filter;
pub mod matrix;
pub mod sample;
pub mod schema;
pub mod session;
pub mod snapshot;
pub mod system;

pub use driver::{FixtureDriver, FixtureProcess, PlatformConstants, PlatformDriver};
#[cfg(target_os = "linux")]
pub use driver::LinuxDriver;
pub use error::{Result, ScanError};
pub use filter::Filter;
pub use sample::{MetricRow, ProcessIdentity, Sample};
pub use schema::{metric_index, Metric, MetricKind, METRIC_COUNT, UNAVAILABLE};
pub use session::Session;
pub use snapshot::Snapshotter;

/// Driver behind the free functions. Shared so that its once-only warnings
/// (such as a permission-restricted `/proc/<pid>/io`) fire once per process,
/// not once per call. It holds no sampling state; baselines live in `Session`.
#[cfg(target_os = "linux")]
static LIVE: once_cell::sync::Lazy<Snapshotter<LinuxDriver>> =
    once_cell::sync::Lazy::new(|| Snapshotter::new(LinuxDriver::new()));

#[cfg(target_os = "linux")]
fn live() -> &'static Snapshotter<LinuxDriver> {
    &LIVE
}

/// Absolute snapshot of every process in `/proc`.
#[cfg(target_os = "linux")]
pub fn snapshot_absolute(out: &mut [f64], rows: usize, cols: usize, pid_out: Option<&mut [f64]>) -> usize {
    live().snapshot_absolute(out, rows, cols, pid_out)
}

/// Absolute snapshot restricted by `filter`.
#[cfg(target_os = "linux")]
pub fn snapshot_filtered(
    out: &mut [f64],
    rows: usize,
    cols: usize,
    pid_out: Option<&mut [f64]>,
    filter: &Filter,
) -> usize {
    live().snapshot_filtered(out, rows, cols, pid_out, filter)
}

/// Delta snapshot against `session`'s baseline.
#[cfg(target_os = "linux")]
pub fn snapshot_delta(
    out: &mut [f64],
    rows: usize,
    cols: usize,
    pid_out: Option<&mut [f64]>,
    session: &mut Session,
) -> usize {
    live().snapshot_delta(out, rows, cols, pid_out, session)
}

#[cfg(target_os = "linux")]
pub fn read_comm(pid: u32) -> Option<String> {
    live().driver().read_comm(pid)
}

#[cfg(target_os = "linux")]
pub fn read_cmdline(pid: u32) -> Option<String> {
    live().driver().read_cmdline(pid)
}

#[cfg(target_os = "linux")]
pub fn read_cgroup(pid: u32) -> Option<String> {
    live().driver().read_cgroup(pid)
}
