//! Structured per-process records.
//!
//! Filter and delta logic work on `MetricRow`'s named fields; the flat
//! row-major layout only exists at the output edge (see `matrix`).

use crate::schema::{Metric, METRIC_COUNT, UNAVAILABLE};

/// One absolute (or delta-adjusted) row, one field per schema column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRow {
    pub utime_ns: f64,
    pub stime_ns: f64,
    pub rss_bytes: f64,
    pub vsize_bytes: f64,
    pub num_threads: f64,
    pub vol_ctx_switches: f64,
    pub nonvol_ctx_switches: f64,
    pub processor: f64,
    pub io_read_bytes: f64,
    pub io_write_bytes: f64,
    pub starttime_ns: f64,
    pub uid: f64,
    pub ppid: f64,
}

impl Default for MetricRow {
    /// Every field unavailable.
    fn default() -> Self {
        Self {
            utime_ns: UNAVAILABLE,
            stime_ns: UNAVAILABLE,
            rss_bytes: UNAVAILABLE,
            vsize_bytes: UNAVAILABLE,
            num_threads: UNAVAILABLE,
            vol_ctx_switches: UNAVAILABLE,
            nonvol_ctx_switches: UNAVAILABLE,
            processor: UNAVAILABLE,
            io_read_bytes: UNAVAILABLE,
            io_write_bytes: UNAVAILABLE,
            starttime_ns: UNAVAILABLE,
            uid: UNAVAILABLE,
            ppid: UNAVAILABLE,
        }
    }
}

impl MetricRow {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::UtimeNs => self.utime_ns,
            Metric::StimeNs => self.stime_ns,
            Metric::RssBytes => self.rss_bytes,
            Metric::VsizeBytes => self.vsize_bytes,
            Metric::NumThreads => self.num_threads,
            Metric::VolCtxSwitches => self.vol_ctx_switches,
            Metric::NonvolCtxSwitches => self.nonvol_ctx_switches,
            Metric::Processor => self.processor,
            Metric::IoReadBytes => self.io_read_bytes,
            Metric::IoWriteBytes => self.io_write_bytes,
            Metric::StarttimeNs => self.starttime_ns,
            Metric::Uid => self.uid,
            Metric::Ppid => self.ppid,
        }
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        let slot = match metric {
            Metric::UtimeNs => &mut self.utime_ns,
            Metric::StimeNs => &mut self.stime_ns,
            Metric::RssBytes => &mut self.rss_bytes,
            Metric::VsizeBytes => &mut self.vsize_bytes,
            Metric::NumThreads => &mut self.num_threads,
            Metric::VolCtxSwitches => &mut self.vol_ctx_switches,
            Metric::NonvolCtxSwitches => &mut self.nonvol_ctx_switches,
            Metric::Processor => &mut self.processor,
            Metric::IoReadBytes => &mut self.io_read_bytes,
            Metric::IoWriteBytes => &mut self.io_write_bytes,
            Metric::StarttimeNs => &mut self.starttime_ns,
            Metric::Uid => &mut self.uid,
            Metric::Ppid => &mut self.ppid,
        };
        *slot = value;
    }

    /// Values in schema order.
    pub fn to_array(&self) -> [f64; METRIC_COUNT] {
        Metric::ALL.map(|m| self.get(m))
    }

    pub fn from_array(values: [f64; METRIC_COUNT]) -> Self {
        let mut row = Self::default();
        for m in Metric::ALL {
            row.set(m, values[m.index()]);
        }
        row
    }
}

/// `(pid, starttime)`: equal pids with different start times are different processes.
///
/// `starttime` is kept in raw platform ticks so that identity comparison is
/// exact integer equality, independent of the ns conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub starttime: u64,
}

impl ProcessIdentity {
    pub fn new(pid: u32, starttime: u64) -> Self {
        Self { pid, starttime }
    }
}

/// One captured process: identity plus its absolute row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub identity: ProcessIdentity,
    pub row: MetricRow,
}

impl Sample {
    #[inline]
    pub fn pid(&self) -> u32 {
        self.identity.pid
    }
}
