//! Metric schema: the fixed, ordered set of matrix columns.
//!
//! Host programs index columns by position, so the discriminants below are the
//! wire contract. Appending a column is a breaking change for every consumer.

/// Number of columns every output row carries.
pub const METRIC_COUNT: usize = 13;

/// Value written for a field that could not be read this cycle.
pub const UNAVAILABLE: f64 = -1.0;

/// Returns true if the value is the unavailable sentinel.
///
/// Drivers never emit negative readings other than the sentinel, so any
/// negative value is treated as unavailable.
#[inline]
pub fn is_unavailable(value: f64) -> bool {
    value < 0.0
}

/// Semantic kind of a column, which decides its delta behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonic accumulator; reported as a per-interval delta in delta mode.
    Counter,
    /// Instantaneous reading.
    Gauge,
    /// Relationship value (uid, parent pid).
    Identity,
    /// Fixed at process creation.
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Metric {
    UtimeNs = 0,
    StimeNs = 1,
    RssBytes = 2,
    VsizeBytes = 3,
    NumThreads = 4,
    VolCtxSwitches = 5,
    NonvolCtxSwitches = 6,
    Processor = 7,
    IoReadBytes = 8,
    IoWriteBytes = 9,
    StarttimeNs = 10,
    Uid = 11,
    Ppid = 12,
}

impl Metric {
    /// All columns in positional order.
    pub const ALL: [Metric; METRIC_COUNT] = [
        Metric::UtimeNs,
        Metric::StimeNs,
        Metric::RssBytes,
        Metric::VsizeBytes,
        Metric::NumThreads,
        Metric::VolCtxSwitches,
        Metric::NonvolCtxSwitches,
        Metric::Processor,
        Metric::IoReadBytes,
        Metric::IoWriteBytes,
        Metric::StarttimeNs,
        Metric::Uid,
        Metric::Ppid,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical column name.
    pub fn name(self) -> &'static str {
        match self {
            Metric::UtimeNs => "utime_ns",
            Metric::StimeNs => "stime_ns",
            Metric::RssBytes => "rss_bytes",
            Metric::VsizeBytes => "vsize_bytes",
            Metric::NumThreads => "num_threads",
            Metric::VolCtxSwitches => "vol_ctx_switches",
            Metric::NonvolCtxSwitches => "nonvol_ctx_switches",
            Metric::Processor => "processor",
            Metric::IoReadBytes => "io_read_bytes",
            Metric::IoWriteBytes => "io_write_bytes",
            Metric::StarttimeNs => "starttime_ns",
            Metric::Uid => "uid",
            Metric::Ppid => "ppid",
        }
    }

    /// Short name used by older host bindings.
    pub fn alias(self) -> &'static str {
        match self {
            Metric::UtimeNs => "utime",
            Metric::StimeNs => "stime",
            Metric::RssBytes => "rss",
            Metric::VsizeBytes => "vsize",
            Metric::NumThreads => "num_threads",
            Metric::VolCtxSwitches => "vol_ctx",
            Metric::NonvolCtxSwitches => "nonvol_ctx",
            Metric::Processor => "processor",
            Metric::IoReadBytes => "io_read",
            Metric::IoWriteBytes => "io_write",
            Metric::StarttimeNs => "starttime",
            Metric::Uid => "uid",
            Metric::Ppid => "ppid",
        }
    }

    pub fn kind(self) -> MetricKind {
        match self {
            Metric::UtimeNs
            | Metric::StimeNs
            | Metric::VolCtxSwitches
            | Metric::NonvolCtxSwitches
            | Metric::IoReadBytes
            | Metric::IoWriteBytes => MetricKind::Counter,
            Metric::RssBytes | Metric::VsizeBytes | Metric::NumThreads | Metric::Processor => {
                MetricKind::Gauge
            }
            Metric::StarttimeNs => MetricKind::Static,
            Metric::Uid | Metric::Ppid => MetricKind::Identity,
        }
    }

    #[inline]
    pub fn is_counter(self) -> bool {
        self.kind() == MetricKind::Counter
    }

    /// Looks a column up by canonical name or legacy alias.
    pub fn from_name(name: &str) -> Option<Metric> {
        let name = name.trim();
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.name() == name || m.alias() == name)
    }
}

/// Column index for a metric name, if known.
pub fn metric_index(name: &str) -> Option<usize> {
    Metric::from_name(name).map(Metric::index)
}
