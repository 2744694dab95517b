//! Process selection filters.
//!
//! Filtering decides which processes are counted and read, not only which are
//! written. Pid range and whitelist checks run before any per-process read;
//! the uid check needs the extended-status record and runs after it.

use ahash::AHashSet;

#[derive(Debug, Clone, Default)]
pub struct Filter {
    pid_min: Option<u32>,
    pid_max: Option<u32>,
    uid: Option<u32>,
    whitelist: Option<AHashSet<u32>>,
}

/// Converts a host-side sentinel value: negative or NaN disables the dimension.
fn from_sentinel(value: f64) -> Option<u32> {
    if value.is_nan() || value < 0.0 {
        None
    } else if value >= u32::MAX as f64 {
        Some(u32::MAX)
    } else {
        Some(value as u32)
    }
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a filter from the flat host contract, where a negative value or
    /// an empty whitelist means "no restriction".
    ///
    /// Whitelist entries that are not valid pids never match, but a whitelist
    /// made only of such entries still restricts.
    pub fn from_raw(pid_min: f64, pid_max: f64, uid: f64, whitelist: &[f64]) -> Self {
        let whitelist = if whitelist.is_empty() {
            None
        } else {
            Some(
                whitelist
                    .iter()
                    .filter_map(|v| from_sentinel(*v))
                    .filter(|pid| *pid > 0)
                    .collect(),
            )
        };
        Self {
            pid_min: from_sentinel(pid_min),
            pid_max: from_sentinel(pid_max),
            uid: from_sentinel(uid),
            whitelist,
        }
    }

    pub fn pid_min(mut self, min: u32) -> Self {
        self.pid_min = Some(min);
        self
    }

    pub fn pid_max(mut self, max: u32) -> Self {
        self.pid_max = Some(max);
        self
    }

    pub fn only_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    /// An empty iterator leaves the whitelist disabled.
    pub fn whitelist<I: IntoIterator<Item = u32>>(mut self, pids: I) -> Self {
        let set: AHashSet<u32> = pids.into_iter().collect();
        self.whitelist = if set.is_empty() { None } else { Some(set) };
        self
    }

    pub fn has_uid_filter(&self) -> bool {
        self.uid.is_some()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.pid_min.is_none()
            && self.pid_max.is_none()
            && self.uid.is_none()
            && self.whitelist.is_none()
    }

    /// Range and whitelist check; cheap, runs before any read.
    pub fn admits_pid(&self, pid: u32) -> bool {
        if self.pid_min.is_some_and(|min| pid < min) {
            return false;
        }
        if self.pid_max.is_some_and(|max| pid > max) {
            return false;
        }
        match &self.whitelist {
            Some(set) => set.contains(&pid),
            None => true,
        }
    }

    /// Uid check. A process whose uid could not be read never passes an
    /// active uid filter.
    pub fn admits_uid(&self, uid: Option<u32>) -> bool {
        match self.uid {
            Some(wanted) => uid == Some(wanted),
            None => true,
        }
    }
}
